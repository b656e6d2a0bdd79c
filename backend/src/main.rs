use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use nirikshaka::config::Config;
use nirikshaka::enrichment::EnrichmentClient;
use nirikshaka::imaging::{ImageDecoder, PreprocessingConfig};
use nirikshaka::model::{ModelProvider, default_loader};
use nirikshaka::pipeline::{PipelineComponents, SessionRegistry};
use nirikshaka::routes::configure_routes;
use std::io;
use std::sync::Arc;
use std::time::Duration;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let preprocessing = PreprocessingConfig::load_or_default(&config.preprocessing_path)
        .map_err(|e| {
            log::error!("Failed to load preprocessing config: {}", e);
            io::Error::new(io::ErrorKind::InvalidData, e.to_string())
        })?;

    let http = reqwest::Client::builder()
        .user_agent(concat!("nirikshaka/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| io::Error::other(format!("HTTP client setup failed: {}", e)))?;

    let model = Arc::new(ModelProvider::new(
        config.model.clone(),
        default_loader(),
        http.clone(),
    ));
    if config.preload_model {
        let model = Arc::clone(&model);
        actix_web::rt::spawn(async move {
            if let Err(e) = model.ensure_loaded().await {
                log::error!("Model preload failed: {}", e);
            }
        });
    }

    let enricher = EnrichmentClient::from_settings(&config.enrichment, http);
    let registry = SessionRegistry::new(
        PipelineComponents {
            decoder: ImageDecoder::new(preprocessing),
            model,
            enricher,
            max_upload_bytes: config.max_upload_bytes,
        },
        config.session_idle,
    );

    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(registry.clone()))
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
