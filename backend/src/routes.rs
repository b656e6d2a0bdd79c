use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::{info, warn};
use shared::{ErrorResponse, SessionCreated};
use uuid::Uuid;

use crate::imaging::UploadRejected;
use crate::pipeline::{PredictOutcome, SessionRegistry};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/model").route(web::get().to(model_status)))
        .service(web::resource("/api/sessions").route(web::post().to(create_session)))
        .service(
            web::resource("/api/sessions/{session_id}")
                .route(web::get().to(get_session))
                .route(web::delete().to(delete_session)),
        )
        .service(web::resource("/api/sessions/{session_id}/image").route(web::post().to(select_image)))
        .service(web::resource("/api/sessions/{session_id}/predict").route(web::post().to(predict)));
}

fn error_json(mut builder: actix_web::HttpResponseBuilder, error: impl ToString) -> HttpResponse {
    builder.json(ErrorResponse {
        error: error.to_string(),
    })
}

fn session_not_found(session_id: Uuid) -> HttpResponse {
    error_json(
        HttpResponse::NotFound(),
        format!("Session {} not found", session_id),
    )
}

async fn model_status(registry: web::Data<SessionRegistry>) -> HttpResponse {
    HttpResponse::Ok().json(registry.model().status().to_response())
}

async fn create_session(registry: web::Data<SessionRegistry>) -> HttpResponse {
    let (session_id, _) = registry.create();
    HttpResponse::Created().json(SessionCreated { session_id })
}

async fn get_session(registry: web::Data<SessionRegistry>, path: web::Path<Uuid>) -> HttpResponse {
    let session_id = path.into_inner();
    match registry.get(session_id) {
        Some(pipeline) => HttpResponse::Ok().json(pipeline.state().snapshot()),
        None => session_not_found(session_id),
    }
}

async fn delete_session(registry: web::Data<SessionRegistry>, path: web::Path<Uuid>) -> HttpResponse {
    let session_id = path.into_inner();
    if registry.remove(session_id) {
        HttpResponse::NoContent().finish()
    } else {
        session_not_found(session_id)
    }
}

async fn select_image(
    registry: web::Data<SessionRegistry>,
    path: web::Path<Uuid>,
    mut payload: Multipart,
) -> Result<HttpResponse, Error> {
    let session_id = path.into_inner();
    let Some(pipeline) = registry.get(session_id) else {
        return Ok(session_not_found(session_id));
    };
    let limit = registry.max_upload_bytes();

    // Only the first file field is used.
    let Some(mut field) = payload.try_next().await? else {
        return Ok(error_json(HttpResponse::BadRequest(), "No file in upload"));
    };
    let mime_type = field
        .content_type()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let mut image_data = Vec::new();
    while let Some(chunk) = field.next().await {
        let data = chunk?;
        if image_data.len() + data.len() > limit {
            warn!("Upload for session {} exceeds {} bytes", session_id, limit);
            return Ok(error_json(
                HttpResponse::PayloadTooLarge(),
                UploadRejected::TooLarge {
                    size: image_data.len() + data.len(),
                    limit,
                },
            ));
        }
        image_data.extend_from_slice(&data);
    }

    match pipeline.select_image(image_data, &mime_type) {
        Ok(()) => Ok(HttpResponse::Ok().json(pipeline.state().snapshot())),
        Err(e @ UploadRejected::NotAnImage(_)) => {
            Ok(error_json(HttpResponse::UnsupportedMediaType(), e))
        }
        Err(e @ UploadRejected::TooLarge { .. }) => {
            Ok(error_json(HttpResponse::PayloadTooLarge(), e))
        }
        Err(e @ UploadRejected::Empty) => Ok(error_json(HttpResponse::BadRequest(), e)),
    }
}

async fn predict(registry: web::Data<SessionRegistry>, path: web::Path<Uuid>) -> HttpResponse {
    let session_id = path.into_inner();
    let Some(pipeline) = registry.get(session_id) else {
        return session_not_found(session_id);
    };

    match pipeline.request_prediction() {
        PredictOutcome::Started(_) => {
            info!("Prediction started for session {}", session_id);
            HttpResponse::Accepted().json(pipeline.state().snapshot())
        }
        PredictOutcome::AlreadyLoading => error_json(
            HttpResponse::Conflict(),
            "A prediction is already running for this session",
        ),
        PredictOutcome::NoImageSelected => {
            error_json(HttpResponse::BadRequest(), "No image selected")
        }
    }
}
