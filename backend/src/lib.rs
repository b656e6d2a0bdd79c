pub mod config;
pub mod enrichment;
pub mod imaging;
pub mod model;
pub mod pipeline;
pub mod routes;
