pub mod client;
pub mod term;
pub mod unsplash;
pub mod wikipedia;

pub use client::{
    DEFAULT_LOOKUP_TIMEOUT, EnrichmentClient, EnrichmentError, EnrichmentSettings, ImageSearch,
    LookupError, SummarySource,
};
pub use term::enrichment_term;
pub use unsplash::UnsplashClient;
pub use wikipedia::WikipediaClient;
