pub mod classification;
pub mod session;
pub mod state;

pub use classification::{
    ClassificationPipeline, PipelineComponents, PredictOutcome, PredictionTicket,
};
pub use session::SessionRegistry;
pub use state::{PipelineError, PipelineState};
