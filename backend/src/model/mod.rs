pub mod backend;
pub mod labels;
pub mod provider;
pub mod ranking;
pub mod source;
#[cfg(feature = "torch")]
pub mod torch;

pub use backend::{
    Classifier, InferenceError, LoadError, ModelLoader, UnsupportedBackend, default_loader,
};
pub use labels::Labels;
pub use provider::{
    DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_TOP_K, ModelError, ModelHandle, ModelProvider, ModelSettings,
    ModelStatus,
};
pub use source::ModelSource;
