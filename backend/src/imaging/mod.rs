pub mod config;
pub mod decoder;
pub mod upload;

pub use config::{PreprocessingConfig, PreprocessingConfigError};
pub use decoder::{DecodeError, DecodedImage, ImageDecoder};
pub use upload::{DEFAULT_MAX_UPLOAD_BYTES, UploadRejected, UploadedImage};
