use std::fmt;
use std::sync::Arc;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejected {
    #[error("Unsupported media type {0:?}: only image uploads are accepted")]
    NotAnImage(String),
    #[error("Uploaded file is empty")]
    Empty,
    #[error("Uploaded file is {size} bytes, the limit is {limit}")]
    TooLarge { size: usize, limit: usize },
}

/// A user-selected file that passed the upload checks. Cheap to clone.
#[derive(Clone)]
pub struct UploadedImage {
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl UploadedImage {
    pub fn new(
        bytes: impl Into<Arc<[u8]>>,
        mime_type: &str,
        max_bytes: usize,
    ) -> Result<Self, UploadRejected> {
        let mime_type = mime_type.trim();
        if !is_image_mime(mime_type) {
            return Err(UploadRejected::NotAnImage(mime_type.to_string()));
        }

        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(UploadRejected::Empty);
        }
        if bytes.len() > max_bytes {
            return Err(UploadRejected::TooLarge {
                size: bytes.len(),
                limit: max_bytes,
            });
        }

        Ok(Self {
            bytes,
            mime_type: mime_type.to_string(),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn is_image_mime(mime_type: &str) -> bool {
    mime_type
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}
