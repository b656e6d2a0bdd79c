use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum PreprocessingConfigError {
    #[error("Failed to read preprocessing config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse preprocessing config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid preprocessing config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    pub version: f32,
    pub image: ImageConfig,
    pub normalization: NormalizationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// `[width, height]` of the model input.
    pub size: Vec<u32>,
    pub channels: u32,
    pub preprocessing: ResizeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResizeConfig {
    pub resize_method: ResizeMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMethod {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeMethod> for FilterType {
    fn from(method: ResizeMethod) -> Self {
        match method {
            ResizeMethod::Nearest => FilterType::Nearest,
            ResizeMethod::Triangle => FilterType::Triangle,
            ResizeMethod::CatmullRom => FilterType::CatmullRom,
            ResizeMethod::Gaussian => FilterType::Gaussian,
            ResizeMethod::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationConfig {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            version: 1.0,
            image: ImageConfig {
                size: vec![224, 224],
                channels: 3,
                preprocessing: ResizeConfig {
                    resize_method: ResizeMethod::Triangle,
                },
            },
            normalization: NormalizationConfig {
                mean: vec![0.485, 0.456, 0.406],
                std: vec![0.229, 0.224, 0.225],
            },
        }
    }
}

impl PreprocessingConfig {
    pub fn load(path: &Path) -> Result<Self, PreprocessingConfigError> {
        let config_str = std::fs::read_to_string(path)?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, PreprocessingConfigError> {
        let config: PreprocessingConfig = serde_yaml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Falls back to the ImageNet defaults when `path` does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, PreprocessingConfigError> {
        if !path.exists() {
            log::info!(
                "No preprocessing config at {}, using ImageNet defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<(), PreprocessingConfigError> {
        let invalid = |msg: String| Err(PreprocessingConfigError::Invalid(msg));

        match self.image.size.as_slice() {
            [w, h] if *w > 0 && *h > 0 => {}
            other => return invalid(format!("image.size must be [width, height], got {:?}", other)),
        }
        if !matches!(self.image.channels, 1 | 3) {
            return invalid(format!("image.channels must be 1 or 3, got {}", self.image.channels));
        }
        let channels = self.image.channels as usize;
        if self.normalization.mean.len() != channels || self.normalization.std.len() != channels {
            return invalid(format!(
                "normalization.mean and normalization.std need {} entries",
                channels
            ));
        }
        if self.normalization.std.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return invalid("normalization.std entries must be finite and non-zero".to_string());
        }
        Ok(())
    }

    pub fn input_size(&self) -> (u32, u32) {
        (self.image.size[0], self.image.size[1])
    }

    pub fn filter(&self) -> FilterType {
        self.image.preprocessing.resize_method.into()
    }

    /// Scales an 8-bit sample of `channel` into the normalized model range.
    pub fn normalize(&self, channel: usize, value: u8) -> f32 {
        let scaled = value as f32 / 255.0;
        (scaled - self.normalization.mean[channel]) / self.normalization.std[channel]
    }
}
