use image::imageops;
use image::{DynamicImage, ImageFormat, ImageReader};
use ndarray::Array3;
use std::io::Cursor;
use std::sync::Arc;

use super::config::PreprocessingConfig;
use super::upload::UploadedImage;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Could not decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Could not read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image has zero width or height")]
    Empty,
}

/// An upload turned into model input.
///
/// `width`/`height` describe the source image; `pixels` is channel-major
/// (`[channels, height, width]`) at the configured model input size.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Array3<f32>,
}

impl DecodedImage {
    pub fn channels(&self) -> usize {
        self.pixels.dim().0
    }

    /// `[1, channels, height, width]`, the batch shape models expect.
    pub fn batch_shape(&self) -> [i64; 4] {
        let (c, h, w) = self.pixels.dim();
        [1, c as i64, h as i64, w as i64]
    }
}

#[derive(Clone)]
pub struct ImageDecoder {
    config: Arc<PreprocessingConfig>,
}

impl ImageDecoder {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn decode(&self, upload: &UploadedImage) -> Result<DecodedImage, DecodeError> {
        let image = read_image(upload)?;
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(DecodeError::Empty);
        }

        let pixels = self.to_tensor(&image);
        Ok(DecodedImage {
            width,
            height,
            pixels,
        })
    }

    fn to_tensor(&self, image: &DynamicImage) -> Array3<f32> {
        let (target_w, target_h) = self.config.input_size();
        let filter = self.config.filter();
        let channels = self.config.image.channels as usize;
        let mut pixels = Array3::<f32>::zeros((channels, target_h as usize, target_w as usize));

        if channels == 1 {
            let resized = imageops::resize(&image.to_luma8(), target_w, target_h, filter);
            for (x, y, pixel) in resized.enumerate_pixels() {
                pixels[[0, y as usize, x as usize]] = self.config.normalize(0, pixel[0]);
            }
        } else {
            let resized = imageops::resize(&image.to_rgb8(), target_w, target_h, filter);
            for (x, y, pixel) in resized.enumerate_pixels() {
                for c in 0..3 {
                    pixels[[c, y as usize, x as usize]] = self.config.normalize(c, pixel[c]);
                }
            }
        }

        pixels
    }
}

fn read_image(upload: &UploadedImage) -> Result<DynamicImage, DecodeError> {
    // Sniff the content first; browsers are loose with declared types.
    let mut reader = ImageReader::new(Cursor::new(upload.bytes())).with_guessed_format()?;
    if reader.format().is_none() {
        if let Some(format) = ImageFormat::from_mime_type(upload.mime_type()) {
            reader.set_format(format);
        }
    }
    Ok(reader.decode()?)
}
