//! Image decoding and model-input preparation.

use std::path::Path;

use image::DynamicImage;
use image::imageops::FilterType;
use tracing::debug;

use lookout_shared::{LookoutError, Result};

/// Side length the classifier expects.
pub const INPUT_SIZE: u32 = 224;

/// An RGB image resized and scaled to `[0, 1]`, row-major HWC.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedImage {
    pub size: u32,
    pub data: Vec<f32>,
}

impl PreparedImage {
    /// `(height, width, channels)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.size as usize, self.size as usize, 3)
    }

    fn luma(&self) -> impl Iterator<Item = f32> + '_ {
        self.data
            .chunks_exact(3)
            .map(|px| 0.299 * px[0] + 0.587 * px[1] + 0.114 * px[2])
    }

    /// Mean grayscale intensity in `[0, 1]`.
    pub fn brightness(&self) -> f32 {
        let n = (self.data.len() / 3).max(1) as f32;
        self.luma().sum::<f32>() / n
    }

    /// Standard deviation of grayscale intensity.
    pub fn contrast(&self) -> f32 {
        let n = (self.data.len() / 3).max(1) as f32;
        let mean = self.brightness();
        let var = self.luma().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        var.sqrt()
    }
}

pub fn load_image_path(path: &Path) -> Result<DynamicImage> {
    let img = image::open(path)
        .map_err(|e| LookoutError::Inference(format!("cannot read {}: {e}", path.display())))?;
    debug!(path = %path.display(), width = img.width(), height = img.height(), "loaded image");
    Ok(img)
}

pub fn load_image_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| LookoutError::Inference(format!("unsupported or corrupt image: {e}")))
}

/// Convert to RGB, resize to [`INPUT_SIZE`] (bilinear) and scale to `[0, 1]`.
pub fn prepare(image: &DynamicImage) -> PreparedImage {
    prepare_with_size(image, INPUT_SIZE)
}

/// [`prepare`] with an explicit side length.
pub fn prepare_with_size(image: &DynamicImage, size: u32) -> PreparedImage {
    let rgb = image
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgb8();
    let data = rgb.as_raw().iter().map(|&v| f32::from(v) / 255.0).collect();
    PreparedImage { size, data }
}
