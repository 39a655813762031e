//! Synthetic brain-like images for trying the scanner without real scans.

use std::io::Cursor;
use std::str::FromStr;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lookout_shared::{LookoutError, Result};

const SIDE: u32 = 224;
const CENTER: (i64, i64) = (112, 112);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Normal,
    Tumor,
}

impl SampleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Tumor => "tumor",
        }
    }
}

impl FromStr for SampleKind {
    type Err = LookoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "normal" => Ok(Self::Normal),
            "tumor" => Ok(Self::Tumor),
            other => Err(LookoutError::validation(format!(
                "unknown sample '{other}' (expected normal or tumor)"
            ))),
        }
    }
}

/// Generate a 224x224 sample: per-channel noise with concentric gray disks.
/// The tumor sample adds a bright off-center spot.
pub fn generate(kind: SampleKind, seed: Option<u64>) -> RgbImage {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let (lo, hi) = match kind {
        SampleKind::Normal => (20u8, 200u8),
        SampleKind::Tumor => (30, 180),
    };
    let mut img = RgbImage::from_fn(SIDE, SIDE, |_, _| {
        Rgb([rng.gen_range(lo..hi), rng.gen_range(lo..hi), rng.gen_range(lo..hi)])
    });

    match kind {
        SampleKind::Normal => {
            fill_disk(&mut img, CENTER, 80, 150);
            fill_disk(&mut img, CENTER, 60, 100);
        }
        SampleKind::Tumor => {
            fill_disk(&mut img, CENTER, 70, 120);
            fill_disk(&mut img, (90, 90), 20, 200);
        }
    }
    img
}

fn fill_disk(img: &mut RgbImage, (cx, cy): (i64, i64), radius: i64, gray: u8) {
    for (x, y, px) in img.enumerate_pixels_mut() {
        let (dx, dy) = (i64::from(x) - cx, i64::from(y) - cy);
        if dx * dx + dy * dy <= radius * radius {
            *px = Rgb([gray; 3]);
        }
    }
}

/// Encode as PNG bytes.
pub fn to_png(img: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| LookoutError::Inference(format!("PNG encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse() {
        assert_eq!("tumor".parse::<SampleKind>().unwrap(), SampleKind::Tumor);
        assert!("brain".parse::<SampleKind>().is_err());
    }

    #[test]
    fn normal_sample_has_concentric_disks() {
        let img = generate(SampleKind::Normal, Some(1));
        assert_eq!(img.dimensions(), (224, 224));
        assert_eq!(img.get_pixel(112, 112), &Rgb([100, 100, 100]));
        // between the inner (60) and outer (80) radius
        assert_eq!(img.get_pixel(112 + 70, 112), &Rgb([150, 150, 150]));
        let corner = img.get_pixel(0, 0);
        assert!(corner.0.iter().all(|v| (20..200).contains(v)));
    }

    #[test]
    fn tumor_sample_has_bright_spot() {
        let img = generate(SampleKind::Tumor, Some(1));
        assert_eq!(img.get_pixel(90, 90), &Rgb([200, 200, 200]));
        assert_eq!(img.get_pixel(150, 150), &Rgb([120, 120, 120]));
    }

    #[test]
    fn seeds_are_reproducible() {
        assert_eq!(
            generate(SampleKind::Normal, Some(9)),
            generate(SampleKind::Normal, Some(9))
        );
    }

    #[test]
    fn png_decodes_back() {
        let png = to_png(&generate(SampleKind::Tumor, Some(3))).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 224);
    }
}
