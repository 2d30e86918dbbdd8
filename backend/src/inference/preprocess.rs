use image::imageops::FilterType;
use ndarray::Array4;

use crate::config::{ConfigError, ImageConfig};

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Invalid tensor shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Turns raw upload bytes into a `(1, H, W, 3)` batch of `[0, 1]` floats.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    width: u32,
    height: u32,
    filter: FilterType,
}

impl Preprocessor {
    pub fn new(width: u32, height: u32, filter: FilterType) -> Self {
        Self {
            width,
            height,
            filter,
        }
    }

    pub fn from_config(config: &ImageConfig) -> Result<Self, ConfigError> {
        let (width, height) = config.dimensions()?;
        Ok(Self::new(width, height, config.filter()?))
    }

    pub fn preprocess(&self, raw: &[u8]) -> Result<Array4<f32>, PreprocessError> {
        let image = image::load_from_memory(raw)?;
        // Grayscale, alpha and palette images all collapse to plain RGB here.
        let rgb = image.to_rgb8();
        let resized = image::imageops::resize(&rgb, self.width, self.height, self.filter);

        let data: Vec<f32> = resized
            .into_raw()
            .into_iter()
            .map(|value| value as f32 / 255.0)
            .collect();

        let tensor = Array4::from_shape_vec(
            (1, self.height as usize, self.width as usize, 3),
            data,
        )?;
        Ok(tensor)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(224, 224, FilterType::Lanczos3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn output_has_batch_and_model_dimensions() {
        let png = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(37, 53, Rgb([10, 20, 30]))),
            ImageFormat::Png,
        );
        let tensor = Preprocessor::default().preprocess(&png).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
    }

    #[test]
    fn values_are_scaled_to_unit_range() {
        let png = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 0, 51]))),
            ImageFormat::Png,
        );
        let tensor = Preprocessor::new(4, 4, FilterType::Lanczos3)
            .preprocess(&png)
            .unwrap();
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!((tensor[[0, 2, 2, 0]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 2, 2, 1]].abs() < 1e-6);
        assert!((tensor[[0, 2, 2, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn grayscale_is_expanded_to_rgb() {
        let png = encode(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(6, 6, Luma([128]))),
            ImageFormat::Png,
        );
        let tensor = Preprocessor::new(3, 3, FilterType::Lanczos3)
            .preprocess(&png)
            .unwrap();
        let expected = 128.0 / 255.0;
        for c in 0..3 {
            assert!((tensor[[0, 1, 1, c]] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn alpha_channel_is_dropped() {
        let png = encode(
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(5, 5, Rgba([0, 255, 0, 10]))),
            ImageFormat::Png,
        );
        let tensor = Preprocessor::new(5, 5, FilterType::Nearest)
            .preprocess(&png)
            .unwrap();
        assert_eq!(tensor.shape(), &[1, 5, 5, 3]);
        assert!((tensor[[0, 0, 0, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn jpeg_input_decodes() {
        let jpeg = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([90, 160, 40]))),
            ImageFormat::Jpeg,
        );
        assert!(Preprocessor::default().preprocess(&jpeg).is_ok());
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = Preprocessor::default()
            .preprocess(b"definitely not an image")
            .unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));
    }
}
