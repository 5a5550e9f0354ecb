//! Image preprocessing
//!
//! Turns raw request bytes into the fixed-shape normalized tensor a
//! family's models expect: three-channel color, square resize, symmetric
//! intensity rescale, and a leading batch dimension of 1.

use crate::error::PredictError;
use crate::registry::PipelineKind;
use image::imageops::FilterType;
use tract_onnx::prelude::*;

/// Decode raw bytes into a `[1, E, E, 3]` f32 tensor for `kind`
///
/// The rescale must match exactly what the family's models were trained to
/// expect; a mismatch degrades predictions silently rather than failing.
pub fn preprocess(bytes: &[u8], kind: PipelineKind) -> Result<Tensor, PredictError> {
    if bytes.is_empty() {
        return Err(PredictError::InvalidImage("empty input".to_string()));
    }

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| PredictError::InvalidImage(e.to_string()))?;

    let edge = kind.input_edge();
    let rgb = image::imageops::resize(
        &decoded.to_rgb8(),
        edge as u32,
        edge as u32,
        FilterType::Triangle,
    );

    let tensor: Tensor =
        tract_ndarray::Array4::from_shape_fn((1, edge, edge, 3), |(_, y, x, channel)| {
            kind.rescale(rgb.get_pixel(x as u32, y as u32).0[channel])
        })
        .into();

    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32, pixel: Rgb<u8>) -> Vec<u8> {
        let buffer = ImageBuffer::from_pixel(width, height, pixel);
        let mut bytes = Vec::new();
        buffer
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_tensor_shape_and_batch_dim() {
        let bytes = png_bytes(64, 48, Rgb([10, 200, 30]));
        let tensor = preprocess(&bytes, PipelineKind::Xception).unwrap();
        assert_eq!(tensor.shape(), &[1, 299, 299, 3]);
    }

    #[test]
    fn test_values_rescaled_symmetrically() {
        let bytes = png_bytes(32, 32, Rgb([255, 0, 255]));
        let tensor = preprocess(&bytes, PipelineKind::Xception).unwrap();
        let view = tensor.to_array_view::<f32>().unwrap();

        for value in view.iter() {
            assert!((-1.0..=1.0).contains(value));
        }
        // Uniform image survives resizing, so channel values stay exact
        assert_eq!(view[[0, 0, 0, 0]], 1.0);
        assert_eq!(view[[0, 0, 0, 1]], -1.0);
        assert_eq!(view[[0, 0, 0, 2]], 1.0);
    }

    #[test]
    fn test_grayscale_converted_to_three_channels() {
        let buffer = ImageBuffer::from_pixel(16, 16, Luma([128u8]));
        let mut bytes = Vec::new();
        buffer
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let tensor = preprocess(&bytes, PipelineKind::Xception).unwrap();
        assert_eq!(tensor.shape(), &[1, 299, 299, 3]);
    }

    #[test]
    fn test_empty_input_rejected() {
        let err = preprocess(&[], PipelineKind::Xception).unwrap_err();
        assert!(matches!(err, PredictError::InvalidImage(_)));
    }

    #[test]
    fn test_undecodable_input_rejected() {
        let err = preprocess(b"definitely not an image", PipelineKind::Xception).unwrap_err();
        assert!(matches!(err, PredictError::InvalidImage(_)));
        assert!(err.is_client_error());
    }
}
