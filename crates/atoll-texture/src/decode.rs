use std::path::Path;

use crate::error::TextureError;
use crate::pyramid::FloatImage;

/// Decode any image the `image` crate understands (PNG, JPEG, TGA, BMP,
/// OpenEXR, HDR...) into four float channels.
pub fn load_image(path: &Path) -> Result<FloatImage, TextureError> {
    let decoded = image::open(path).map_err(|source| TextureError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = decoded.into_rgba32f();
    let (width, height) = rgba.dimensions();
    Ok(FloatImage::new(width, height, 4, rgba.into_raw()))
}

/// Decode an in-memory encoded image (embedded glTF images, for example).
pub fn load_image_from_memory(bytes: &[u8], name: &Path) -> Result<FloatImage, TextureError> {
    let decoded = image::load_from_memory(bytes).map_err(|source| TextureError::Decode {
        path: name.to_path_buf(),
        source,
    })?;
    let rgba = decoded.into_rgba32f();
    let (width, height) = rgba.dimensions();
    Ok(FloatImage::new(width, height, 4, rgba.into_raw()))
}

/// Interpret `bytes` as a headerless little-endian float32 bitmap.
pub fn from_raw_f32(bytes: &[u8], width: u32, height: u32) -> Result<FloatImage, TextureError> {
    let expected = width as usize * height as usize * 4;
    if bytes.len() != expected {
        return Err(TextureError::RawSizeMismatch {
            width,
            height,
            expected,
            actual: bytes.len(),
        });
    }
    let pixels: Vec<f32> = bytemuck::pod_collect_to_vec(bytes);
    Ok(FloatImage::new(width, height, 1, pixels))
}

/// Read a `.r32` raw float file from disk.
pub fn load_raw_f32(path: &Path, width: u32, height: u32) -> Result<FloatImage, TextureError> {
    let bytes = std::fs::read(path).map_err(|source| TextureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_raw_f32(&bytes, width, height)
}

/// Normalize 8-bit interleaved samples to floats.
pub fn from_u8(width: u32, height: u32, channels: usize, data: &[u8]) -> FloatImage {
    let pixels = data.iter().map(|&v| v as f32 / 255.0).collect();
    FloatImage::new(width, height, channels, pixels)
}

/// Normalize 16-bit little-endian interleaved samples to floats.
pub fn from_u16_le(width: u32, height: u32, channels: usize, data: &[u8]) -> FloatImage {
    let pixels = data
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]) as f32 / 65535.0)
        .collect();
    FloatImage::new(width, height, channels, pixels)
}

/// Reinterpret float32 interleaved samples.
pub fn from_f32_le(width: u32, height: u32, channels: usize, data: &[u8]) -> FloatImage {
    FloatImage::new(width, height, channels, bytemuck::pod_collect_to_vec(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_f32_decodes_values() {
        let values = [0.0f32, 0.5, 1.0, 2.0];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let img = from_raw_f32(&bytes, 2, 2).expect("decode");
        assert_eq!(img.channels, 1);
        assert_eq!(img.pixels, values.to_vec());
    }

    #[test]
    fn test_raw_f32_size_checked() {
        assert!(matches!(
            from_raw_f32(&[0u8; 12], 2, 2),
            Err(TextureError::RawSizeMismatch { expected: 16, .. })
        ));
    }

    #[test]
    fn test_u8_normalization() {
        let img = from_u8(1, 1, 2, &[0, 255]);
        assert_eq!(img.pixels, vec![0.0, 1.0]);
    }

    #[test]
    fn test_load_png_from_disk() {
        let path = std::env::temp_dir().join(format!("atoll_decode_{}.png", std::process::id()));
        let img = image::RgbaImage::from_pixel(8, 4, image::Rgba([255, 0, 0, 255]));
        img.save(&path).expect("save png");

        let decoded = load_image(&path).expect("load");
        assert_eq!((decoded.width, decoded.height, decoded.channels), (8, 4, 4));
        assert_eq!(decoded.pixel(3, 2), &[1.0, 0.0, 0.0, 1.0]);
        let _ = std::fs::remove_file(&path);
    }
}
