use std::sync::atomic::{AtomicUsize, Ordering};

use intel_tex_2::{bc4, bc7, RSurface, RgbaSurface};
use parking_lot::Mutex;

use crate::error::TextureError;
use crate::format::PixelFormat;
use crate::pyramid::FloatImage;

/// The block compressors are not reentrant: every BC4 and every BC7 encode
/// in the process goes through one lock each. One instance is shared by all
/// jobs of a run.
#[derive(Default)]
pub struct BlockEncoders {
    bc4: Mutex<()>,
    bc7: Mutex<()>,
    bc4_active: AtomicUsize,
    bc7_active: AtomicUsize,
}

impl BlockEncoders {
    pub fn new() -> Self {
        Self::default()
    }

    fn exclusive<R>(lock: &Mutex<()>, active: &AtomicUsize, f: impl FnOnce() -> R) -> R {
        let _guard = lock.lock();
        let previous = active.fetch_add(1, Ordering::SeqCst);
        debug_assert_eq!(previous, 0, "block encoder entered concurrently");
        let result = f();
        active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn bc4(&self, width: u32, height: u32, data: &[u8]) -> Vec<u8> {
        let surface = RSurface {
            data,
            width,
            height,
            stride: width,
        };
        Self::exclusive(&self.bc4, &self.bc4_active, || bc4::compress_blocks(&surface))
    }

    fn bc7(&self, width: u32, height: u32, data: &[u8]) -> Vec<u8> {
        let surface = RgbaSurface {
            data,
            width,
            height,
            stride: width * 4,
        };
        let settings = bc7::alpha_basic_settings();
        Self::exclusive(&self.bc7, &self.bc7_active, || {
            bc7::compress_blocks(&settings, &surface)
        })
    }
}

fn unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn unorm16(v: f32) -> u16 {
    (v.clamp(0.0, 1.0) * 65535.0).round() as u16
}

/// Quantize a single-channel float to the 16-bit unorm value stored in R16.
pub fn quantize_r16(v: f32) -> u16 {
    unorm16(v)
}

/// Encode one mip level. The level must already carry `format.channels()`
/// channels, and block formats need edges that are multiples of 4.
pub fn encode_level(
    level: &FloatImage,
    format: PixelFormat,
    encoders: &BlockEncoders,
) -> Result<Vec<u8>, TextureError> {
    if level.channels != format.channels() {
        return Err(TextureError::LayerMismatch(format!(
            "{} channel level for {:?}",
            level.channels, format
        )));
    }
    if format.is_block_compressed() && (level.width % 4 != 0 || level.height % 4 != 0) {
        return Err(TextureError::NotBlockAligned {
            format,
            width: level.width,
            height: level.height,
        });
    }
    let out = match format {
        PixelFormat::Bc4 => {
            let bytes: Vec<u8> = level.pixels.iter().map(|&v| unorm8(v)).collect();
            encoders.bc4(level.width, level.height, &bytes)
        }
        PixelFormat::Bc7 => {
            let bytes: Vec<u8> = level.pixels.iter().map(|&v| unorm8(v)).collect();
            encoders.bc7(level.width, level.height, &bytes)
        }
        PixelFormat::R8G8B8A8 => level.pixels.iter().map(|&v| unorm8(v)).collect(),
        PixelFormat::R16 => level
            .pixels
            .iter()
            .flat_map(|&v| unorm16(v).to_le_bytes())
            .collect(),
        PixelFormat::R16G16B16A16F => level
            .pixels
            .iter()
            .flat_map(|&v| half::f16::from_f32(v).to_bits().to_le_bytes())
            .collect(),
    };
    let expected = format.level_size(level.width, level.height);
    if out.len() != expected {
        return Err(TextureError::EncodedSize {
            format,
            width: level.width,
            height: level.height,
            expected,
            actual: out.len(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba8_quantization() {
        let level = FloatImage::new(1, 1, 4, vec![0.0, 0.5, 1.0, 2.0]);
        let out =
            encode_level(&level, PixelFormat::R8G8B8A8, &BlockEncoders::new()).expect("encode");
        assert_eq!(out, vec![0, 128, 255, 255]);
    }

    #[test]
    fn test_r16_little_endian() {
        let level = FloatImage::new(2, 1, 1, vec![1.0, 0.0]);
        let out = encode_level(&level, PixelFormat::R16, &BlockEncoders::new()).expect("encode");
        assert_eq!(out, vec![0xFF, 0xFF, 0, 0]);
    }

    #[test]
    fn test_half_float_encoding() {
        let level = FloatImage::new(1, 1, 4, vec![1.0, 0.5, 0.0, -2.0]);
        let out = encode_level(&level, PixelFormat::R16G16B16A16F, &BlockEncoders::new())
            .expect("encode");
        assert_eq!(out, vec![0x00, 0x3C, 0x00, 0x38, 0x00, 0x00, 0x00, 0xC0]);
    }

    #[test]
    fn test_block_sizes() {
        let encoders = BlockEncoders::new();
        let gray = FloatImage::filled(8, 8, &[0.5]);
        assert_eq!(encode_level(&gray, PixelFormat::Bc4, &encoders).expect("bc4").len(), 32);
        let color = FloatImage::filled(8, 4, &[0.2, 0.4, 0.6, 1.0]);
        assert_eq!(encode_level(&color, PixelFormat::Bc7, &encoders).expect("bc7").len(), 32);
    }

    #[test]
    fn test_unaligned_block_level_is_an_error() {
        let level = FloatImage::filled(6, 6, &[0.2, 0.4, 0.6, 1.0]);
        assert!(matches!(
            encode_level(&level, PixelFormat::Bc7, &BlockEncoders::new()),
            Err(TextureError::NotBlockAligned { width: 6, height: 6, .. })
        ));
    }
}
