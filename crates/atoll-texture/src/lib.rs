pub mod decode;
pub mod encode;
pub mod error;
pub mod format;
pub mod ktx;
pub mod pyramid;

use atoll_chunk::TextureHeader;

pub use encode::{encode_level, quantize_r16, BlockEncoders};
pub use error::TextureError;
pub use format::PixelFormat;
pub use pyramid::{make_mipmaps, FloatImage, Pyramid};

/// GPU-ready texture bytes: every layer's mip chain, layer-major.
#[derive(Debug, Clone)]
pub struct EncodedTexture {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub layers: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl EncodedTexture {
    pub fn header(&self) -> TextureHeader {
        TextureHeader {
            width: self.width,
            height: self.height,
            mip_levels: self.mip_levels,
            layers: self.layers,
            format: self.format as u32,
            _pad: 0,
        }
    }
}

impl From<ktx::KtxTexture> for EncodedTexture {
    fn from(ktx: ktx::KtxTexture) -> Self {
        Self {
            width: ktx.width,
            height: ktx.height,
            mip_levels: ktx.mip_levels,
            layers: ktx.faces,
            format: ktx.format,
            data: ktx.data,
        }
    }
}

/// Build mip chains for every layer and encode them to `format`.
/// All layers must share the base dimensions.
pub fn encode_texture(
    layers: Vec<FloatImage>,
    format: PixelFormat,
    max_levels: u32,
    encoders: &BlockEncoders,
) -> Result<EncodedTexture, TextureError> {
    let first = layers.first().ok_or(TextureError::Empty)?;
    let (width, height) = (first.width, first.height);
    if let Some(bad) = layers.iter().find(|l| (l.width, l.height) != (width, height)) {
        return Err(TextureError::LayerMismatch(format!(
            "{}x{} layer next to {}x{}",
            bad.width, bad.height, width, height
        )));
    }

    let layer_count = layers.len() as u32;
    let mut data = Vec::new();
    let mut mip_levels = 0;
    for layer in layers {
        let pyramid = make_mipmaps(layer, format, max_levels)?;
        mip_levels = pyramid.level_count();
        for level in &pyramid.levels {
            data.extend(encode_level(level, format, encoders)?);
        }
    }

    log::debug!(
        "Encoded {}x{} {:?}: {} layer(s), {} level(s), {} bytes",
        width,
        height,
        format,
        layer_count,
        mip_levels,
        data.len()
    );

    Ok(EncodedTexture {
        width,
        height,
        mip_levels,
        layers: layer_count,
        format,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bc7_256_scenario() {
        let base = FloatImage::filled(256, 256, &[0.1, 0.2, 0.3, 0.4]);
        let encoded = encode_texture(vec![base], PixelFormat::Bc7, 16, &BlockEncoders::new())
            .expect("encode");
        assert_eq!(encoded.width, 256);
        assert_eq!(encoded.mip_levels, 7);
        let expected: usize = (0..7).map(|l| (256usize >> l) * (256usize >> l)).sum();
        assert_eq!(encoded.data.len(), expected);
        assert_eq!(encoded.header().format, PixelFormat::Bc7 as u32);
    }

    #[test]
    fn test_bc7_non_power_of_two_payload_matches_levels() {
        let base = FloatImage::filled(24, 24, &[0.5, 0.25, 0.75, 1.0]);
        let encoded = encode_texture(vec![base], PixelFormat::Bc7, 16, &BlockEncoders::new())
            .expect("encode");
        assert_eq!(encoded.mip_levels, 2);
        let expected: usize = [(24, 24), (12, 12)]
            .iter()
            .map(|&(w, h)| PixelFormat::Bc7.level_size(w, h))
            .sum();
        assert_eq!(encoded.data.len(), expected);
    }

    #[test]
    fn test_cubemap_layers() {
        let faces: Vec<FloatImage> = (0..6)
            .map(|i| FloatImage::filled(4, 4, &[i as f32 / 6.0, 0.0, 0.0, 1.0]))
            .collect();
        let encoded = encode_texture(faces, PixelFormat::R8G8B8A8, 16, &BlockEncoders::new())
            .expect("encode");
        assert_eq!(encoded.layers, 6);
        assert_eq!(encoded.mip_levels, 3);
        assert_eq!(encoded.data.len(), 6 * (64 + 16 + 4));
    }

    #[test]
    fn test_layer_size_mismatch_rejected() {
        let layers = vec![
            FloatImage::filled(4, 4, &[0.0]),
            FloatImage::filled(8, 8, &[0.0]),
        ];
        assert!(matches!(
            encode_texture(layers, PixelFormat::R16, 16, &BlockEncoders::new()),
            Err(TextureError::LayerMismatch(_))
        ));
    }
}
