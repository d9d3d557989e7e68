//! Reader for KTX 1.1 containers holding pre-encoded cubemaps.

use crate::error::TextureError;
use crate::format::PixelFormat;

const IDENTIFIER: [u8; 12] = [
    0xAB, 0x4B, 0x54, 0x58, 0x20, 0x31, 0x31, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
];
const ENDIAN_LITTLE: u32 = 0x0403_0201;
const HEADER_SIZE: usize = 64;

const GL_RGBA8: u32 = 0x8058;
const GL_R16: u32 = 0x822A;
const GL_RGBA16F: u32 = 0x881A;
const GL_COMPRESSED_RED_RGTC1: u32 = 0x8DBB;
const GL_COMPRESSED_RGBA_BPTC_UNORM: u32 = 0x8E8C;

/// Pixel data of a KTX file, re-ordered face-major (every level of face 0,
/// then face 1...).
#[derive(Debug, Clone)]
pub struct KtxTexture {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub faces: u32,
    pub mip_levels: u32,
    pub data: Vec<u8>,
}

fn map_internal_format(gl: u32) -> Option<PixelFormat> {
    match gl {
        GL_RGBA8 => Some(PixelFormat::R8G8B8A8),
        GL_R16 => Some(PixelFormat::R16),
        GL_RGBA16F => Some(PixelFormat::R16G16B16A16F),
        GL_COMPRESSED_RED_RGTC1 => Some(PixelFormat::Bc4),
        GL_COMPRESSED_RGBA_BPTC_UNORM => Some(PixelFormat::Bc7),
        _ => None,
    }
}

fn field(bytes: &[u8], index: usize) -> u32 {
    let at = 12 + index * 4;
    u32::from_le_bytes(bytes[at..at + 4].try_into().expect("4-byte slice"))
}

fn err(msg: impl Into<String>) -> TextureError {
    TextureError::Ktx(msg.into())
}

/// Parse a little-endian KTX 1.1 file.
pub fn parse_ktx(bytes: &[u8]) -> Result<KtxTexture, TextureError> {
    if bytes.len() < HEADER_SIZE || bytes[..12] != IDENTIFIER {
        return Err(err("missing KTX 1.1 identifier"));
    }
    if field(bytes, 0) != ENDIAN_LITTLE {
        return Err(err("big-endian KTX files are not supported"));
    }

    let internal_format = field(bytes, 4);
    let width = field(bytes, 6);
    let height = field(bytes, 7).max(1);
    let array_elements = field(bytes, 9);
    let faces = field(bytes, 10);
    let mip_levels = field(bytes, 11).max(1);
    let kv_bytes = field(bytes, 12) as usize;

    let format = map_internal_format(internal_format)
        .ok_or_else(|| err(format!("unsupported glInternalFormat {internal_format:#06x}")))?;
    if array_elements > 1 {
        return Err(err("texture arrays are not supported"));
    }
    if faces != 1 && faces != 6 {
        return Err(err(format!("invalid face count {faces}")));
    }
    if width == 0 {
        return Err(err("zero width"));
    }
    let max_levels = u32::BITS - width.max(height).leading_zeros();
    if mip_levels > max_levels {
        return Err(err(format!(
            "{mip_levels} mip levels for {width}x{height}, at most {max_levels}"
        )));
    }

    let mut per_face: Vec<Vec<u8>> = vec![Vec::new(); faces as usize];
    let mut offset = HEADER_SIZE + kv_bytes;
    for level in 0..mip_levels {
        let w = (width >> level).max(1);
        let h = (height >> level).max(1);
        let expected = format.level_size(w, h);

        if offset + 4 > bytes.len() {
            return Err(err(format!("truncated before level {level}")));
        }
        let raw_size = bytes[offset..offset + 4].try_into().expect("4-byte slice");
        let image_size = u32::from_le_bytes(raw_size) as usize;
        offset += 4;
        if image_size != expected {
            return Err(err(format!(
                "level {level} has {image_size} bytes per face, expected {expected}"
            )));
        }

        for face in per_face.iter_mut() {
            let end = offset + image_size;
            if end > bytes.len() {
                return Err(err(format!("truncated in level {level}")));
            }
            face.extend_from_slice(&bytes[offset..end]);
            offset = (end + 3) & !3;
        }
    }

    Ok(KtxTexture {
        format,
        width,
        height,
        faces,
        mip_levels,
        data: per_face.concat(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_ktx(faces: u32, levels: u32, width: u32) -> Vec<u8> {
        let mut out = IDENTIFIER.to_vec();
        let fields = [
            ENDIAN_LITTLE,
            0,
            1,
            0x1908,
            GL_RGBA8,
            0x1908,
            width,
            width,
            0,
            0,
            faces,
            levels,
            0,
        ];
        for f in fields {
            out.extend_from_slice(&f.to_le_bytes());
        }
        for level in 0..levels {
            let w = (width >> level).max(1);
            let size = (w * w * 4) as u32;
            out.extend_from_slice(&size.to_le_bytes());
            for face in 0..faces {
                out.extend(std::iter::repeat((face * 16 + level) as u8).take(size as usize));
            }
        }
        out
    }

    #[test]
    fn test_cubemap_reordered_face_major() {
        let ktx = parse_ktx(&build_ktx(6, 2, 2)).expect("parse");
        assert_eq!(ktx.faces, 6);
        assert_eq!(ktx.mip_levels, 2);
        assert_eq!(ktx.format, PixelFormat::R8G8B8A8);
        // per face: 16 bytes level 0, then 4 bytes level 1
        assert_eq!(ktx.data.len(), 6 * 20);
        assert_eq!(ktx.data[0], 0);
        assert_eq!(ktx.data[16], 1);
        assert_eq!(ktx.data[20], 16);
        assert_eq!(ktx.data[5 * 20 + 16], 81);
    }

    #[test]
    fn test_bad_identifier_rejected() {
        let mut bytes = build_ktx(1, 1, 2);
        bytes[1] = b'X';
        assert!(matches!(parse_ktx(&bytes), Err(TextureError::Ktx(_))));
    }

    #[test]
    fn test_truncated_rejected() {
        let bytes = build_ktx(6, 1, 4);
        assert!(parse_ktx(&bytes[..bytes.len() - 8]).is_err());
    }

    #[test]
    fn test_too_many_levels_rejected() {
        let mut bytes = build_ktx(1, 1, 4);
        bytes[12 + 11 * 4..12 + 12 * 4].copy_from_slice(&40u32.to_le_bytes());
        assert!(matches!(parse_ktx(&bytes), Err(TextureError::Ktx(_))));

        bytes[12 + 11 * 4..12 + 12 * 4].copy_from_slice(&4u32.to_le_bytes());
        assert!(matches!(parse_ktx(&bytes), Err(TextureError::Ktx(_))));

        let full = build_ktx(1, 3, 4);
        assert_eq!(parse_ktx(&full).expect("full chain").mip_levels, 3);
    }
}
