//! Field-by-field encoding of the data header and chunk headers.

use atoll_core::constants::MAX_PATH;
use atoll_core::AssetFlags;

use crate::error::ChunkError;
use crate::format::*;

fn read_i64(bytes: &[u8], at: usize) -> i64 {
    i64::from_le_bytes(bytes[at..at + 8].try_into().expect("8-byte slice"))
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(bytes[at..at + 8].try_into().expect("8-byte slice"))
}

fn check_len(bytes: &[u8], expected: usize) -> Result<(), ChunkError> {
    if bytes.len() < expected {
        return Err(ChunkError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Encode a data header, padded to `DATA_HEADER_SIZE`.
pub fn encode_data_header(header: &DataHeader) -> [u8; DATA_HEADER_SIZE] {
    let mut out = [0u8; DATA_HEADER_SIZE];
    out[0..8].copy_from_slice(&header.magic.to_le_bytes());
    out[8..16].copy_from_slice(&header.version.to_le_bytes());
    out[16..24].copy_from_slice(&header.chunk_count.to_le_bytes());
    out
}

/// Decode a data header without validating magic or version.
pub fn decode_data_header(bytes: &[u8]) -> Result<DataHeader, ChunkError> {
    check_len(bytes, DATA_HEADER_FIELDS)?;
    Ok(DataHeader {
        magic: read_i64(bytes, 0),
        version: read_i64(bytes, 8),
        chunk_count: read_i64(bytes, 16),
    })
}

fn kind_bytes(kind: &KindHeader) -> &[u8] {
    match kind {
        KindHeader::None => &[],
        KindHeader::Font(h) => bytemuck::bytes_of(h),
        KindHeader::Gltf(h) => bytemuck::bytes_of(h),
        KindHeader::Island(h) => bytemuck::bytes_of(h),
        KindHeader::Mesh(h) => bytemuck::bytes_of(h),
        KindHeader::Shader(h) => bytemuck::bytes_of(h),
        KindHeader::Texture(h) => bytemuck::bytes_of(h),
    }
}

/// Encode a chunk header. The flags must name exactly one kind and the
/// kind header variant must agree with it.
pub fn encode_chunk_header(header: &ChunkHeader) -> Result<Vec<u8>, ChunkError> {
    let kind = header
        .flags
        .kind()
        .ok_or(ChunkError::UnknownKind(header.flags))?;
    if !header.kind.matches(kind) {
        return Err(ChunkError::KindMismatch {
            header: header.kind.name(),
            flags: header.flags,
        });
    }

    let path = header.path.as_bytes();
    if path.len() >= MAX_PATH || path.contains(&0) {
        return Err(ChunkError::PathTooLong {
            path: header.path.clone(),
            max: MAX_PATH - 1,
        });
    }

    let mut out = vec![0u8; CHUNK_HEADER_SIZE];
    out[CHUNK_OFFSET_MAGIC..CHUNK_OFFSET_MAGIC + 8].copy_from_slice(&CHUNK_MAGIC.to_le_bytes());
    out[CHUNK_OFFSET_FLAGS..CHUNK_OFFSET_FLAGS + 8].copy_from_slice(&header.flags.0.to_le_bytes());
    out[CHUNK_OFFSET_HASH..CHUNK_OFFSET_HASH + 8]
        .copy_from_slice(&header.content_hash.to_le_bytes());
    out[CHUNK_OFFSET_PATH..CHUNK_OFFSET_PATH + path.len()].copy_from_slice(path);
    out[CHUNK_OFFSET_PAYLOAD_SIZE..CHUNK_OFFSET_PAYLOAD_SIZE + 8]
        .copy_from_slice(&(header.payload_size as i64).to_le_bytes());

    let kind = kind_bytes(&header.kind);
    out[CHUNK_OFFSET_KIND..CHUNK_OFFSET_KIND + kind.len()].copy_from_slice(kind);
    Ok(out)
}

fn read_kind<T: bytemuck::Pod>(region: &[u8]) -> T {
    bytemuck::pod_read_unaligned(&region[..std::mem::size_of::<T>()])
}

/// Decode the chunk header starting at `offset` of `bytes`.
pub fn decode_chunk_header(bytes: &[u8], offset: usize) -> Result<ChunkHeader, ChunkError> {
    check_len(bytes, offset + CHUNK_HEADER_SIZE)?;
    let raw = &bytes[offset..offset + CHUNK_HEADER_SIZE];

    let magic = read_i64(raw, CHUNK_OFFSET_MAGIC);
    if magic != CHUNK_MAGIC {
        return Err(ChunkError::InvalidChunkMagic {
            offset,
            found: magic,
        });
    }

    let flags = AssetFlags(read_u64(raw, CHUNK_OFFSET_FLAGS));
    let content_hash = read_u64(raw, CHUNK_OFFSET_HASH);

    let path_field = &raw[CHUNK_OFFSET_PATH..CHUNK_OFFSET_PATH + MAX_PATH];
    let path_len = path_field.iter().position(|&b| b == 0).unwrap_or(MAX_PATH);
    let path = std::str::from_utf8(&path_field[..path_len])
        .map_err(|_| ChunkError::InvalidPath(offset))?
        .to_string();

    let payload_size = read_i64(raw, CHUNK_OFFSET_PAYLOAD_SIZE);
    if payload_size < 0 {
        return Err(ChunkError::NegativeSize(payload_size));
    }

    let region = &raw[CHUNK_OFFSET_KIND..CHUNK_OFFSET_KIND + KIND_HEADER_SIZE];
    let kind = match flags.kind().ok_or(ChunkError::UnknownKind(flags))? {
        atoll_core::AssetKind::Audio => KindHeader::None,
        atoll_core::AssetKind::Font => KindHeader::Font(read_kind(region)),
        atoll_core::AssetKind::Gltf => KindHeader::Gltf(read_kind(region)),
        atoll_core::AssetKind::Island => KindHeader::Island(read_kind(region)),
        atoll_core::AssetKind::Model => KindHeader::Mesh(read_kind(region)),
        atoll_core::AssetKind::Shader => KindHeader::Shader(read_kind(region)),
        atoll_core::AssetKind::Texture => KindHeader::Texture(read_kind(region)),
    };

    Ok(ChunkHeader {
        flags,
        content_hash,
        path,
        payload_size: payload_size as u64,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture_header() -> ChunkHeader {
        ChunkHeader::new(
            AssetFlags::TEXTURE.with(AssetFlags::UI),
            "ui/button.png",
            KindHeader::Texture(TextureHeader {
                width: 64,
                height: 32,
                mip_levels: 6,
                layers: 1,
                format: 3,
                _pad: 0,
            }),
        )
    }

    #[test]
    fn test_data_header_roundtrip() {
        let header = DataHeader::new(17);
        let bytes = encode_data_header(&header);
        assert_eq!(bytes.len(), DATA_HEADER_SIZE);
        assert_eq!(decode_data_header(&bytes).expect("decode"), header);
    }

    #[test]
    fn test_chunk_header_fields_preserved() {
        let mut header = texture_header();
        header.payload_size = 1234;
        let bytes = encode_chunk_header(&header).expect("encode");
        assert_eq!(bytes.len(), CHUNK_HEADER_SIZE);
        let decoded = decode_chunk_header(&bytes, 0).expect("decode");
        assert_eq!(decoded, header);
        assert_eq!(decoded.texture().map(|t| t.width), Some(64));
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let header = ChunkHeader::new(
            AssetFlags::MODEL,
            "a.obj",
            KindHeader::Font(FontHeader::default()),
        );
        assert!(matches!(
            encode_chunk_header(&header),
            Err(ChunkError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_kind_rejected() {
        let header = ChunkHeader::new(AssetFlags::UI, "a.png", KindHeader::None);
        assert!(matches!(
            encode_chunk_header(&header),
            Err(ChunkError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_long_path_rejected() {
        let header = ChunkHeader::new(AssetFlags::AUDIO, "x".repeat(MAX_PATH), KindHeader::None);
        assert!(matches!(
            encode_chunk_header(&header),
            Err(ChunkError::PathTooLong { .. })
        ));
    }

    #[test]
    fn test_bad_chunk_magic_detected() {
        let mut bytes = encode_chunk_header(&texture_header()).expect("encode");
        bytes[0] ^= 0xFF;
        assert!(matches!(
            decode_chunk_header(&bytes, 0),
            Err(ChunkError::InvalidChunkMagic { offset: 0, .. })
        ));
    }

    #[test]
    fn test_truncated_header_detected() {
        let bytes = encode_chunk_header(&texture_header()).expect("encode");
        assert!(matches!(
            decode_chunk_header(&bytes[..100], 0),
            Err(ChunkError::Truncated { .. })
        ));
    }
}
