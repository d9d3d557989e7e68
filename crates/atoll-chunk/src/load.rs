use std::collections::HashMap;

use atoll_core::math::align16;
use atoll_core::ContentHash;

use crate::compat;
use crate::codec::{decode_chunk_header, decode_data_header};
use crate::error::ChunkError;
use crate::format::*;
use crate::save::Chunk;

/// A decoded chunk header with a borrowed view of its payload.
#[derive(Debug, Clone)]
pub struct ChunkView<'a> {
    /// Byte offset of the chunk header inside the buffer it was read from.
    pub offset: usize,
    pub header: ChunkHeader,
    pub payload: &'a [u8],
}

impl ChunkView<'_> {
    pub fn to_owned_chunk(&self) -> Chunk {
        Chunk::new(self.header.clone(), self.payload.to_vec())
    }
}

/// A parsed data file.
#[derive(Debug)]
pub struct DataFile<'a> {
    pub header: DataHeader,
    pub chunks: Vec<ChunkView<'a>>,
}

/// Walk `count` chunks starting at `start`. Each step reads a header, checks
/// its magic and advances by the aligned header and payload sizes.
fn walk(
    bytes: &[u8],
    start: usize,
    count: Option<usize>,
) -> Result<Vec<ChunkView<'_>>, ChunkError> {
    let mut chunks = Vec::new();
    let mut offset = start;
    loop {
        match count {
            Some(n) if chunks.len() == n => break,
            None if offset >= bytes.len() => break,
            _ => {}
        }

        let header = decode_chunk_header(bytes, offset)?;
        let payload_start = offset + align16(CHUNK_HEADER_SIZE);
        let payload_end = match payload_start.checked_add(header.payload_size as usize) {
            Some(end) if end <= bytes.len() => end,
            _ => {
                return Err(ChunkError::Truncated {
                    expected: payload_start.saturating_add(header.payload_size as usize),
                    actual: bytes.len(),
                })
            }
        };

        chunks.push(ChunkView {
            offset,
            payload: &bytes[payload_start..payload_end],
            header,
        });
        offset = payload_start + align16(payload_end - payload_start);
    }
    Ok(chunks)
}

/// Parse a complete data file: validated header followed by its chunks.
pub fn read_data_file(bytes: &[u8]) -> Result<DataFile<'_>, ChunkError> {
    let header = decode_data_header(bytes)?;
    compat::validate_data_header(&header)?;
    if header.chunk_count < 0 {
        return Err(ChunkError::NegativeSize(header.chunk_count));
    }
    let chunks = walk(bytes, DATA_HEADER_SIZE, Some(header.chunk_count as usize))?;
    Ok(DataFile { header, chunks })
}

/// Parse chunks serialized back to back with no data header.
pub fn read_chunks(bytes: &[u8]) -> Result<Vec<ChunkView<'_>>, ChunkError> {
    walk(bytes, 0, None)
}

/// Content-hash lookup over the chunks of one data file.
#[derive(Debug, Default)]
pub struct ChunkIndex<'a> {
    by_hash: HashMap<ContentHash, ChunkView<'a>>,
}

impl<'a> ChunkIndex<'a> {
    /// Index `chunks`. On a hash collision the first chunk wins.
    pub fn build(chunks: Vec<ChunkView<'a>>) -> Self {
        let mut by_hash = HashMap::with_capacity(chunks.len());
        for chunk in chunks {
            let hash = chunk.header.content_hash;
            if by_hash.contains_key(&hash) {
                log::warn!(
                    "Duplicate content hash {:016x} for '{}', keeping the first chunk",
                    hash,
                    chunk.header.path
                );
                continue;
            }
            by_hash.insert(hash, chunk);
        }
        Self { by_hash }
    }

    pub fn from_data_file(bytes: &'a [u8]) -> Result<Self, ChunkError> {
        Ok(Self::build(read_data_file(bytes)?.chunks))
    }

    pub fn get(&self, hash: ContentHash) -> Option<&ChunkView<'a>> {
        self.by_hash.get(&hash)
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save::{serialize_chunk, serialize_data_file};
    use atoll_core::{content_hash, AssetFlags};

    fn sample_chunks() -> Vec<Chunk> {
        vec![
            Chunk::new(
                ChunkHeader::new(
                    AssetFlags::MODEL,
                    "models/rock.obj",
                    KindHeader::Mesh(MeshHeader {
                        vertex_count: 3,
                        index_count: 3,
                        index_size: 2,
                        vertex_stride: 32,
                        center: [1.0, 2.0, 3.0],
                        extents: [0.5, 0.5, 0.5],
                    }),
                ),
                (0u8..101).collect(),
            ),
            Chunk::new(
                ChunkHeader::new(AssetFlags::AUDIO, "sfx/splash.wav", KindHeader::None),
                vec![7; 16],
            ),
            Chunk::new(
                ChunkHeader::new(
                    AssetFlags::FONT,
                    "fonts/body.fnt",
                    KindHeader::Font(FontHeader {
                        line_height: 18,
                        base: 14,
                        scale_w: 256,
                        scale_h: 256,
                        page_count: 1,
                        glyph_count: 0,
                    }),
                ),
                Vec::new(),
            ),
        ]
    }

    #[test]
    fn test_data_file_roundtrip() {
        let chunks = sample_chunks();
        let bytes = serialize_data_file(&chunks).expect("serialize");
        let file = read_data_file(&bytes).expect("read");
        assert_eq!(file.header.chunk_count, 3);
        for (view, original) in file.chunks.iter().zip(&chunks) {
            assert_eq!(view.header.path, original.header.path);
            assert_eq!(view.header.flags, original.header.flags);
            assert_eq!(view.header.kind, original.header.kind);
            assert_eq!(view.header.content_hash, original.header.content_hash);
            assert_eq!(view.payload, original.payload.as_slice());
        }
    }

    #[test]
    fn test_chunk_offsets_are_aligned_and_contiguous() {
        let chunks = sample_chunks();
        let bytes = serialize_data_file(&chunks).expect("serialize");
        let file = read_data_file(&bytes).expect("read");

        for pair in file.chunks.windows(2) {
            let first = &pair[0];
            assert_eq!(first.offset % 16, 0);
            let next = align16(first.offset + CHUNK_HEADER_SIZE + first.payload.len());
            assert_eq!(next, pair[1].offset);
        }
        let last = file.chunks.last().expect("chunks");
        assert_eq!(last.offset % 16, 0);
        assert_eq!(
            align16(last.offset + CHUNK_HEADER_SIZE + last.payload.len()),
            bytes.len()
        );
    }

    #[test]
    fn test_read_chunks_without_data_header() {
        let chunks = sample_chunks();
        let mut bytes = Vec::new();
        for chunk in &chunks {
            bytes.extend(serialize_chunk(&chunk.header, &chunk.payload).expect("serialize"));
        }
        let views = read_chunks(&bytes).expect("read");
        assert_eq!(views.len(), 3);
        assert_eq!(views[2].header.path, "fonts/body.fnt");
    }

    #[test]
    fn test_corrupt_chunk_magic_is_fatal() {
        let mut bytes = serialize_data_file(&sample_chunks()).expect("serialize");
        let second = DATA_HEADER_SIZE + CHUNK_HEADER_SIZE + align16(101);
        bytes[second] ^= 0x55;
        assert!(matches!(
            read_data_file(&bytes),
            Err(ChunkError::InvalidChunkMagic { offset, .. }) if offset == second
        ));
    }

    #[test]
    fn test_truncated_payload_detected() {
        let bytes = serialize_data_file(&sample_chunks()).expect("serialize");
        let cut = DATA_HEADER_SIZE + CHUNK_HEADER_SIZE + 50;
        assert!(matches!(
            read_data_file(&bytes[..cut]),
            Err(ChunkError::Truncated { .. })
        ));
    }

    #[test]
    fn test_index_lookup_by_hash() {
        let bytes = serialize_data_file(&sample_chunks()).expect("serialize");
        let index = ChunkIndex::from_data_file(&bytes).expect("index");
        assert_eq!(index.len(), 3);
        let rock = index.get(content_hash("models/rock.obj")).expect("rock");
        assert_eq!(rock.payload.len(), 101);
        assert!(index.get(content_hash("models/missing.obj")).is_none());
    }
}
