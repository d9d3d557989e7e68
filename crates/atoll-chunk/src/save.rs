use std::io::{Seek, SeekFrom, Write};

use atoll_core::math::{align16, padding_for};

use crate::codec::{encode_chunk_header, encode_data_header};
use crate::error::ChunkError;
use crate::format::*;

const ZERO_PAD: [u8; 16] = [0u8; 16];

/// An owned chunk: header plus payload bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub header: ChunkHeader,
    pub payload: Vec<u8>,
}

impl Chunk {
    pub fn new(header: ChunkHeader, payload: Vec<u8>) -> Self {
        Self { header, payload }
    }

    /// Bytes this chunk occupies on disk, padding included.
    pub fn serialized_len(&self) -> usize {
        CHUNK_HEADER_SIZE + align16(self.payload.len())
    }
}

/// Serialize one chunk: header, then payload padded to 16 bytes.
/// The header's `payload_size` is taken from `payload`.
pub fn serialize_chunk(header: &ChunkHeader, payload: &[u8]) -> Result<Vec<u8>, ChunkError> {
    let mut header = header.clone();
    header.payload_size = payload.len() as u64;

    let mut out = Vec::with_capacity(CHUNK_HEADER_SIZE + align16(payload.len()));
    out.extend_from_slice(&encode_chunk_header(&header)?);
    out.extend_from_slice(payload);
    out.extend_from_slice(&ZERO_PAD[..padding_for(payload.len())]);
    Ok(out)
}

/// Serialize a complete data file holding `chunks` in order.
pub fn serialize_data_file(chunks: &[Chunk]) -> Result<Vec<u8>, ChunkError> {
    let total: usize = chunks.iter().map(Chunk::serialized_len).sum();
    let mut out = Vec::with_capacity(DATA_HEADER_SIZE + total);
    out.extend_from_slice(&encode_data_header(&DataHeader::new(chunks.len())));
    for chunk in chunks {
        out.extend_from_slice(&serialize_chunk(&chunk.header, &chunk.payload)?);
    }
    Ok(out)
}

/// Streams serialized chunks into a data file. A placeholder header is
/// written up front and patched with the real chunk count by `finish`.
pub struct DataFileWriter<W: Write + Seek> {
    out: W,
    chunk_count: usize,
    bytes_written: u64,
}

impl<W: Write + Seek> DataFileWriter<W> {
    pub fn new(mut out: W) -> Result<Self, ChunkError> {
        out.write_all(&encode_data_header(&DataHeader::new(0)))?;
        Ok(Self {
            out,
            chunk_count: 0,
            bytes_written: DATA_HEADER_SIZE as u64,
        })
    }

    /// Append one chunk.
    pub fn append(&mut self, chunk: &Chunk) -> Result<(), ChunkError> {
        let bytes = serialize_chunk(&chunk.header, &chunk.payload)?;
        self.append_serialized(&bytes, 1)
    }

    /// Append `count` chunks that were already serialized back to back.
    pub fn append_serialized(&mut self, bytes: &[u8], count: usize) -> Result<(), ChunkError> {
        self.out.write_all(bytes)?;
        let pad = padding_for(bytes.len());
        self.out.write_all(&ZERO_PAD[..pad])?;
        self.bytes_written += (bytes.len() + pad) as u64;
        self.chunk_count += count;
        Ok(())
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Patch the header with the final chunk count and flush.
    pub fn finish(mut self) -> Result<W, ChunkError> {
        self.out.seek(SeekFrom::Start(0))?;
        self.out
            .write_all(&encode_data_header(&DataHeader::new(self.chunk_count)))?;
        self.out.seek(SeekFrom::End(0))?;
        self.out.flush()?;
        Ok(self.out)
    }
}
