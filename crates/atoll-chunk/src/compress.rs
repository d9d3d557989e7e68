use crate::error::ChunkError;

/// Compress a side-file blob with LZ4, size prepended.
pub fn compress_blob(data: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(data)
}

/// Decompress a blob written by [`compress_blob`].
pub fn decompress_blob(compressed: &[u8]) -> Result<Vec<u8>, ChunkError> {
    lz4_flex::decompress_size_prepended(compressed)
        .map_err(|e| ChunkError::DecompressError(e.to_string()))
}
