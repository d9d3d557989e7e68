pub mod codec;
pub mod compat;
pub mod compress;
pub mod error;
pub mod format;
pub mod load;
pub mod save;

pub use compat::{check_data_file, Compat, RebuildReason};
pub use error::ChunkError;
pub use format::{
    ChunkHeader, DataHeader, FontHeader, GltfHeader, IslandHeader, KindHeader, MeshHeader,
    ShaderBinding, ShaderHeader, TextureHeader, VertexAttribute, CHUNK_HEADER_SIZE,
    DATA_HEADER_SIZE, FORMAT_VERSION,
};
pub use load::{read_chunks, read_data_file, ChunkIndex, ChunkView, DataFile};
pub use save::{serialize_chunk, serialize_data_file, Chunk, DataFileWriter};
