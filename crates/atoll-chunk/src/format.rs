use atoll_core::constants::{
    GLTF_MAX_MATERIALS, GLTF_MAX_TEXTURES, GLTF_TEXTURE_SLOTS, MAX_PATH, MAX_SHADER_BINDINGS,
    MAX_VERTEX_ATTRIBUTES, NO_TEXTURE,
};
use atoll_core::math::align16;
use atoll_core::{AssetFlags, AssetKind, ContentHash};

#[cfg(not(target_endian = "little"))]
compile_error!("kind headers are stored in native byte order, which must be little endian");

/// Magic at the start of every data file ("ATOLDATA").
pub const DATA_MAGIC: i64 = i64::from_le_bytes(*b"ATOLDATA");

/// Magic at the start of every chunk header ("ATOLCHNK").
pub const CHUNK_MAGIC: i64 = i64::from_le_bytes(*b"ATOLCHNK");

/// Bytes used by the data header fields (magic, version, chunk count).
pub const DATA_HEADER_FIELDS: usize = 24;

/// Data header size on disk, padded to the chunk alignment.
pub const DATA_HEADER_SIZE: usize = align16(DATA_HEADER_FIELDS);

/// Capacity of the kind-specific region at the end of a chunk header.
pub const KIND_HEADER_SIZE: usize = 472;

/// Byte offset of each chunk header field.
pub const CHUNK_OFFSET_MAGIC: usize = 0;
pub const CHUNK_OFFSET_FLAGS: usize = 8;
pub const CHUNK_OFFSET_HASH: usize = 16;
pub const CHUNK_OFFSET_PATH: usize = 24;
pub const CHUNK_OFFSET_PAYLOAD_SIZE: usize = (CHUNK_OFFSET_PATH + MAX_PATH + 7) & !7;
pub const CHUNK_OFFSET_KIND: usize = CHUNK_OFFSET_PAYLOAD_SIZE + 8;

/// Full chunk header size on disk.
pub const CHUNK_HEADER_SIZE: usize = align16(CHUNK_OFFSET_KIND + KIND_HEADER_SIZE);

/// Bumped by hand for semantic changes; layout changes bump it automatically.
pub const VERSION_BASE: i64 = 0x0001_0000;

/// Format version written into both data files. Any change to the chunk
/// header size yields a different version and forces a clean rebuild.
pub const FORMAT_VERSION: i64 = VERSION_BASE + CHUNK_HEADER_SIZE as i64;

/// Top-level header shared by the data file and the texture file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    pub magic: i64,
    pub version: i64,
    pub chunk_count: i64,
}

impl DataHeader {
    pub fn new(chunk_count: usize) -> Self {
        Self {
            magic: DATA_MAGIC,
            version: FORMAT_VERSION,
            chunk_count: chunk_count as i64,
        }
    }
}

/// Bitmap font metrics. Glyph arrays live in the payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FontHeader {
    pub line_height: u32,
    pub base: u32,
    pub scale_w: u32,
    pub scale_h: u32,
    pub page_count: u32,
    pub glyph_count: u32,
}

/// Scene header: buffer sizes, texture hash table and per-material texture
/// indices (`NO_TEXTURE` for unused slots).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GltfHeader {
    pub material_count: u32,
    pub texture_count: u32,
    pub vertex_count: u32,
    pub index_count: u32,
    pub texture_hashes: [u64; GLTF_MAX_TEXTURES],
    pub material_textures: [[i32; GLTF_TEXTURE_SLOTS]; GLTF_MAX_MATERIALS],
}

impl Default for GltfHeader {
    fn default() -> Self {
        Self {
            material_count: 0,
            texture_count: 0,
            vertex_count: 0,
            index_count: 0,
            texture_hashes: [0; GLTF_MAX_TEXTURES],
            material_textures: [[NO_TEXTURE; GLTF_TEXTURE_SLOTS]; GLTF_MAX_MATERIALS],
        }
    }
}

/// Island terrain header. A zero hash means the artifact was not produced.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct IslandHeader {
    pub ambient_occlusion_hash: ContentHash,
    pub color_hash: ContentHash,
    pub normals_hash: ContentHash,
    pub elevation_hash: ContentHash,
    pub beach_elevation: f32,
    pub width: u32,
    pub height: u32,
    pub _pad: u32,
}

/// Static mesh header. `index_size` is 2 or 4.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshHeader {
    pub vertex_count: u32,
    pub index_count: u32,
    pub index_size: u32,
    pub vertex_stride: u32,
    pub center: [f32; 3],
    pub extents: [f32; 3],
}

/// One descriptor binding slot. `descriptor_type == 0` means unused.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShaderBinding {
    pub descriptor_type: u32,
    pub count: u32,
}

/// One vertex input attribute.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: u32,
    pub offset: u32,
}

/// Shader reflection data, indexed by binding number and attribute order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShaderHeader {
    pub stage: u32,
    pub vertex_stride: u32,
    pub attribute_count: u32,
    pub binding_mask: u32,
    pub bindings: [ShaderBinding; MAX_SHADER_BINDINGS],
    pub attributes: [VertexAttribute; MAX_VERTEX_ATTRIBUTES],
}

/// Texture dimensions and encoding. The payload holds every layer's mip chain,
/// layer-major, largest level first.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TextureHeader {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub layers: u32,
    pub format: u32,
    pub _pad: u32,
}

/// Kind-specific header, tagged by the kind bit of the chunk flags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KindHeader {
    None,
    Font(FontHeader),
    Gltf(GltfHeader),
    Island(IslandHeader),
    Mesh(MeshHeader),
    Shader(ShaderHeader),
    Texture(TextureHeader),
}

impl KindHeader {
    pub fn name(&self) -> &'static str {
        match self {
            KindHeader::None => "none",
            KindHeader::Font(_) => "font",
            KindHeader::Gltf(_) => "gltf",
            KindHeader::Island(_) => "island",
            KindHeader::Mesh(_) => "mesh",
            KindHeader::Shader(_) => "shader",
            KindHeader::Texture(_) => "texture",
        }
    }

    /// Whether this header variant is the one an asset of `kind` carries.
    pub fn matches(&self, kind: AssetKind) -> bool {
        matches!(
            (self, kind),
            (KindHeader::None, AssetKind::Audio)
                | (KindHeader::Font(_), AssetKind::Font)
                | (KindHeader::Gltf(_), AssetKind::Gltf)
                | (KindHeader::Island(_), AssetKind::Island)
                | (KindHeader::Mesh(_), AssetKind::Model)
                | (KindHeader::Shader(_), AssetKind::Shader)
                | (KindHeader::Texture(_), AssetKind::Texture)
        )
    }
}

/// Decoded chunk header. The magic is implicit: written on encode, checked
/// on decode.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkHeader {
    pub flags: AssetFlags,
    pub content_hash: ContentHash,
    pub path: String,
    pub payload_size: u64,
    pub kind: KindHeader,
}

impl ChunkHeader {
    /// Build a header for `path` with its content hash. `payload_size` is
    /// filled in by the serializer.
    pub fn new(flags: AssetFlags, path: impl Into<String>, kind: KindHeader) -> Self {
        let path = path.into();
        Self {
            flags,
            content_hash: atoll_core::content_hash(&path),
            path,
            payload_size: 0,
            kind,
        }
    }

    pub fn texture(&self) -> Option<&TextureHeader> {
        match &self.kind {
            KindHeader::Texture(t) => Some(t),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_headers_fit_region() {
        let sizes = [
            std::mem::size_of::<FontHeader>(),
            std::mem::size_of::<GltfHeader>(),
            std::mem::size_of::<IslandHeader>(),
            std::mem::size_of::<MeshHeader>(),
            std::mem::size_of::<ShaderHeader>(),
            std::mem::size_of::<TextureHeader>(),
        ];
        for size in sizes {
            assert!(size <= KIND_HEADER_SIZE, "kind header of {size} bytes overflows");
        }
    }

    #[test]
    fn test_header_sizes() {
        assert_eq!(std::mem::size_of::<GltfHeader>(), 400);
        assert_eq!(std::mem::size_of::<ShaderHeader>(), 240);
        assert_eq!(std::mem::size_of::<IslandHeader>(), 48);
        assert_eq!(DATA_HEADER_SIZE, 32);
        assert_eq!(CHUNK_OFFSET_PAYLOAD_SIZE, 288);
        assert_eq!(CHUNK_HEADER_SIZE, 768);
        assert_eq!(CHUNK_HEADER_SIZE % 16, 0);
    }

    #[test]
    fn test_version_tracks_header_size() {
        assert_eq!(FORMAT_VERSION - VERSION_BASE, CHUNK_HEADER_SIZE as i64);
    }

    #[test]
    fn test_magics_differ() {
        assert_ne!(DATA_MAGIC, CHUNK_MAGIC);
    }
}
