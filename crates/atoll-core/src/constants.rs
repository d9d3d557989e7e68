//! Single source of truth for constants shared by the packer and the engine
//! loader. Changing any of these changes the on-disk format.

/// Every chunk header and payload starts on a multiple of this many bytes.
pub const ALIGNMENT: usize = 16;

/// Fixed capacity of the relative path stored in a chunk header, NUL included.
pub const MAX_PATH: usize = 260;

/// Highest descriptor binding index (exclusive) a shader may declare.
pub const MAX_SHADER_BINDINGS: usize = 16;

/// Highest vertex input location (exclusive) a vertex shader may declare.
pub const MAX_VERTEX_ATTRIBUTES: usize = 8;

/// Maximum number of materials a single glTF scene may use.
pub const GLTF_MAX_MATERIALS: usize = 16;

/// Maximum number of images a single glTF scene may reference.
pub const GLTF_MAX_TEXTURES: usize = 16;

/// Texture slots per glTF material: base color, normal, metallic-roughness, emissive.
pub const GLTF_TEXTURE_SLOTS: usize = 4;

/// Sentinel texture index meaning "slot unused".
pub const NO_TEXTURE: i32 = -1;

/// Number of faces in a cubemap.
pub const CUBEMAP_FACES: u32 = 6;

/// Default cap on generated mip levels (base level included).
pub const DEFAULT_MAX_MIP_LEVELS: u32 = 16;

/// Largest vertex count that can still be addressed by 16-bit indices.
pub const MAX_U16_INDEXED_VERTICES: usize = 1 << 16;
