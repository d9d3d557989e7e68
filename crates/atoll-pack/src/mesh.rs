//! Vertex processing shared by model and glTF jobs, plus the compressed
//! mesh blob written by the glTF pre-export (and read back as `.mesh`).

use std::collections::HashMap;

use atoll_chunk::compress::{compress_blob, decompress_blob};
use atoll_chunk::ChunkError;
use atoll_core::constants::MAX_U16_INDEXED_VERTICES;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Interleaved vertex as consumed by the engine's static mesh pipeline.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

pub const VERTEX_STRIDE: usize = std::mem::size_of::<Vertex>();

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    /// Raw bit pattern, used for exact equality and hashing.
    pub fn bits(&self) -> [u32; 8] {
        bytemuck::cast(*self)
    }

    fn same_bits(&self, other: &Vertex) -> bool {
        self.bits() == other.bits()
    }
}

/// Merge bitwise-identical vertices. Output keeps first-seen order.
pub fn dedup_exact(vertices: &[Vertex], indices: &[u32]) -> (Vec<Vertex>, Vec<u32>) {
    let mut lookup: HashMap<[u32; 8], u32> = HashMap::with_capacity(vertices.len());
    let mut unique = Vec::with_capacity(vertices.len());
    let mut remap = Vec::with_capacity(vertices.len());
    for v in vertices {
        let next = unique.len() as u32;
        let id = *lookup.entry(v.bits()).or_insert_with(|| {
            unique.push(*v);
            next
        });
        remap.push(id);
    }
    let indices = indices.iter().map(|&i| remap[i as usize]).collect();
    (unique, indices)
}

/// Incremental dedup by linear scan over already-emitted vertices.
/// Quadratic in vertex count.
#[derive(Debug, Default)]
pub struct LinearDedup {
    pub vertices: Vec<Vertex>,
}

impl LinearDedup {
    /// Index of `v`, appending it if no identical vertex exists yet.
    pub fn push(&mut self, v: Vertex) -> u32 {
        match self.vertices.iter().position(|e| e.same_bits(&v)) {
            Some(i) => i as u32,
            None => {
                self.vertices.push(v);
                (self.vertices.len() - 1) as u32
            }
        }
    }
}

fn face_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a)
}

/// Unshare every triangle and give its corners the face normal.
pub fn flat_normals(vertices: &[Vertex], indices: &[u32]) -> (Vec<Vertex>, Vec<u32>) {
    let mut out = Vec::with_capacity(indices.len());
    for tri in indices.chunks_exact(3) {
        let corners = [
            vertices[tri[0] as usize],
            vertices[tri[1] as usize],
            vertices[tri[2] as usize],
        ];
        let n = face_normal(
            Vec3::from(corners[0].position),
            Vec3::from(corners[1].position),
            Vec3::from(corners[2].position),
        )
        .normalize_or_zero();
        for mut c in corners {
            c.normal = n.to_array();
            out.push(c);
        }
    }
    let indices = (0..out.len() as u32).collect();
    (out, indices)
}

/// Area-weighted average of the face normals around each position. Vertices
/// sharing a position (bitwise) share the result.
pub fn smooth_normals(vertices: &mut [Vertex], indices: &[u32]) {
    let key = |v: &Vertex| -> [u32; 3] { bytemuck::cast(v.position) };
    let mut sums: HashMap<[u32; 3], Vec3> = HashMap::new();
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| vertices[i as usize]);
        let n = face_normal(a.position.into(), b.position.into(), c.position.into());
        for v in [a, b, c] {
            *sums.entry(key(&v)).or_insert(Vec3::ZERO) += n;
        }
    }
    for v in vertices.iter_mut() {
        let n = sums.get(&key(v)).copied().unwrap_or(Vec3::ZERO);
        v.normal = n.normalize_or_zero().to_array();
    }
}

/// Translate vertices so the bounding box is centered on the origin.
/// Returns the original center and the half extents.
pub fn recenter(vertices: &mut [Vertex]) -> (Vec3, Vec3) {
    if vertices.is_empty() {
        return (Vec3::ZERO, Vec3::ZERO);
    }
    let (min, max) = vertices.iter().fold(
        (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
        |(min, max), v| {
            let p = Vec3::from(v.position);
            (min.min(p), max.max(p))
        },
    );
    let center = (min + max) * 0.5;
    for v in vertices.iter_mut() {
        v.position = (Vec3::from(v.position) - center).to_array();
    }
    (center, (max - min) * 0.5)
}

/// Encode indices as 16-bit when every vertex is addressable that way,
/// else 32-bit. Returns the index size in bytes and the LE bytes.
pub fn encode_indices(indices: &[u32], vertex_count: usize) -> (u32, Vec<u8>) {
    if vertex_count <= MAX_U16_INDEXED_VERTICES {
        let bytes = indices
            .iter()
            .flat_map(|&i| (i as u16).to_le_bytes())
            .collect();
        (2, bytes)
    } else {
        (4, indices.iter().flat_map(|&i| i.to_le_bytes()).collect())
    }
}

// ---------------------------------------------------------------------------
// Mesh blob
// ---------------------------------------------------------------------------

const MESH_MAGIC: [u8; 8] = *b"ATOLMESH";
const MESH_VERSION: u32 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BlobHeader {
    magic: [u8; 8],
    version: u32,
    material_count: u32,
    submesh_count: u32,
    vertex_count: u32,
    index_count: u32,
    _pad: u32,
}

const BLOB_HEADER_SIZE: usize = std::mem::size_of::<BlobHeader>();

/// Range of the index buffer drawn with one material.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Submesh {
    pub material: u32,
    pub index_offset: u32,
    pub index_count: u32,
    pub _pad: u32,
}

/// Flattened, deduplicated scene geometry grouped by material.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshBlob {
    pub material_count: u32,
    pub submeshes: Vec<Submesh>,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshBlob {
    pub fn to_bytes(&self) -> Vec<u8> {
        let header = BlobHeader {
            magic: MESH_MAGIC,
            version: MESH_VERSION,
            material_count: self.material_count,
            submesh_count: self.submeshes.len() as u32,
            vertex_count: self.vertices.len() as u32,
            index_count: self.indices.len() as u32,
            _pad: 0,
        };
        let mut raw = Vec::new();
        raw.extend_from_slice(bytemuck::bytes_of(&header));
        raw.extend_from_slice(bytemuck::cast_slice(&self.submeshes));
        raw.extend_from_slice(bytemuck::cast_slice(&self.vertices));
        raw.extend_from_slice(bytemuck::cast_slice(&self.indices));
        compress_blob(&raw)
    }

    pub fn from_bytes(compressed: &[u8]) -> Result<Self, ChunkError> {
        let raw = decompress_blob(compressed)?;
        if raw.len() < BLOB_HEADER_SIZE {
            return Err(ChunkError::Truncated {
                expected: BLOB_HEADER_SIZE,
                actual: raw.len(),
            });
        }
        let header: BlobHeader = bytemuck::pod_read_unaligned(&raw[..BLOB_HEADER_SIZE]);
        if header.magic != MESH_MAGIC || header.version != MESH_VERSION {
            return Err(ChunkError::DecompressError(
                "not a mesh blob or unsupported version".to_string(),
            ));
        }

        let sub_len = header.submesh_count as usize * std::mem::size_of::<Submesh>();
        let vert_len = header.vertex_count as usize * VERTEX_STRIDE;
        let idx_len = header.index_count as usize * 4;
        let expected = BLOB_HEADER_SIZE + sub_len + vert_len + idx_len;
        if raw.len() != expected {
            return Err(ChunkError::Truncated {
                expected,
                actual: raw.len(),
            });
        }

        let (submeshes, rest) = raw[BLOB_HEADER_SIZE..].split_at(sub_len);
        let (vertices, indices) = rest.split_at(vert_len);
        Ok(Self {
            material_count: header.material_count,
            submeshes: bytemuck::pod_collect_to_vec(submeshes),
            vertices: bytemuck::pod_collect_to_vec(vertices),
            indices: bytemuck::pod_collect_to_vec(indices),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> (Vec<Vertex>, Vec<u32>) {
        let v = |x: f32, y: f32| Vertex::new([x, y, 0.0], [0.0; 3], [x, y]);
        // Two triangles sharing an edge, corners duplicated.
        let vertices = vec![
            v(0.0, 0.0),
            v(1.0, 0.0),
            v(1.0, 1.0),
            v(0.0, 0.0),
            v(1.0, 1.0),
            v(0.0, 1.0),
        ];
        (vertices, (0..6).collect())
    }

    #[test]
    fn test_vertex_stride() {
        assert_eq!(VERTEX_STRIDE, 32);
    }

    #[test]
    fn test_dedup_exact_merges_shared_corners() {
        let (vertices, indices) = quad();
        let (unique, indices) = dedup_exact(&vertices, &indices);
        assert_eq!(unique.len(), 4);
        assert_eq!(indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(unique[3].position, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_dedup_is_bitwise() {
        let a = Vertex::new([0.0, 0.0, 0.0], [0.0; 3], [0.0; 2]);
        let b = Vertex::new([-0.0, 0.0, 0.0], [0.0; 3], [0.0; 2]);
        let (unique, _) = dedup_exact(&[a, b], &[0, 1]);
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn test_linear_dedup_first_match_wins() {
        let (vertices, _) = quad();
        let mut dedup = LinearDedup::default();
        let ids: Vec<u32> = vertices.iter().map(|v| dedup.push(*v)).collect();
        assert_eq!(ids, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(dedup.vertices.len(), 4);
    }

    #[test]
    fn test_flat_normals_unshare() {
        let (vertices, indices) = quad();
        let (unique, indices) = dedup_exact(&vertices, &indices);
        let (flat, flat_indices) = flat_normals(&unique, &indices);
        assert_eq!(flat.len(), 6);
        assert_eq!(flat_indices.len(), 6);
        for v in &flat {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_smooth_normals_average() {
        // Two faces meeting at a right angle along the x axis.
        let mut vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0; 3], [0.0; 2]),
            Vertex::new([1.0, 0.0, 0.0], [0.0; 3], [0.0; 2]),
            Vertex::new([0.0, 1.0, 0.0], [0.0; 3], [0.0; 2]),
            Vertex::new([0.0, 0.0, 1.0], [0.0; 3], [0.0; 2]),
        ];
        let indices = [0, 1, 2, 0, 3, 1];
        smooth_normals(&mut vertices, &indices);
        let shared = Vec3::from(vertices[0].normal);
        assert!((shared.length() - 1.0).abs() < 1e-5);
        assert!((shared - Vec3::new(0.0, 1.0, 1.0).normalize()).length() < 1e-5);
        assert_eq!(vertices[2].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_recenter() {
        let mut vertices = vec![
            Vertex::new([2.0, 0.0, 0.0], [0.0; 3], [0.0; 2]),
            Vertex::new([4.0, 2.0, 2.0], [0.0; 3], [0.0; 2]),
        ];
        let (center, extents) = recenter(&mut vertices);
        assert_eq!(center, Vec3::new(3.0, 1.0, 1.0));
        assert_eq!(extents, Vec3::ONE);
        assert_eq!(vertices[0].position, [-1.0, -1.0, -1.0]);
    }

    #[test]
    fn test_index_width_selection() {
        let (size, bytes) = encode_indices(&[0, 1, 65535], 65536);
        assert_eq!(size, 2);
        assert_eq!(bytes, vec![0, 0, 1, 0, 0xFF, 0xFF]);
        let (size, bytes) = encode_indices(&[65536], 65537);
        assert_eq!(size, 4);
        assert_eq!(bytes, 65536u32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_mesh_blob_round_trip() {
        let (vertices, indices) = quad();
        let blob = MeshBlob {
            material_count: 2,
            submeshes: vec![Submesh {
                material: 1,
                index_offset: 0,
                index_count: 6,
                _pad: 0,
            }],
            vertices,
            indices,
        };
        let decoded = MeshBlob::from_bytes(&blob.to_bytes()).expect("decode");
        assert_eq!(decoded, blob);
    }

    #[test]
    fn test_mesh_blob_rejects_foreign_data() {
        let bytes = compress_blob(&[0u8; 64]);
        assert!(MeshBlob::from_bytes(&bytes).is_err());
    }
}
