use std::path::Path;

use atoll_chunk::{Chunk, ChunkHeader, KindHeader, MeshHeader};
use atoll_core::AssetFlags;

use super::ExportJob;
use crate::error::{IoContext, PackError};
use crate::mesh::{
    dedup_exact, encode_indices, flat_normals, recenter, smooth_normals, MeshBlob, Vertex,
    VERTEX_STRIDE,
};

/// Triangle soup before processing.
#[derive(Debug, Default)]
pub struct RawMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub has_normals: bool,
}

/// Load every model of an OBJ file into one triangulated mesh.
pub fn load_obj(path: &Path) -> Result<RawMesh, PackError> {
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    };
    let (models, _materials) = tobj::load_obj(path, &options).map_err(|source| PackError::Obj {
        path: path.to_path_buf(),
        source,
    })?;

    let mut raw = RawMesh {
        has_normals: true,
        ..RawMesh::default()
    };
    for model in &models {
        let m = &model.mesh;
        let base = raw.vertices.len() as u32;
        let count = m.positions.len() / 3;
        let has_normals = m.normals.len() == m.positions.len();
        let has_uvs = m.texcoords.len() / 2 == count;
        raw.has_normals &= has_normals;
        for i in 0..count {
            let position = [m.positions[3 * i], m.positions[3 * i + 1], m.positions[3 * i + 2]];
            let normal = if has_normals {
                [m.normals[3 * i], m.normals[3 * i + 1], m.normals[3 * i + 2]]
            } else {
                [0.0; 3]
            };
            let uv = if has_uvs {
                [m.texcoords[2 * i], m.texcoords[2 * i + 1]]
            } else {
                [0.0; 2]
            };
            raw.vertices.push(Vertex::new(position, normal, uv));
        }
        raw.indices.extend(m.indices.iter().map(|&i| base + i));
    }
    if models.is_empty() {
        raw.has_normals = false;
    }
    Ok(raw)
}

/// Load a `.mesh` blob, ignoring its material grouping.
pub fn load_mesh_blob(path: &Path) -> Result<RawMesh, PackError> {
    let bytes = std::fs::read(path).at(path)?;
    let blob = MeshBlob::from_bytes(&bytes)?;
    Ok(RawMesh {
        vertices: blob.vertices,
        indices: blob.indices,
        has_normals: true,
    })
}

/// Processed static mesh ready for the chunk payload.
#[derive(Debug)]
pub struct BuiltMesh {
    pub header: MeshHeader,
    pub payload: Vec<u8>,
}

/// Derive missing normals, merge identical vertices, recenter and pick the
/// index width.
pub fn build_mesh(raw: RawMesh, flat: bool, path: &Path) -> Result<BuiltMesh, PackError> {
    if raw.indices.len() % 3 != 0 {
        return Err(PackError::format(
            "mesh",
            path,
            format!("{} indices do not form triangles", raw.indices.len()),
        ));
    }
    if let Some(&bad) = raw.indices.iter().find(|&&i| i as usize >= raw.vertices.len()) {
        return Err(PackError::format("mesh", path, format!("index {bad} out of range")));
    }

    let (vertices, indices) = if raw.has_normals {
        (raw.vertices, raw.indices)
    } else if flat {
        flat_normals(&raw.vertices, &raw.indices)
    } else {
        let mut vertices = raw.vertices;
        smooth_normals(&mut vertices, &raw.indices);
        (vertices, raw.indices)
    };
    let (mut unique, indices) = dedup_exact(&vertices, &indices);
    let (center, extents) = recenter(&mut unique);
    let (index_size, index_bytes) = encode_indices(&indices, unique.len());

    let header = MeshHeader {
        vertex_count: unique.len() as u32,
        index_count: indices.len() as u32,
        index_size,
        vertex_stride: VERTEX_STRIDE as u32,
        center: center.to_array(),
        extents: extents.to_array(),
    };
    let mut payload = Vec::with_capacity(unique.len() * VERTEX_STRIDE + index_bytes.len());
    payload.extend_from_slice(bytemuck::cast_slice(&unique));
    payload.extend_from_slice(&index_bytes);
    Ok(BuiltMesh { header, payload })
}

pub fn export(job: &ExportJob) -> Result<Vec<Chunk>, PackError> {
    let is_blob = job.source.extension().is_some_and(|e| e.eq_ignore_ascii_case("mesh"));
    let raw = if is_blob {
        load_mesh_blob(&job.source)?
    } else {
        load_obj(&job.source)?
    };
    let flat = job.flags.contains(AssetFlags::FLAT_NORMALS);
    let mesh = build_mesh(raw, flat, &job.source)?;
    log::debug!(
        "{}: {} vertices, {} indices ({}-bit)",
        job.scope(),
        mesh.header.vertex_count,
        mesh.header.index_count,
        mesh.header.index_size * 8
    );
    let header = ChunkHeader::new(job.flags, &job.rel_path, KindHeader::Mesh(mesh.header));
    Ok(vec![Chunk::new(header, mesh.payload)])
}
