use std::path::{Path, PathBuf};

use atoll_chunk::{Chunk, ChunkHeader, GltfHeader, KindHeader};
use atoll_core::constants::{GLTF_MAX_MATERIALS, GLTF_MAX_TEXTURES, NO_TEXTURE};
use atoll_core::content_hash;
use atoll_texture::decode::{from_f32_le, from_u16_le, from_u8};
use atoll_texture::{encode_texture, FloatImage, PixelFormat};
use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};

use super::texture::texture_chunk;
use super::{read_chunk_file, write_chunk_file, ExportJob};
use crate::context::PackContext;
use crate::error::{IoContext, PackError};
use crate::mesh::{LinearDedup, MeshBlob, Submesh, Vertex};

const MESH_FILE: &str = "scene.mesh";

/// Per-material shader parameters, one record per material in the payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialParams {
    pub base_color: [f32; 4],
    pub emissive: [f32; 3],
    pub metallic: f32,
    pub roughness: f32,
    pub alpha_cutoff: f32,
    pub index_offset: u32,
    pub index_count: u32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            base_color: [1.0; 4],
            emissive: [0.0; 3],
            metallic: 1.0,
            roughness: 1.0,
            alpha_cutoff: 0.0,
            index_offset: 0,
            index_count: 0,
        }
    }
}

fn gltf_error(path: &Path) -> impl FnOnce(gltf::Error) -> PackError + '_ {
    move |source| PackError::Gltf {
        path: path.to_path_buf(),
        source,
    }
}

fn image_path(job: &ExportJob, image: usize) -> String {
    format!("{}/image_{}", job.rel_path, image)
}

fn image_chunk_file(job: &ExportJob, image: usize) -> PathBuf {
    job.side_dir().join(format!("image_{image}.chunk"))
}

/// Per-material accumulation while walking the node graph.
#[derive(Default)]
struct Bucket {
    dedup: LinearDedup,
    indices: Vec<u32>,
}

fn visit(
    node: gltf::Node<'_>,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    default_material: usize,
    buckets: &mut [Bucket],
) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    let normal_matrix = Mat3::from_mat4(world).inverse().transpose();

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!("Skipping non-triangle primitive in mesh {}", mesh.index());
                continue;
            }
            let reader = primitive.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<Vec3> = positions
                .map(|p| world.transform_point3(Vec3::from(p)))
                .collect();
            let normals: Option<Vec<Vec3>> = reader.read_normals().map(|n| {
                n.map(|n| (normal_matrix * Vec3::from(n)).normalize_or_zero())
                    .collect()
            });
            let uvs: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|t| t.into_f32().collect())
                .unwrap_or_default();
            let indices: Vec<u32> = reader
                .read_indices()
                .map(|i| i.into_u32().collect())
                .unwrap_or_else(|| (0..positions.len() as u32).collect());

            let slot = primitive.material().index().unwrap_or(default_material);
            let bucket = &mut buckets[slot];
            for tri in indices.chunks_exact(3) {
                let corners = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
                if corners.iter().any(|&i| i >= positions.len()) {
                    continue;
                }
                let face = (positions[corners[1]] - positions[corners[0]])
                    .cross(positions[corners[2]] - positions[corners[0]])
                    .normalize_or_zero();
                for i in corners {
                    let normal = normals.as_ref().map_or(face, |n| n[i]);
                    let uv = uvs.get(i).copied().unwrap_or([0.0; 2]);
                    let v = Vertex::new(positions[i].to_array(), normal.to_array(), uv);
                    let id = bucket.dedup.push(v);
                    bucket.indices.push(id);
                }
            }
        }
    }

    for child in node.children() {
        visit(child, world, buffers, default_material, buckets);
    }
}

/// Flatten the scene graph into one mesh blob grouped by material. The
/// implicit default material, if used, takes the slot after the last
/// declared material.
pub fn flatten_scene(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    path: &Path,
) -> Result<MeshBlob, PackError> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| PackError::format("glTF", path, "no scene"))?;

    let default_material = document.materials().len();
    let mut buckets: Vec<Bucket> = (0..=default_material).map(|_| Bucket::default()).collect();
    for node in scene.nodes() {
        visit(node, Mat4::IDENTITY, buffers, default_material, &mut buckets);
    }

    let uses_default = !buckets[default_material].indices.is_empty();
    let material_count = default_material + usize::from(uses_default);
    if material_count > GLTF_MAX_MATERIALS {
        return Err(PackError::format(
            "glTF",
            path,
            format!("{material_count} materials exceed the maximum of {GLTF_MAX_MATERIALS}"),
        ));
    }

    let mut blob = MeshBlob {
        material_count: material_count as u32,
        ..MeshBlob::default()
    };
    for (material, bucket) in buckets.into_iter().enumerate() {
        if bucket.indices.is_empty() {
            continue;
        }
        let base = blob.vertices.len() as u32;
        blob.submeshes.push(Submesh {
            material: material as u32,
            index_offset: blob.indices.len() as u32,
            index_count: bucket.indices.len() as u32,
            _pad: 0,
        });
        blob.vertices.extend(bucket.dedup.vertices);
        blob.indices.extend(bucket.indices.iter().map(|&i| base + i));
    }
    Ok(blob)
}

fn image_to_float(data: &gltf::image::Data) -> FloatImage {
    use gltf::image::Format;
    let (w, h, px) = (data.width, data.height, data.pixels.as_slice());
    let image = match data.format {
        Format::R8 => from_u8(w, h, 1, px),
        Format::R8G8 => from_u8(w, h, 2, px),
        Format::R8G8B8 => from_u8(w, h, 3, px),
        Format::R8G8B8A8 => from_u8(w, h, 4, px),
        Format::R16 => from_u16_le(w, h, 1, px),
        Format::R16G16 => from_u16_le(w, h, 2, px),
        Format::R16G16B16 => from_u16_le(w, h, 3, px),
        Format::R16G16B16A16 => from_u16_le(w, h, 4, px),
        Format::R32G32B32FLOAT => from_f32_le(w, h, 3, px),
        Format::R32G32B32A32FLOAT => from_f32_le(w, h, 4, px),
    };
    image.with_channels(4)
}

/// Import the scene once, then persist the flattened mesh and one texture
/// chunk per image. Skipped while the stamp is newer than the source, unless
/// `force` is set.
pub fn pre_export(job: &mut ExportJob, ctx: &PackContext, force: bool) -> Result<(), PackError> {
    if job.pre_export_current(force)? {
        log::debug!("{}: glTF artifacts up to date", job.scope());
        return Ok(());
    }

    let (document, buffers, images) = gltf::import(&job.source).map_err(gltf_error(&job.source))?;
    if images.len() > GLTF_MAX_TEXTURES {
        return Err(PackError::format(
            "glTF",
            &job.source,
            format!("{} images exceed the maximum of {}", images.len(), GLTF_MAX_TEXTURES),
        ));
    }

    let side = job.reset_side_dir()?;
    let blob = flatten_scene(&document, &buffers, &job.source)?;
    let mesh_path = side.join(MESH_FILE);
    std::fs::write(&mesh_path, blob.to_bytes()).at(&mesh_path)?;

    for (i, data) in images.iter().enumerate() {
        let format = if data.width % 4 == 0 && data.height % 4 == 0 {
            PixelFormat::Bc7
        } else {
            log::warn!(
                "{}: image {} is {}x{}, not block aligned; storing uncompressed",
                job.scope(),
                i,
                data.width,
                data.height
            );
            PixelFormat::R8G8B8A8
        };
        let encoded = encode_texture(
            vec![image_to_float(data)],
            format,
            ctx.config.max_mip_levels,
            &ctx.encoders,
        )?;
        let chunk = texture_chunk(job.flags, &image_path(job, i), encoded);
        write_chunk_file(&image_chunk_file(job, i), &[chunk])?;
    }

    job.write_pre_export_stamp()?;
    log::info!(
        "{}: flattened {} vertices, {} indices, {} image(s)",
        job.scope(),
        blob.vertices.len(),
        blob.indices.len(),
        images.len()
    );
    Ok(())
}

/// Texture slot indices of one material: base color, normal,
/// metallic-roughness, emissive.
fn material_textures(material: &gltf::Material<'_>) -> [i32; 4] {
    let pbr = material.pbr_metallic_roughness();
    let index = |t: Option<gltf::texture::Texture<'_>>| {
        t.map_or(NO_TEXTURE, |t| t.source().index() as i32)
    };
    [
        index(pbr.base_color_texture().map(|i| i.texture())),
        index(material.normal_texture().map(|n| n.texture())),
        index(pbr.metallic_roughness_texture().map(|i| i.texture())),
        index(material.emissive_texture().map(|i| i.texture())),
    ]
}

fn material_params(material: &gltf::Material<'_>) -> MaterialParams {
    let pbr = material.pbr_metallic_roughness();
    MaterialParams {
        base_color: pbr.base_color_factor(),
        emissive: material.emissive_factor(),
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        alpha_cutoff: material.alpha_cutoff().unwrap_or(0.0),
        ..MaterialParams::default()
    }
}

/// Rebuild the material block and texture hashes from the document and
/// pair them with the pre-exported mesh and textures.
pub fn export(job: &ExportJob, _ctx: &PackContext) -> Result<Vec<Chunk>, PackError> {
    let gltf = gltf::Gltf::open(&job.source).map_err(gltf_error(&job.source))?;
    let document = &gltf.document;

    let mesh_path = job.side_dir().join(MESH_FILE);
    let blob = MeshBlob::from_bytes(&std::fs::read(&mesh_path).at(&mesh_path)?)?;

    let image_count = document.images().len();
    let mut header = GltfHeader {
        material_count: blob.material_count,
        texture_count: image_count as u32,
        vertex_count: blob.vertices.len() as u32,
        index_count: blob.indices.len() as u32,
        ..GltfHeader::default()
    };

    let mut params = vec![MaterialParams::default(); blob.material_count as usize];
    for material in document.materials() {
        let Some(i) = material.index().filter(|&i| i < params.len()) else {
            continue;
        };
        params[i] = material_params(&material);
        header.material_textures[i] = material_textures(&material);
    }
    for sub in &blob.submeshes {
        let p = params.get_mut(sub.material as usize).ok_or_else(|| {
            let message = format!("material {} out of range", sub.material);
            PackError::format("glTF mesh", &mesh_path, message)
        })?;
        p.index_offset = sub.index_offset;
        p.index_count = sub.index_count;
    }

    let mut textures = Vec::with_capacity(image_count);
    for i in 0..image_count.min(GLTF_MAX_TEXTURES) {
        header.texture_hashes[i] = content_hash(&image_path(job, i));
        textures.extend(read_chunk_file(&image_chunk_file(job, i))?);
    }

    let mut payload = Vec::new();
    payload.extend_from_slice(bytemuck::cast_slice(&params));
    payload.extend_from_slice(bytemuck::cast_slice(&blob.vertices));
    payload.extend_from_slice(bytemuck::cast_slice(&blob.indices));

    let mut chunks = vec![Chunk::new(
        ChunkHeader::new(job.flags, &job.rel_path, KindHeader::Gltf(header)),
        payload,
    )];
    chunks.extend(textures);
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PackerConfig;
    use crate::job::tests::{scratch, test_paths, touch};
    use crate::job::JobKind;
    use atoll_core::{AssetFlags, ContentRoot};

    /// One triangle drawn twice: with a red material and without material,
    /// under a parent node translated by +10 on X.
    const SCENE: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [ { "nodes": [0] } ],
  "nodes": [
    { "translation": [10.0, 0.0, 0.0], "children": [1] },
    { "mesh": 0 }
  ],
  "meshes": [ { "primitives": [
    { "attributes": { "POSITION": 0 }, "material": 0 },
    { "attributes": { "POSITION": 0 } }
  ] } ],
  "materials": [ {
    "pbrMetallicRoughness": { "baseColorFactor": [1.0, 0.0, 0.0, 1.0], "roughnessFactor": 0.5 }
  } ],
  "accessors": [ {
    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
  } ],
  "bufferViews": [ { "buffer": 0, "byteLength": 36 } ],
  "buffers": [ {
    "byteLength": 36,
    "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"
  } ]
}"#;

    /// The same triangle with a 24x24 base color image and a 6x6 emissive
    /// image, both embedded as PNG data URIs.
    const TEXTURED_SCENE: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [ { "nodes": [0] } ],
  "nodes": [ { "mesh": 0 } ],
  "meshes": [ { "primitives": [ { "attributes": { "POSITION": 0 }, "material": 0 } ] } ],
  "materials": [ {
    "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } },
    "emissiveTexture": { "index": 1 }
  } ],
  "textures": [ { "source": 0 }, { "source": 1 } ],
  "images": [
    { "uri": "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAABgAAAAYCAYAAADgdz34AAAAJUlEQVR42mM4kWL0n5aYYdSCUQtGLRi1YNSCUQtGLRi1YGhYAABhalGMrvpUwQAAAABJRU5ErkJggg==" },
    { "uri": "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAYAAAAGCAYAAADgzO9IAAAAEUlEQVR42mNgYPj/HzseQAkAvPJHuYZFtpsAAAAASUVORK5CYII=" }
  ],
  "accessors": [ {
    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
  } ],
  "bufferViews": [ { "buffer": 0, "byteLength": 36 } ],
  "buffers": [ {
    "byteLength": 36,
    "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"
  } ]
}"#;

    fn gltf_job(dir: &Path) -> (ExportJob, PackContext) {
        scene_job(dir, SCENE)
    }

    fn scene_job(dir: &Path, scene: &str) -> (ExportJob, PackContext) {
        let source = dir.join("engine/scenes/tri.gltf");
        touch(&source, scene.as_bytes());
        let job = ExportJob::new(
            JobKind::Gltf,
            AssetFlags::EMPTY,
            source,
            "scenes/tri.gltf".to_string(),
            ContentRoot::Engine,
            &test_paths(dir),
        );
        let ctx = PackContext::new(
            dir.join("engine"),
            dir.join("game"),
            dir.join("out"),
            PackerConfig::default(),
            false,
        );
        (job, ctx)
    }

    #[test]
    fn test_material_params_layout() {
        assert_eq!(std::mem::size_of::<MaterialParams>(), 48);
    }

    #[test]
    fn test_flatten_applies_parent_transform() {
        let dir = scratch("gltf_flatten");
        let (job, _ctx) = gltf_job(&dir);
        let (document, buffers, _) = gltf::import(&job.source).expect("import");
        let blob = flatten_scene(&document, &buffers, &job.source).expect("flatten");

        assert_eq!(blob.material_count, 2);
        assert_eq!(blob.submeshes.len(), 2);
        assert_eq!(blob.submeshes[1].material, 1);
        assert_eq!(blob.submeshes[1].index_offset, 3);
        assert_eq!(blob.vertices.len(), 6);
        assert_eq!(blob.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(blob.vertices[1].position, [11.0, 0.0, 0.0]);
        assert_eq!(blob.vertices[0].normal, [0.0, 0.0, 1.0]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_gltf_export_uses_side_files() {
        let dir = scratch("gltf_export");
        let (mut job, ctx) = gltf_job(&dir);
        job.pre_export(&ctx, false).expect("pre-export");
        assert!(job.side_dir().join(MESH_FILE).is_file());

        let chunks = job.export(&ctx).expect("export");
        assert_eq!(chunks.len(), 1);
        let header = match chunks[0].header.kind {
            KindHeader::Gltf(h) => h,
            other => panic!("unexpected header {other:?}"),
        };
        assert_eq!(header.material_count, 2);
        assert_eq!(header.texture_count, 0);
        assert_eq!(header.vertex_count, 6);
        assert_eq!(header.material_textures[0], [NO_TEXTURE; 4]);

        let params: Vec<MaterialParams> =
            bytemuck::pod_collect_to_vec(&chunks[0].payload[..2 * 48]);
        assert_eq!(params[0].base_color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(params[0].roughness, 0.5);
        assert_eq!(params[1].base_color, [1.0; 4]);
        assert_eq!((params[1].index_offset, params[1].index_count), (3, 3));
        assert_eq!(chunks[0].payload.len(), 2 * 48 + 6 * 32 + 6 * 4);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_gltf_images_become_texture_chunks() {
        let dir = scratch("gltf_images");
        let (mut job, ctx) = scene_job(&dir, TEXTURED_SCENE);
        job.pre_export(&ctx, false).expect("pre-export");
        assert!(image_chunk_file(&job, 0).is_file());
        assert!(image_chunk_file(&job, 1).is_file());

        let chunks = job.export(&ctx).expect("export");
        assert_eq!(chunks.len(), 3);
        let header = match chunks[0].header.kind {
            KindHeader::Gltf(h) => h,
            other => panic!("unexpected header {other:?}"),
        };
        assert_eq!(header.texture_count, 2);
        assert_eq!(header.material_textures[0], [0, NO_TEXTURE, NO_TEXTURE, 1]);
        assert_eq!(header.texture_hashes[0], content_hash("scenes/tri.gltf/image_0"));
        assert_eq!(header.texture_hashes[1], content_hash("scenes/tri.gltf/image_1"));
        assert_eq!(header.texture_hashes[2], 0);

        let base = &chunks[1];
        assert!(base.header.flags.is_texture());
        assert_eq!(base.header.content_hash, header.texture_hashes[0]);
        let tex = base.header.texture().expect("texture header");
        assert_eq!((tex.width, tex.height, tex.format), (24, 24, PixelFormat::Bc7 as u32));
        assert_eq!(tex.mip_levels, 2);
        assert_eq!(base.payload.len(), 6 * 6 * 16 + 3 * 3 * 16);

        let emissive = chunks[2].header.texture().expect("texture header");
        assert_eq!(emissive.format, PixelFormat::R8G8B8A8 as u32);
        assert_eq!(emissive.mip_levels, 3);
        assert_eq!(chunks[2].payload.len(), (36 + 9 + 1) * 4);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
