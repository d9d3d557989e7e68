use atoll_chunk::{Chunk, ChunkHeader, KindHeader};
use atoll_core::constants::CUBEMAP_FACES;
use atoll_core::AssetFlags;
use atoll_texture::decode::load_image;
use atoll_texture::ktx::parse_ktx;
use atoll_texture::{encode_texture, EncodedTexture, PixelFormat};

use super::ExportJob;
use crate::context::PackContext;
use crate::error::{IoContext, PackError};

/// How a texture job reads its source.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureSource {
    /// One image file, optionally with a generated mip chain.
    Image { format: PixelFormat, mips: bool },
    /// Six face images, listed in the job inputs in +X, -X, +Y, -Y, +Z, -Z order.
    Cubemap { format: PixelFormat },
    /// Pre-encoded KTX container, copied as is.
    Ktx,
}

/// Wrap encoded texture bytes in a chunk.
pub(crate) fn texture_chunk(flags: AssetFlags, path: &str, encoded: EncodedTexture) -> Chunk {
    let flags = flags
        .with_kind(atoll_core::AssetKind::Texture)
        .with_if(AssetFlags::CUBEMAP, encoded.layers == CUBEMAP_FACES);
    let header = ChunkHeader::new(flags, path, KindHeader::Texture(encoded.header()));
    Chunk::new(header, encoded.data)
}

pub fn export(
    job: &ExportJob,
    source: &TextureSource,
    ctx: &PackContext,
) -> Result<Vec<Chunk>, PackError> {
    let max_levels = ctx.config.max_mip_levels;
    let encoded = match source {
        TextureSource::Image { format, mips } => {
            let image = load_image(&job.source)?;
            let levels = if *mips { max_levels } else { 1 };
            encode_texture(vec![image], *format, levels, &ctx.encoders)?
        }
        TextureSource::Cubemap { format } => {
            let faces = job
                .inputs
                .iter()
                .map(|face| load_image(face))
                .collect::<Result<Vec<_>, _>>()?;
            encode_texture(faces, *format, max_levels, &ctx.encoders)?
        }
        TextureSource::Ktx => {
            let bytes = std::fs::read(&job.source).at(&job.source)?;
            EncodedTexture::from(parse_ktx(&bytes)?)
        }
    };

    log::debug!(
        "{}: {}x{} {:?}, {} level(s), {} layer(s)",
        job.scope(),
        encoded.width,
        encoded.height,
        encoded.format,
        encoded.mip_levels,
        encoded.layers
    );
    Ok(vec![texture_chunk(job.flags, &job.rel_path, encoded)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PackerConfig;
    use crate::job::tests::{scratch, test_paths};
    use crate::job::JobKind;
    use atoll_core::ContentRoot;
    use std::path::Path;

    fn write_png(path: &Path, size: u32) {
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        let img = image::RgbaImage::from_pixel(size, size, image::Rgba([200, 100, 50, 255]));
        img.save(path).expect("save png");
    }

    fn context(dir: &Path) -> PackContext {
        PackContext::new(
            dir.join("engine"),
            dir.join("game"),
            dir.join("out"),
            PackerConfig::default(),
            false,
        )
    }

    #[test]
    fn test_bc7_texture_chunk() {
        let dir = scratch("tex_bc7");
        let source = dir.join("engine/textures/grass.bc7.png");
        write_png(&source, 256);
        let ctx = context(&dir);
        let kind = JobKind::Texture(TextureSource::Image {
            format: PixelFormat::Bc7,
            mips: true,
        });
        let job = ExportJob::new(
            kind,
            AssetFlags::EMPTY,
            source,
            "textures/grass.bc7.png".to_string(),
            ContentRoot::Engine,
            &test_paths(&dir),
        );

        let chunks = job.export(&ctx).expect("export");
        assert_eq!(chunks.len(), 1);
        let tex = chunks[0].header.texture().expect("texture header");
        assert_eq!((tex.width, tex.height, tex.mip_levels), (256, 256, 7));
        assert_eq!(tex.format, PixelFormat::Bc7 as u32);
        let expected: usize = (0..7).map(|l| (256usize >> l) * (256usize >> l)).sum();
        assert_eq!(chunks[0].payload.len(), expected);
        assert!(chunks[0].header.flags.is_texture());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_raw_texture_has_single_level() {
        let dir = scratch("tex_raw");
        let source = dir.join("engine/ui/cursor.raw.png");
        write_png(&source, 8);
        let ctx = context(&dir);
        let kind = JobKind::Texture(TextureSource::Image {
            format: PixelFormat::R8G8B8A8,
            mips: false,
        });
        let job = ExportJob::new(
            kind,
            AssetFlags::UI,
            source,
            "ui/cursor.raw.png".to_string(),
            ContentRoot::Engine,
            &test_paths(&dir),
        );
        let chunks = job.export(&ctx).expect("export");
        let tex = chunks[0].header.texture().expect("texture header");
        assert_eq!(tex.mip_levels, 1);
        assert_eq!(chunks[0].payload.len(), 8 * 8 * 4);
        assert_eq!(&chunks[0].payload[..4], &[200, 100, 50, 255]);
        assert!(chunks[0].header.flags.contains(AssetFlags::UI));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_cubemap_faces() {
        let dir = scratch("tex_cube");
        let paths = test_paths(&dir);
        let mut inputs = Vec::new();
        for s in ["_px", "_nx", "_py", "_ny", "_pz", "_nz"] {
            let face = dir.join(format!("engine/sky/day{s}.png"));
            write_png(&face, 4);
            inputs.push(face);
        }
        let ctx = context(&dir);
        let mut job = ExportJob::new(
            JobKind::Texture(TextureSource::Cubemap {
                format: PixelFormat::R8G8B8A8,
            }),
            AssetFlags::CUBEMAP,
            inputs[0].clone(),
            "sky/day.png".to_string(),
            ContentRoot::Engine,
            &paths,
        );
        job.inputs = inputs;
        let chunks = job.export(&ctx).expect("export");
        let tex = chunks[0].header.texture().expect("texture header");
        assert_eq!(tex.layers, 6);
        assert!(chunks[0].header.flags.contains(AssetFlags::CUBEMAP));
        let per_face: usize = [16usize, 4, 1].iter().map(|p| p * 4).sum();
        assert_eq!(chunks[0].payload.len(), per_face * 6);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
