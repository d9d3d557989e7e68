use std::path::Path;

use atoll_chunk::{Chunk, ChunkHeader, FontHeader, KindHeader};
use bytemuck::{Pod, Zeroable};

use super::ExportJob;
use crate::error::{IoContext, PackError};

const BMFONT_MAGIC: &[u8; 3] = b"BMF";
const BMFONT_VERSION: u8 = 3;

const BLOCK_INFO: u8 = 1;
const BLOCK_COMMON: u8 = 2;
const BLOCK_PAGES: u8 = 3;
const BLOCK_CHARS: u8 = 4;
const BLOCK_KERNING: u8 = 5;

const COMMON_BLOCK_SIZE: usize = 15;
const CHAR_RECORD_SIZE: usize = 20;

/// Glyph metrics, stored in the payload parallel to the glyph id array.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Glyph {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub x_offset: i16,
    pub y_offset: i16,
    pub x_advance: i16,
    pub page: u8,
    pub channel: u8,
}

/// A parsed binary BMFont.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BitmapFont {
    pub header: FontHeader,
    pub ids: Vec<u32>,
    pub glyphs: Vec<Glyph>,
}

impl BitmapFont {
    /// Payload layout: `glyph_count` u32 ids, then `glyph_count` glyphs.
    pub fn payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.ids.len() * (4 + std::mem::size_of::<Glyph>()));
        out.extend_from_slice(bytemuck::cast_slice(&self.ids));
        out.extend_from_slice(bytemuck::cast_slice(&self.glyphs));
        out
    }
}

fn u16_at(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn i16_at(b: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([b[at], b[at + 1]])
}

/// Parse the binary BMFont block stream. Only the common and char blocks
/// are consumed; info, pages and kerning are skipped.
pub fn parse_bmfont(bytes: &[u8], path: &Path) -> Result<BitmapFont, PackError> {
    let bad = |message: String| PackError::format("BMFont", path, message);

    if bytes.len() < 4 || &bytes[..3] != BMFONT_MAGIC {
        return Err(bad("missing BMF signature".to_string()));
    }
    if bytes[3] != BMFONT_VERSION {
        return Err(bad(format!("unsupported version {}", bytes[3])));
    }

    let mut font = BitmapFont::default();
    let mut has_common = false;
    let mut at = 4;
    while at < bytes.len() {
        if at + 5 > bytes.len() {
            return Err(bad(format!("truncated block header at offset {at}")));
        }
        let block_type = bytes[at];
        let size =
            u32::from_le_bytes(bytes[at + 1..at + 5].try_into().expect("4-byte slice")) as usize;
        let start = at + 5;
        let end = start
            .checked_add(size)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| bad(format!("block {block_type} at offset {at} overruns the file")))?;
        let block = &bytes[start..end];

        match block_type {
            BLOCK_COMMON => {
                if block.len() < COMMON_BLOCK_SIZE {
                    return Err(bad(format!("common block is {} bytes", block.len())));
                }
                font.header.line_height = u16_at(block, 0) as u32;
                font.header.base = u16_at(block, 2) as u32;
                font.header.scale_w = u16_at(block, 4) as u32;
                font.header.scale_h = u16_at(block, 6) as u32;
                font.header.page_count = u16_at(block, 8) as u32;
                has_common = true;
            }
            BLOCK_CHARS => {
                if block.len() % CHAR_RECORD_SIZE != 0 {
                    return Err(bad(format!(
                        "char block size {} is not a multiple of {}",
                        block.len(),
                        CHAR_RECORD_SIZE
                    )));
                }
                for rec in block.chunks_exact(CHAR_RECORD_SIZE) {
                    font.ids.push(u32::from_le_bytes(rec[0..4].try_into().expect("4-byte slice")));
                    font.glyphs.push(Glyph {
                        x: u16_at(rec, 4),
                        y: u16_at(rec, 6),
                        width: u16_at(rec, 8),
                        height: u16_at(rec, 10),
                        x_offset: i16_at(rec, 12),
                        y_offset: i16_at(rec, 14),
                        x_advance: i16_at(rec, 16),
                        page: rec[18],
                        channel: rec[19],
                    });
                }
            }
            BLOCK_INFO | BLOCK_PAGES | BLOCK_KERNING => {}
            other => return Err(bad(format!("unknown block type {other} at offset {at}"))),
        }
        at = end;
    }

    if !has_common {
        return Err(bad("no common block".to_string()));
    }
    font.header.glyph_count = font.ids.len() as u32;
    Ok(font)
}

pub fn export(job: &ExportJob) -> Result<Vec<Chunk>, PackError> {
    let bytes = std::fs::read(&job.source).at(&job.source)?;
    let font = parse_bmfont(&bytes, &job.source)?;
    log::debug!("{}: {} glyph(s)", job.scope(), font.header.glyph_count);
    let header = ChunkHeader::new(job.flags, &job.rel_path, KindHeader::Font(font.header));
    Ok(vec![Chunk::new(header, font.payload())])
}
