use crate::error::TextureError;
use crate::format::PixelFormat;

/// A float32 image with interleaved channels.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    pub width: u32,
    pub height: u32,
    pub channels: usize,
    pub pixels: Vec<f32>,
}

impl FloatImage {
    pub fn new(width: u32, height: u32, channels: usize, pixels: Vec<f32>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * channels);
        Self {
            width,
            height,
            channels,
            pixels,
        }
    }

    pub fn filled(width: u32, height: u32, value: &[f32]) -> Self {
        let count = width as usize * height as usize;
        let pixels = value.iter().copied().cycle().take(count * value.len()).collect();
        Self::new(width, height, value.len(), pixels)
    }

    pub fn pixel(&self, x: u32, y: u32) -> &[f32] {
        let start = (y as usize * self.width as usize + x as usize) * self.channels;
        &self.pixels[start..start + self.channels]
    }

    /// Convert to `channels` channels. Narrowing keeps the leading channels;
    /// widening a single channel replicates it into RGB with opaque alpha.
    pub fn with_channels(self, channels: usize) -> Self {
        if channels == self.channels {
            return self;
        }
        let count = self.width as usize * self.height as usize;
        let mut pixels = Vec::with_capacity(count * channels);
        for px in self.pixels.chunks_exact(self.channels) {
            for c in 0..channels {
                let value = match (px.get(c), c) {
                    (Some(v), _) => *v,
                    (None, 3) => 1.0,
                    (None, _) if self.channels == 1 => px[0],
                    (None, _) => 0.0,
                };
                pixels.push(value);
            }
        }
        Self::new(self.width, self.height, channels, pixels)
    }

    /// 2x2 box filter. Odd edges clamp to the last row/column.
    pub fn downsample(&self) -> FloatImage {
        let w = (self.width / 2).max(1);
        let h = (self.height / 2).max(1);
        let c = self.channels;
        let mut pixels = vec![0.0f32; w as usize * h as usize * c];

        for y in 0..h {
            let y0 = (y * 2).min(self.height - 1);
            let y1 = (y * 2 + 1).min(self.height - 1);
            for x in 0..w {
                let x0 = (x * 2).min(self.width - 1);
                let x1 = (x * 2 + 1).min(self.width - 1);
                let dst = (y as usize * w as usize + x as usize) * c;
                for ch in 0..c {
                    let sum = self.pixel(x0, y0)[ch]
                        + self.pixel(x1, y0)[ch]
                        + self.pixel(x0, y1)[ch]
                        + self.pixel(x1, y1)[ch];
                    pixels[dst + ch] = sum * 0.25;
                }
            }
        }

        FloatImage::new(w, h, c, pixels)
    }
}

/// Mip chain of one texture layer, largest level first.
#[derive(Debug, Clone)]
pub struct Pyramid {
    pub levels: Vec<FloatImage>,
}

impl Pyramid {
    pub fn level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn base(&self) -> &FloatImage {
        &self.levels[0]
    }
}

/// Build the mip chain for `base`. Generation stops at `max_levels`, when the
/// next level would drop below the format's minimum edge (4 for block
/// formats, 1 otherwise), or when a block format's next level would no longer
/// be a whole number of 4x4 blocks.
pub fn make_mipmaps(
    base: FloatImage,
    format: PixelFormat,
    max_levels: u32,
) -> Result<Pyramid, TextureError> {
    if base.width == 0 || base.height == 0 {
        return Err(TextureError::Empty);
    }
    if format.is_block_compressed() && (base.width % 4 != 0 || base.height % 4 != 0) {
        return Err(TextureError::NotBlockAligned {
            format,
            width: base.width,
            height: base.height,
        });
    }

    let min = format.min_dimension();
    let mut levels = vec![base.with_channels(format.channels())];
    while (levels.len() as u32) < max_levels.max(1) {
        let last = &levels[levels.len() - 1];
        let (w, h) = (last.width / 2, last.height / 2);
        if w < min || h < min {
            break;
        }
        if format.is_block_compressed() && (w % 4 != 0 || h % 4 != 0) {
            break;
        }
        let next = last.downsample();
        levels.push(next);
    }

    Ok(Pyramid { levels })
}
