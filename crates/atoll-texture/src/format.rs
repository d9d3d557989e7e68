/// GPU pixel formats the packer can emit. Discriminants are stored in
/// `TextureHeader::format` and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PixelFormat {
    Bc4 = 1,
    Bc7 = 2,
    R8G8B8A8 = 3,
    R16 = 4,
    R16G16B16A16F = 5,
}

impl PixelFormat {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(PixelFormat::Bc4),
            2 => Some(PixelFormat::Bc7),
            3 => Some(PixelFormat::R8G8B8A8),
            4 => Some(PixelFormat::R16),
            5 => Some(PixelFormat::R16G16B16A16F),
            _ => None,
        }
    }

    /// Channels the float pyramid needs before encoding to this format.
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Bc4 | PixelFormat::R16 => 1,
            PixelFormat::Bc7 | PixelFormat::R8G8B8A8 | PixelFormat::R16G16B16A16F => 4,
        }
    }

    pub fn is_block_compressed(self) -> bool {
        matches!(self, PixelFormat::Bc4 | PixelFormat::Bc7)
    }

    /// Smallest edge a mip level may have in this format.
    pub fn min_dimension(self) -> u32 {
        if self.is_block_compressed() {
            4
        } else {
            1
        }
    }

    /// Encoded size of one `width` x `height` level.
    pub fn level_size(self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        match self {
            PixelFormat::Bc4 => w.div_ceil(4) * h.div_ceil(4) * 8,
            PixelFormat::Bc7 => w.div_ceil(4) * h.div_ceil(4) * 16,
            PixelFormat::R8G8B8A8 => w * h * 4,
            PixelFormat::R16 => w * h * 2,
            PixelFormat::R16G16B16A16F => w * h * 8,
        }
    }

    /// Parse a filename tag such as `bc7` or `r16_unorm`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "bc4" => Some(PixelFormat::Bc4),
            "bc7" => Some(PixelFormat::Bc7),
            "r16_unorm" | "r16" => Some(PixelFormat::R16),
            "rgba8" | "raw" => Some(PixelFormat::R8G8B8A8),
            "rgba16f" => Some(PixelFormat::R16G16B16A16F),
            _ => None,
        }
    }
}
