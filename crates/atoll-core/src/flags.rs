use serde::{Deserialize, Serialize};

/// Which content tree an asset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentRoot {
    Engine,
    Game,
}

impl ContentRoot {
    pub fn name(self) -> &'static str {
        match self {
            ContentRoot::Engine => "engine",
            ContentRoot::Game => "game",
        }
    }
}

/// The closed set of asset kinds the packer knows how to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Audio,
    Font,
    Gltf,
    Island,
    Model,
    Shader,
    Texture,
}

impl AssetKind {
    pub const ALL: [AssetKind; 7] = [
        AssetKind::Audio,
        AssetKind::Font,
        AssetKind::Gltf,
        AssetKind::Island,
        AssetKind::Model,
        AssetKind::Shader,
        AssetKind::Texture,
    ];

    /// The flag bit identifying this kind inside an [`AssetFlags`] set.
    pub const fn bit(self) -> u64 {
        match self {
            AssetKind::Audio => AssetFlags::AUDIO.0,
            AssetKind::Font => AssetFlags::FONT.0,
            AssetKind::Gltf => AssetFlags::GLTF.0,
            AssetKind::Island => AssetFlags::ISLAND.0,
            AssetKind::Model => AssetFlags::MODEL.0,
            AssetKind::Shader => AssetFlags::SHADER.0,
            AssetKind::Texture => AssetFlags::TEXTURE.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AssetKind::Audio => "audio",
            AssetKind::Font => "font",
            AssetKind::Gltf => "gltf",
            AssetKind::Island => "island",
            AssetKind::Model => "model",
            AssetKind::Shader => "shader",
            AssetKind::Texture => "texture",
        }
    }
}

/// Flag set stored in every chunk header.
///
/// Bit layout:
///   [0:6]   asset kind (exactly one bit set)
///   [16:21] sub-kind modifiers
///   [24]    content root (set = game tree)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AssetFlags(pub u64);

impl AssetFlags {
    pub const EMPTY: AssetFlags = AssetFlags(0);

    pub const AUDIO: AssetFlags = AssetFlags(1 << 0);
    pub const FONT: AssetFlags = AssetFlags(1 << 1);
    pub const GLTF: AssetFlags = AssetFlags(1 << 2);
    pub const ISLAND: AssetFlags = AssetFlags(1 << 3);
    pub const MODEL: AssetFlags = AssetFlags(1 << 4);
    pub const SHADER: AssetFlags = AssetFlags(1 << 5);
    pub const TEXTURE: AssetFlags = AssetFlags(1 << 6);

    pub const CUBEMAP: AssetFlags = AssetFlags(1 << 16);
    pub const UI: AssetFlags = AssetFlags(1 << 17);
    pub const FLAT_NORMALS: AssetFlags = AssetFlags(1 << 18);
    pub const VERTEX_STAGE: AssetFlags = AssetFlags(1 << 19);
    pub const FRAGMENT_STAGE: AssetFlags = AssetFlags(1 << 20);
    pub const COMPUTE_STAGE: AssetFlags = AssetFlags(1 << 21);

    pub const GAME: AssetFlags = AssetFlags(1 << 24);

    const KIND_MASK: u64 = 0x7F;

    pub fn from_kind(kind: AssetKind) -> Self {
        AssetFlags(kind.bit())
    }

    pub fn contains(self, other: AssetFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn with(self, other: AssetFlags) -> Self {
        AssetFlags(self.0 | other.0)
    }

    pub fn with_if(self, other: AssetFlags, condition: bool) -> Self {
        if condition {
            self.with(other)
        } else {
            self
        }
    }

    /// Replace the kind bit, keeping modifiers and root.
    pub fn with_kind(self, kind: AssetKind) -> Self {
        AssetFlags((self.0 & !Self::KIND_MASK) | kind.bit())
    }

    /// Decode the kind tag. Returns `None` unless exactly one kind bit is set.
    pub fn kind(self) -> Option<AssetKind> {
        let bits = self.0 & Self::KIND_MASK;
        if bits.count_ones() != 1 {
            return None;
        }
        AssetKind::ALL.into_iter().find(|k| k.bit() == bits)
    }

    pub fn root(self) -> ContentRoot {
        if self.contains(AssetFlags::GAME) {
            ContentRoot::Game
        } else {
            ContentRoot::Engine
        }
    }

    pub fn is_texture(self) -> bool {
        self.kind() == Some(AssetKind::Texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip_for_every_kind() {
        for kind in AssetKind::ALL {
            let flags = AssetFlags::from_kind(kind).with(AssetFlags::GAME);
            assert_eq!(flags.kind(), Some(kind));
            assert_eq!(flags.root(), ContentRoot::Game);
        }
    }

    #[test]
    fn test_kind_requires_single_bit() {
        assert_eq!(AssetFlags::EMPTY.kind(), None);
        let both = AssetFlags::TEXTURE.with(AssetFlags::MODEL);
        assert_eq!(both.kind(), None);
    }

    #[test]
    fn test_with_kind_keeps_modifiers() {
        let flags = AssetFlags::ISLAND
            .with(AssetFlags::GAME)
            .with_kind(AssetKind::Texture);
        assert!(flags.is_texture());
        assert!(flags.contains(AssetFlags::GAME));
        assert!(!flags.contains(AssetFlags::ISLAND));
    }
}
