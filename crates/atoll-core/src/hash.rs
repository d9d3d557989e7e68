//! Content hashes: CRC-64/XZ over an asset's normalized relative path.
//!
//! The engine looks assets up by these values at runtime, so the algorithm
//! and the path normalization must never change silently.

use std::path::{Component, Path};

use crate::constants::MAX_PATH;
use crate::error::CoreError;

/// 64-bit stable identity of a packaged asset.
pub type ContentHash = u64;

const CRC64_POLY_REFLECTED: u64 = 0xC96C_5795_D787_0F42;

const CRC64_TABLE: [u64; 256] = build_table();

const fn build_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u64;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC64_POLY_REFLECTED
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC-64/XZ of raw bytes.
pub fn crc64(bytes: &[u8]) -> u64 {
    let mut crc = !0u64;
    for &b in bytes {
        crc = CRC64_TABLE[((crc ^ b as u64) & 0xFF) as usize] ^ (crc >> 8);
    }
    !crc
}

/// Hash of an already-normalized relative path.
pub fn content_hash(normalized_rel_path: &str) -> ContentHash {
    crc64(normalized_rel_path.as_bytes())
}

/// Normalize `path` relative to `root`: forward slashes, ASCII lowercase,
/// no `.` components. Fails if the path escapes the root or does not fit
/// in a chunk header.
pub fn normalize_rel_path(root: &Path, path: &Path) -> Result<String, CoreError> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| CoreError::OutsideRoot(path.display().to_string()))?;

    let mut parts: Vec<String> = Vec::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(s) => {
                let s = s
                    .to_str()
                    .ok_or_else(|| CoreError::NonUtf8Path(path.display().to_string()))?;
                parts.push(s.to_ascii_lowercase());
            }
            Component::CurDir => {}
            _ => return Err(CoreError::OutsideRoot(path.display().to_string())),
        }
    }

    let joined = parts.join("/");
    if joined.len() >= MAX_PATH {
        return Err(CoreError::PathTooLong {
            path: joined,
            max: MAX_PATH - 1,
        });
    }
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_crc64_xz_check_value() {
        assert_eq!(crc64(b"123456789"), 0x995D_C9BB_DF19_39FA);
    }

    #[test]
    fn test_content_hash_deterministic() {
        let a = content_hash("textures/grass.bc7.png");
        let b = content_hash("textures/grass.bc7.png");
        assert_eq!(a, b);
    }

    #[test]
    fn test_content_hash_distinguishes_paths() {
        let a = content_hash("textures/grass.bc7.png");
        let b = content_hash("textures/grass.bc4.png");
        let c = content_hash("textures/grass.bc7.pnh");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_normalize_rel_path() {
        let root = PathBuf::from("/content/game");
        let path = root.join("Textures").join("UI").join("Button.PNG");
        let rel = normalize_rel_path(&root, &path).expect("inside root");
        assert_eq!(rel, "textures/ui/button.png");
    }

    #[test]
    fn test_normalize_rejects_outside_root() {
        let root = PathBuf::from("/content/game");
        let path = PathBuf::from("/content/engine/a.png");
        assert!(matches!(
            normalize_rel_path(&root, &path),
            Err(CoreError::OutsideRoot(_))
        ));
    }

    #[test]
    fn test_normalize_rejects_long_paths() {
        let root = PathBuf::from("/r");
        let path = root.join("a".repeat(MAX_PATH));
        assert!(matches!(
            normalize_rel_path(&root, &path),
            Err(CoreError::PathTooLong { .. })
        ));
    }
}
