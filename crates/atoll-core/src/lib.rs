pub mod constants;
pub mod error;
pub mod flags;
pub mod hash;
pub mod math;

pub use error::CoreError;
pub use flags::{AssetFlags, AssetKind, ContentRoot};
pub use hash::{content_hash, normalize_rel_path, ContentHash};
