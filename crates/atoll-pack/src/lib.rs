pub mod config;
pub mod context;
pub mod dirty;
pub mod error;
pub mod job;
pub mod mesh;
pub mod report;
pub mod resolver;
pub mod scheduler;
pub mod toolchain;
pub mod writer;

pub use config::{PackerConfig, ToolCommand};
pub use context::{LogScope, PackContext};
pub use error::PackError;
pub use job::{discover_jobs, ExportJob, ExportOutput, JobKind};
pub use scheduler::{pack, PackRun};
