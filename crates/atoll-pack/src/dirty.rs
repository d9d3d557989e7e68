use std::path::Path;
use std::time::SystemTime;

use atoll_chunk::{check_data_file, Compat, RebuildReason};

use crate::context::PackContext;
use crate::error::PackError;
use crate::job::{ExportJob, JobKind};

/// Decides which jobs must re-export. Built once per run.
#[derive(Debug, Clone)]
pub struct DirtyChecker {
    pub force_clean: bool,
    /// Older of the two output data files' modification times.
    outputs_mtime: Option<SystemTime>,
    /// Newest shared shader header.
    shader_headers_mtime: Option<SystemTime>,
}

/// First output file that cannot be reused, with the reason.
pub fn outputs_need_rebuild(ctx: &PackContext) -> Result<Option<RebuildReason>, PackError> {
    for path in [ctx.paths.data_file(), ctx.paths.texture_file()] {
        if let Compat::NeedsRebuild(reason) = check_data_file(&path)? {
            log::info!("{}: {}, forcing a clean rebuild", path.display(), reason);
            return Ok(Some(reason));
        }
    }
    Ok(None)
}

fn mtime_if_exists(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl DirtyChecker {
    /// `clean` forces every job dirty; so does any output file that is
    /// missing, truncated or from another format version.
    pub fn new(ctx: &PackContext, clean: bool) -> Result<Self, PackError> {
        let force_clean = clean || outputs_need_rebuild(ctx)?.is_some();
        let outputs_mtime = [ctx.paths.data_file(), ctx.paths.texture_file()]
            .iter()
            .map(|p| mtime_if_exists(p))
            .collect::<Option<Vec<_>>>()
            .and_then(|times| times.into_iter().min());
        let shader_headers_mtime = ctx
            .paths
            .shader_headers()
            .iter()
            .filter_map(|p| mtime_if_exists(p))
            .max();
        Ok(Self {
            force_clean,
            outputs_mtime,
            shader_headers_mtime,
        })
    }

    pub fn check(&self, job: &ExportJob) -> Result<bool, PackError> {
        if self.force_clean {
            return Ok(true);
        }
        let Some(intermediate) = mtime_if_exists(&job.intermediate) else {
            log::debug!("{}: no intermediate", job.scope());
            return Ok(true);
        };
        let source = job.source_mtime()?;
        if source > intermediate {
            log::debug!("{}: source newer than intermediate", job.scope());
            return Ok(true);
        }
        match self.outputs_mtime {
            Some(outputs) if source <= outputs => {}
            _ => {
                log::debug!("{}: source newer than outputs", job.scope());
                return Ok(true);
            }
        }
        if let Some(stamp) = job.pre_export_stamp().and_then(|p| mtime_if_exists(&p)) {
            if stamp > intermediate {
                log::debug!("{}: pre-export artifacts regenerated", job.scope());
                return Ok(true);
            }
        }
        if matches!(job.kind, JobKind::Shader(_)) {
            if let Some(headers) = self.shader_headers_mtime {
                if headers > intermediate {
                    log::debug!("{}: shared shader header changed", job.scope());
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

/// Mark every job, returning how many are dirty.
pub fn mark_dirty(jobs: &mut [ExportJob], checker: &DirtyChecker) -> Result<usize, PackError> {
    let mut dirty = 0;
    for job in jobs.iter_mut() {
        job.dirty = checker.check(job)?;
        dirty += usize::from(job.dirty);
    }
    Ok(dirty)
}
