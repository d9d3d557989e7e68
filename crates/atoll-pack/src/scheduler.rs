use std::time::Instant;

use rayon::prelude::*;

use crate::context::PackContext;
use crate::dirty::{mark_dirty, DirtyChecker};
use crate::error::PackError;
use crate::job::{discover_jobs, ExportJob};
use crate::writer::{write_outputs, WriteSummary};

/// Outcome of a packer run.
#[derive(Debug)]
pub struct PackRun {
    pub jobs: Vec<ExportJob>,
    pub force_clean: bool,
    pub dirty: usize,
    /// `None` when nothing was dirty and the outputs were left alone.
    pub written: Option<WriteSummary>,
}

/// Run `task` on every job in parallel and wait for all of them. Failures
/// are logged with the job's scope; the first one in enumeration order is
/// returned wrapped in the phase failure.
pub fn run_phase<F>(phase: &'static str, jobs: &mut [ExportJob], task: F) -> Result<(), PackError>
where
    F: Fn(&mut ExportJob) -> Result<(), PackError> + Sync,
{
    let results: Vec<Result<(), PackError>> = jobs
        .par_iter_mut()
        .map(|job| {
            let start = Instant::now();
            let result = task(job);
            job.elapsed += start.elapsed();
            result
        })
        .collect();

    let mut failed = 0;
    let mut first = None;
    for (job, result) in jobs.iter().zip(results) {
        if let Err(e) = result {
            log::error!("{}: {} failed: {}", job.scope(), phase, e);
            failed += 1;
            first.get_or_insert(e);
        }
    }

    match first {
        None => Ok(()),
        Some(first) => Err(PackError::PhaseFailed {
            phase,
            failed,
            first: Box::new(first),
        }),
    }
}

/// Discover, pre-export, dirty-check, export and write.
pub fn pack(ctx: &PackContext) -> Result<PackRun, PackError> {
    let start = Instant::now();
    let mut jobs = discover_jobs(&ctx.paths)?;

    let checker = DirtyChecker::new(ctx, ctx.clean)?;
    let force_clean = checker.force_clean;
    run_phase("pre-export", &mut jobs, |job| job.pre_export(ctx, force_clean))?;

    let dirty = mark_dirty(&mut jobs, &checker)?;
    log::info!("{} of {} job(s) dirty", dirty, jobs.len());

    if dirty == 0 && !force_clean {
        log::info!("Everything up to date");
        return Ok(PackRun {
            jobs,
            force_clean,
            dirty,
            written: None,
        });
    }

    run_phase("export", &mut jobs, |job| job.run_export(ctx))?;
    let written = write_outputs(ctx, &jobs)?;
    log::info!("Packed {} job(s) in {:.2?}", jobs.len(), start.elapsed());

    Ok(PackRun {
        jobs,
        force_clean,
        dirty,
        written: Some(written),
    })
}
