//! Worker pool for analysing several input files at once.

use anyhow::{Context, Result};
use rayon::ThreadPoolBuilder;
use tracing::warn;

/// Run `f` on a dedicated pool of `threads` workers, or on rayon's global
/// pool when no count was requested.
pub fn run_in_pool<T, F>(threads: Option<usize>, f: F) -> Result<T>
where
    F: FnOnce() -> T + Send,
    T: Send,
{
    match threads {
        Some(threads) => {
            let pool = ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("gwasqc-{i}"))
                .build()
                .context("build QC thread pool")?;
            Ok(pool.install(f))
        }
        None => Ok(f()),
    }
}

/// Outcomes in input order; the first failed file fails the run.
pub fn collect_results<T>(results: Vec<Result<T>>) -> Result<Vec<T>> {
    results.into_iter().collect()
}

/// Requested thread count capped at the number of files (at least one).
pub fn resolve_threads(requested: Option<usize>, files: usize) -> Option<usize> {
    let requested = requested?;
    let capped = requested.clamp(1, files.max(1));
    if capped != requested {
        warn!(requested, files, "using {capped} QC thread(s)");
    }
    Some(capped)
}
