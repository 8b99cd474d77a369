use anyhow::Result;

use crate::subject::SubjectId;

#[cfg(feature = "mt")]
use rayon::prelude::*;

/// Applies `work` to every subject and returns the results in subject
/// order. With `threads > 1` (and the `mt` feature) subjects run on a
/// dedicated rayon pool.
pub(crate) fn map_subjects<T, F>(subjects: &[SubjectId], threads: usize, work: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&SubjectId) -> T + Sync + Send,
{
    #[cfg(feature = "mt")]
    {
        if threads > 1 && subjects.len() > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| anyhow::anyhow!("failed to build thread pool: {}", e))?;
            return Ok(pool.install(|| subjects.par_iter().map(|s| work(s)).collect()));
        }
    }
    #[cfg(not(feature = "mt"))]
    let _ = threads;

    Ok(subjects.iter().map(work).collect())
}
