use std::path::Path;

use tracing::warn;

use crate::channel::ResultSender;
use crate::pool::WorkerPool;
use crate::types::RunConfig;

/// Applies the admission policy from §4.2 and hands surviving evidences to
/// the pool. Dispatch itself is non-blocking from the caller's point of
/// view in the sense that it never inspects worker state beyond what
/// `WorkerPool::dispatch` already blocks on for backpressure (§5).
pub fn dispatch_all<'a>(
    evidences: impl IntoIterator<Item = &'a Path>,
    config: &RunConfig,
    pool: &WorkerPool,
) {
    for path in evidences {
        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(source) => {
                warn!(path = %path.display(), error = %source, "failed to stat evidence, skipping");
                continue;
            }
        };

        // The size cap is enforced before the job is queued, so an
        // oversized evidence never consumes a worker slot (§4.2).
        if size > config.max_size {
            warn!(
                path = %path.display(),
                size,
                max_size = config.max_size,
                "evidence exceeds the maximum size, skipping"
            );
            continue;
        }

        if !pool.dispatch(path.to_path_buf()) {
            warn!(path = %path.display(), "dispatch refused, pool is shutting down");
            break;
        }
    }
}

/// Tells the ResultChannel there are no more producers (§4.4: "the
/// Dispatcher enqueues exactly one `done_sentinel` after all per-evidence
/// jobs have been submitted and drained").
pub fn signal_done(results: &ResultSender) {
    let _ = results.send_done();
}
