use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative shutdown flag shared between the parent and every worker
/// slot (§5: "the parent listens for user interrupt... tells the pool to
/// stop accepting new jobs"). Workers themselves ignore the interrupt
/// signal (§4.3 "Signal discipline") and instead poll this flag at safe
/// points — between rulesets, and before picking up the next evidence —
/// rather than being torn down mid-scan.
///
/// This plays the same role the teacher's `run_with_timeout` thread
/// abandonment plays for a single call: there is no safe way to force-stop
/// a worker thread from the outside in Rust, so cancellation is always
/// something a worker itself observes and acts on.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_is_visible_across_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
