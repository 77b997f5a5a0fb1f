use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

/// Shared state owned by the Reader (§3, §5). `match_count` and
/// `matched_evidences` are written only from the reader loop; workers never
/// touch them directly, they only send records down the `ResultChannel`.
#[derive(Default)]
pub struct RunState {
    match_count: Mutex<usize>,
    matched_evidences: Mutex<HashSet<PathBuf>>,
}

impl RunState {
    pub fn new() -> Self {
        RunState::default()
    }

    /// Increments the counter and records the evidence path. Insertion into
    /// `matched_evidences` is deduplicated (§3 invariant; §11 — unlike the
    /// source this is based on, which appends once per match).
    pub fn record_match(&self, identifier: PathBuf) {
        *self.match_count.lock().unwrap() += 1;
        self.matched_evidences.lock().unwrap().insert(identifier);
    }

    pub fn match_count(&self) -> usize {
        *self.match_count.lock().unwrap()
    }

    pub fn matched_evidences(&self) -> Vec<PathBuf> {
        self.matched_evidences.lock().unwrap().iter().cloned().collect()
    }

    pub fn matched_evidence_count(&self) -> usize {
        self.matched_evidences.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matched_evidences_is_deduplicated() {
        let state = RunState::new();
        state.record_match(PathBuf::from("/a.bin"));
        state.record_match(PathBuf::from("/a.bin"));
        state.record_match(PathBuf::from("/b.bin"));

        assert_eq!(state.match_count(), 3);
        assert_eq!(state.matched_evidence_count(), 2);
    }

    #[test]
    fn starts_empty() {
        let state = RunState::new();
        assert_eq!(state.match_count(), 0);
        assert!(state.matched_evidences().is_empty());
    }
}
