use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(3600);

/// Per-project ring of recent successful-selection timestamps, consulted by
/// the selector's hourly-cap check. Entries older than one hour are
/// discarded lazily on read, never proactively swept.
#[derive(Default)]
pub struct UsageLedger {
    recent: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_used(&self, project_id: &str) {
        let mut guard = self.recent.lock().unwrap();
        let entry = guard.entry(project_id.to_string()).or_default();
        entry.push_back(Instant::now());
    }

    /// Count of selections for `project_id` within the trailing 60 minutes,
    /// pruning anything older in the same pass.
    pub fn count_last_hour(&self, project_id: &str) -> usize {
        let mut guard = self.recent.lock().unwrap();
        let Some(entry) = guard.get_mut(project_id) else {
            return 0;
        };
        let cutoff = Instant::now().checked_sub(WINDOW).unwrap_or(Instant::now());
        while matches!(entry.front(), Some(t) if *t < cutoff) {
            entry.pop_front();
        }
        entry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_recent_entries() {
        let ledger = UsageLedger::new();
        for _ in 0..3 {
            ledger.mark_used("proj-a");
        }
        assert_eq!(ledger.count_last_hour("proj-a"), 3);
        assert_eq!(ledger.count_last_hour("proj-b"), 0);
    }
}
