use super::progress::ProgressTracker;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard};

/// State shared by all workers of one scan.
pub struct ScanState {
    total: usize,
    completed: AtomicUsize,
    matches: Mutex<Vec<String>>,
    started: Instant,
    aborted: AtomicBool,
    progress: Mutex<ProgressTracker>,
    sink_lock: Mutex<()>,
}

impl ScanState {
    pub fn new(total: usize, progress: ProgressTracker) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            matches: Mutex::new(Vec::new()),
            started: Instant::now(),
            aborted: AtomicBool::new(false),
            progress: Mutex::new(progress),
            sink_lock: Mutex::new(()),
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Counts one finished address and reports it, all under the progress
    /// lock so reported counts are strictly increasing.
    pub async fn record_completion(&self) -> usize {
        let mut progress = self.progress.lock().await;
        let current = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let remaining = self.total.saturating_sub(current);
        progress.report(current, self.started, remaining).await;
        current
    }

    pub async fn push_match(&self, address: String) {
        self.matches.lock().await.push(address);
    }

    pub async fn matches(&self) -> Vec<String> {
        self.matches.lock().await.clone()
    }

    /// Held for the duration of one result sink write.
    pub async fn sink_guard(&self) -> MutexGuard<'_, ()> {
        self.sink_lock.lock().await
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Console;
    use std::sync::Arc;

    #[tokio::test]
    async fn concurrent_completions_count_every_unit() {
        let state = Arc::new(ScanState::new(
            64,
            ProgressTracker::new(64, true, Console::silent()),
        ));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..8 {
                    seen.push(state.record_completion().await);
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (1..=64).collect::<Vec<_>>());
        assert_eq!(state.completed(), 64);
    }

    #[tokio::test]
    async fn abort_flag_is_sticky() {
        let state = ScanState::new(1, ProgressTracker::new(1, true, Console::silent()));
        assert!(!state.is_aborted());
        state.abort();
        assert!(state.is_aborted());
    }
}
