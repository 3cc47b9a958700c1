use crate::output::Console;
use crate::util::format_duration;
use std::time::{Duration, Instant};

/// Emits one progress line per completed address. Callers hold it behind a
/// lock so lines are produced one at a time.
pub struct ProgressTracker {
    total: usize,
    delivered: usize,
    silent: bool,
    console: Console,
}

impl ProgressTracker {
    pub fn new(total: usize, silent: bool, console: Console) -> Self {
        Self {
            total,
            delivered: 0,
            silent,
            console,
        }
    }

    pub fn delivered(&self) -> usize {
        self.delivered
    }

    pub async fn report(&mut self, current: usize, started: Instant, remaining: usize) {
        if self.silent {
            return;
        }
        self.delivered += 1;
        if let Some(line) = progress_line(
            self.total,
            self.delivered,
            current,
            started.elapsed(),
            remaining,
        ) {
            self.console.emit(line).await;
        }
    }
}

pub fn progress_line(
    total: usize,
    delivered: usize,
    current: usize,
    elapsed: Duration,
    remaining: usize,
) -> Option<String> {
    let elapsed_text = format_duration(elapsed);
    if delivered == total {
        return Some(format!(
            "Progress: {current}/{total} - Elapsed Time: {elapsed_text}"
        ));
    }
    if delivered > total {
        return None;
    }
    if current == 0 {
        return Some(format!(
            "Progress: {current}/{total} - Elapsed Time: {elapsed_text}"
        ));
    }

    let average = elapsed.as_nanos() / current as u128;
    let projected = (average * remaining as u128).min(u64::MAX as u128) as u64;
    Some(format!(
        "Progress: {current}/{total} - Elapsed Time: {elapsed_text} - Estimated Remaining Time: {}",
        format_duration(Duration::from_nanos(projected))
    ))
}
