use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_INPUT: &str = "iplist.txt";
pub const DEFAULT_OUTPUT: &str = "found.txt";
pub const DEFAULT_VIRTUAL_HOST: &str = "google.com";
pub const DEFAULT_SEARCH_TEXT: &str = "www.google.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONCURRENCY: usize = 2000;
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub virtual_host: String,
    /// Empty means any response counts as a match.
    pub search_text: String,
    /// Shell command with two `%s` slots: virtual host, then address.
    pub found_exec: Option<String>,
    pub timeout: Duration,
    pub concurrency: usize,
    pub write_mode: WriteMode,
    pub silent: bool,
    pub stop_on_found: bool,
    pub max_body_bytes: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output: PathBuf::from(DEFAULT_OUTPUT),
            virtual_host: DEFAULT_VIRTUAL_HOST.into(),
            search_text: DEFAULT_SEARCH_TEXT.into(),
            found_exec: None,
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            write_mode: WriteMode::Overwrite,
            silent: false,
            stop_on_found: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum WriteMode {
    Overwrite,
    Append,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Overwrite => write!(f, "overwrite"),
            WriteMode::Append => write!(f, "append"),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ScanPhase {
    Idle,
    Loading,
    Draining,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ScanOutcome {
    Completed,
    Aborted,
}

impl From<ScanOutcome> for ScanPhase {
    fn from(outcome: ScanOutcome) -> Self {
        match outcome {
            ScanOutcome::Completed => ScanPhase::Completed,
            ScanOutcome::Aborted => ScanPhase::Aborted,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub outcome: ScanOutcome,
    pub total: usize,
    pub completed: usize,
    /// Completion order, not input order.
    pub matches: Vec<String>,
}

impl ScanReport {
    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, ScanOutcome::Aborted)
    }
}
