use crate::model::WriteMode;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Persists matches. Every call opens, writes one line and closes the file;
/// callers serialize concurrent calls against the same destination.
#[derive(Debug, Clone)]
pub struct ResultSink {
    path: PathBuf,
    mode: WriteMode,
}

impl ResultSink {
    pub fn new(path: impl Into<PathBuf>, mode: WriteMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn record(&self, virtual_host: &str, address: &str) -> anyhow::Result<()> {
        let mut options = OpenOptions::new();
        match self.mode {
            WriteMode::Overwrite => options.write(true).create(true).truncate(true),
            WriteMode::Append => options.append(true).create(true),
        };
        let mut file = options
            .open(&self.path)
            .await
            .with_context(|| format!("cannot open output {}", self.path.display()))?;
        file.write_all(format_record(self.mode, virtual_host, address).as_bytes())
            .await
            .with_context(|| format!("cannot write output {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }
}

/// The two modes order their fields differently; existing consumers rely on both.
pub fn format_record(mode: WriteMode, virtual_host: &str, address: &str) -> String {
    match mode {
        WriteMode::Overwrite => format!("{virtual_host}:{address}\n"),
        WriteMode::Append => format!("{address}    {virtual_host}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_formats_differ_by_mode() {
        assert_eq!(
            format_record(WriteMode::Overwrite, "example.com", "10.0.0.1"),
            "example.com:10.0.0.1\n"
        );
        assert_eq!(
            format_record(WriteMode::Append, "example.com", "10.0.0.1"),
            "10.0.0.1    example.com\n"
        );
    }

    #[tokio::test]
    async fn append_mode_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("found.txt");
        let sink = ResultSink::new(&path, WriteMode::Append);
        sink.record("H", "A1").await.unwrap();
        sink.record("H", "A2").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "A1    H\nA2    H\n");
    }

    #[tokio::test]
    async fn overwrite_mode_keeps_latest_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("found.txt");
        std::fs::write(&path, "stale contents\n").unwrap();
        let sink = ResultSink::new(&path, WriteMode::Overwrite);
        sink.record("H", "A1").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "H:A1\n");
        sink.record("H", "A2").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "H:A2\n");
    }

    #[tokio::test]
    async fn unwritable_destination_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::new(dir.path().join("missing/found.txt"), WriteMode::Append);
        let err = sink.record("H", "A").await.unwrap_err();
        assert!(err.to_string().contains("cannot open output"));
    }
}
