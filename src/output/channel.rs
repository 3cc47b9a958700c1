use std::io::{BufWriter, Write};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

/// User-facing stdout lines. Lines are written in the order they are sent,
/// by a single blocking writer task. A silent console drops everything.
#[derive(Clone)]
pub struct Console {
    inner: Option<Arc<ConsoleInner>>,
}

struct ConsoleInner {
    tx: Mutex<Option<mpsc::Sender<String>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Console {
    pub fn stdout(silent: bool) -> Self {
        if silent {
            Self::silent()
        } else {
            Self::with_writer(std::io::stdout())
        }
    }

    pub fn silent() -> Self {
        Self { inner: None }
    }

    /// Must be called from within a tokio runtime.
    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        let (tx, mut rx) = mpsc::channel::<String>(1024);
        let handle = tokio::task::spawn_blocking(move || {
            let mut writer = BufWriter::new(writer);
            while let Some(line) = rx.blocking_recv() {
                if let Err(err) = writeln!(writer, "{line}").and_then(|_| writer.flush()) {
                    eprintln!("failed to write console line: {err}");
                }
            }
            let _ = writer.flush();
        });

        Self {
            inner: Some(Arc::new(ConsoleInner {
                tx: Mutex::new(Some(tx)),
                handle: Mutex::new(Some(handle)),
            })),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub async fn emit(&self, line: impl Into<String>) {
        let Some(inner) = &self.inner else {
            return;
        };
        let guard = inner.tx.lock().await;
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(line.into()).await.is_err() {
                    debug!("console writer gone; dropping line");
                }
            }
            None => debug!("console closed; dropping line"),
        }
    }

    /// Closes the channel and waits until every queued line is written.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        let Some(inner) = &self.inner else {
            return Ok(());
        };
        inner.tx.lock().await.take();

        if let Some(handle) = inner.handle.lock().await.take() {
            handle
                .await
                .map_err(|err| anyhow::anyhow!("failed to join console writer: {err}"))?;
        }

        Ok(())
    }
}
