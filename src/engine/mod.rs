pub mod progress;
pub mod queue;
pub mod state;

use crate::model::{ScanConfig, ScanOutcome, ScanPhase, ScanReport};
use crate::notify::{Notifier, ShellNotifier};
use crate::output::{Console, ResultSink};
use crate::probe::{HttpsProbe, ProbeRequest, Prober};
use anyhow::ensure;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use progress::ProgressTracker;
use queue::WorkQueue;
use state::ScanState;
use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

pub struct Engine {
    cfg: Arc<ScanConfig>,
    prober: Arc<dyn Prober>,
    notifier: Option<Arc<dyn Notifier>>,
    sink: ResultSink,
    console: Console,
    phase: ScanPhase,
}

impl Engine {
    pub fn new(cfg: ScanConfig, console: Console) -> anyhow::Result<Self> {
        ensure!(cfg.concurrency > 0, "concurrency must be greater than zero");

        let notifier = cfg
            .found_exec
            .as_deref()
            .filter(|template| !template.is_empty())
            .map(|template| Arc::new(ShellNotifier::new(template)) as Arc<dyn Notifier>);

        Ok(Self {
            prober: Arc::new(HttpsProbe::new(cfg.max_body_bytes)),
            sink: ResultSink::new(cfg.output.clone(), cfg.write_mode),
            notifier,
            console,
            phase: ScanPhase::Idle,
            cfg: Arc::new(cfg),
        })
    }

    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }

    pub fn with_notifier(mut self, notifier: Option<Arc<dyn Notifier>>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// Loads the configured address list and scans it. Only a failure to
    /// load the list is returned as an error.
    #[instrument(skip(self))]
    pub async fn run(&mut self) -> anyhow::Result<ScanReport> {
        self.phase = ScanPhase::Loading;
        let addresses = crate::input::read_addresses(&self.cfg.input).await?;
        self.scan(addresses).await
    }

    pub async fn scan(&mut self, addresses: Vec<String>) -> anyhow::Result<ScanReport> {
        self.phase = ScanPhase::Loading;
        let queue = Arc::new(WorkQueue::load(addresses).await?);
        let total = queue.len();
        let state = Arc::new(ScanState::new(
            total,
            ProgressTracker::new(total, self.cfg.silent, self.console.clone()),
        ));
        let worker = Arc::new(Worker {
            cfg: self.cfg.clone(),
            prober: self.prober.clone(),
            notifier: self.notifier.clone(),
            sink: self.sink.clone(),
            console: self.console.clone(),
            queue,
            state: state.clone(),
        });

        self.phase = ScanPhase::Draining;
        info!(
            total,
            concurrency = self.cfg.concurrency,
            write_mode = %self.cfg.write_mode,
            prober = self.prober.name(),
            "starting scan"
        );

        let mut tasks = FuturesUnordered::new();
        for _ in 0..self.cfg.concurrency {
            let worker = worker.clone();
            tasks.push(tokio::spawn(async move { worker.run().await }));
        }

        while let Some(joined) = tasks.next().await {
            if let Err(err) = joined {
                if !self.cfg.silent {
                    warn!(error = %err, "scan worker stopped unexpectedly");
                }
            }
            if state.is_aborted() {
                abort_all(&tasks);
                break;
            }
        }

        let outcome = if state.is_aborted() {
            ScanOutcome::Aborted
        } else {
            ScanOutcome::Completed
        };
        self.phase = outcome.into();

        let report = ScanReport {
            outcome,
            total,
            completed: state.completed(),
            matches: state.matches().await,
        };
        info!(
            outcome = ?report.outcome,
            completed = report.completed,
            matches = report.matches.len(),
            "scan finished"
        );
        Ok(report)
    }
}

fn abort_all(tasks: &FuturesUnordered<JoinHandle<()>>) {
    for task in tasks.iter() {
        task.abort();
    }
}

struct Worker {
    cfg: Arc<ScanConfig>,
    prober: Arc<dyn Prober>,
    notifier: Option<Arc<dyn Notifier>>,
    sink: ResultSink,
    console: Console,
    queue: Arc<WorkQueue>,
    state: Arc<ScanState>,
}

impl Worker {
    async fn run(&self) {
        while !self.state.is_aborted() {
            let Some(address) = self.queue.next().await else {
                break;
            };

            let req = ProbeRequest {
                address: &address,
                virtual_host: &self.cfg.virtual_host,
                search_text: &self.cfg.search_text,
                timeout: self.cfg.timeout,
            };
            let matched = match AssertUnwindSafe(self.prober.probe(&req))
                .catch_unwind()
                .await
            {
                Ok(matched) => matched,
                Err(_) => {
                    if !self.cfg.silent {
                        warn!(%address, "prober panicked, counting as no match");
                    }
                    false
                }
            };
            debug!(%address, matched, "probed");

            if matched && self.on_match(&address).await.is_break() {
                return;
            }
            self.state.record_completion().await;
        }
    }

    async fn on_match(&self, address: &str) -> ControlFlow<()> {
        let host = self.cfg.virtual_host.as_str();
        self.notice(format!("Found IP: {address}\n")).await;

        {
            let _guard = self.state.sink_guard().await;
            if let Err(err) = self.sink.record(host, address).await {
                if !self.cfg.silent {
                    let reason = format!("{err:#}");
                    let output = self.sink.path().display();
                    warn!(error = %reason, %output, "failed to record match");
                }
            }
        }

        if let Some(notifier) = &self.notifier {
            if let Err(err) = notifier.notify(host, address).await {
                if !self.cfg.silent {
                    let reason = format!("{err:#}");
                    warn!(error = %reason, %address, "found command failed");
                }
            }
        }

        self.state.push_match(address.to_string()).await;
        if self.cfg.stop_on_found {
            self.state.abort();
            return ControlFlow::Break(());
        }

        self.notice(format!("IP address {address} matches (proto HTTPS)"))
            .await;
        ControlFlow::Continue(())
    }

    async fn notice(&self, line: String) {
        if !self.cfg.silent {
            self.console.emit(line).await;
        }
    }
}
