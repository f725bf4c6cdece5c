// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print job orchestration.
//
// A job connects its target, then formats and sends each payload with a
// settling pause between them. It runs as a tokio task (at most
// `max_concurrent_jobs` at once) and reports progress through a
// `PrintListener` whose callbacks are posted to the origin context:
//
//   connecting -> connected -> printing -> printed -> success
//
// Any failure ends the job with exactly one `on_error` carrying the outcome
// message. Progress already reported is never repeated.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thermlink_core::AppConfig;
use thermlink_core::error::{Result, ThermlinkError};
use thermlink_core::human_errors::outcome_message;
use thermlink_core::types::{JobId, JobOutcome, JobPhase, JobReport};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::connector::SharedConnector;
use crate::formatter::MarkupFormatter;
use crate::origin::OriginContext;
use crate::retry::{ConnectOptions, wait_interruptible};

/// Receives job progress on the origin context. All methods default to
/// doing nothing.
pub trait PrintListener: Send + Sync {
    fn on_connecting(&self) {}
    fn on_connected(&self) {}
    fn on_printing(&self) {}
    fn on_printed(&self) {}
    fn on_success(&self) {}
    fn on_error(&self, _message: &str) {}
}

/// Settings applied to every job an orchestrator runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOptions {
    pub connect: ConnectOptions,
    /// Pause between consecutive payloads.
    pub pacing: Duration,
    pub max_concurrent_jobs: usize,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            connect: ConnectOptions::default(),
            pacing: Duration::from_millis(500),
            max_concurrent_jobs: 2,
        }
    }
}

impl From<&AppConfig> for JobOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            connect: ConnectOptions::from(config),
            pacing: config.payload_pacing(),
            max_concurrent_jobs: config.max_concurrent_jobs,
        }
    }
}

/// Runs print jobs in the background.
pub struct PrintOrchestrator {
    runtime: Handle,
    formatter: Arc<dyn MarkupFormatter>,
    origin: Arc<dyn OriginContext>,
    options: JobOptions,
    permits: Arc<Semaphore>,
}

impl PrintOrchestrator {
    pub fn new(
        runtime: Handle,
        formatter: Arc<dyn MarkupFormatter>,
        origin: Arc<dyn OriginContext>,
        options: JobOptions,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(options.max_concurrent_jobs.max(1)));
        Self {
            runtime,
            formatter,
            origin,
            options,
            permits,
        }
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    /// Start a job and return immediately.
    ///
    /// `target` is borrowed for the job's duration; submitting a second job
    /// on the same target while one is running is the caller's concern.
    pub fn submit(
        &self,
        target: Option<SharedConnector>,
        payloads: Vec<String>,
        listener: Arc<dyn PrintListener>,
    ) -> JobHandle {
        let id = JobId::new();
        let cancel = CancellationToken::new();
        let notifier = Notifier {
            origin: Arc::clone(&self.origin),
            listener,
        };
        let job = Job {
            target,
            payloads,
            formatter: Arc::clone(&self.formatter),
            options: self.options.clone(),
            cancel: cancel.clone(),
            notifier: notifier.clone(),
        };
        let permits = Arc::clone(&self.permits);

        let task = self.runtime.spawn(
            async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                let started_at = Utc::now();

                // Run the job body as its own task so a panic still ends in
                // a terminal callback.
                let progress = match tokio::spawn(job.run().in_current_span()).await {
                    Ok(progress) => progress,
                    Err(e) => {
                        error!(error = %e, "print job task failed");
                        Progress::failed(JobOutcome::PrinterDisconnected)
                    }
                };

                notifier.finish(progress.outcome);
                info!(outcome = ?progress.outcome, sent = progress.sent, "print job finished");
                JobReport {
                    id,
                    outcome: progress.outcome,
                    payloads_sent: progress.sent,
                    failed_payload: progress.failed_payload,
                    started_at,
                    finished_at: Utc::now(),
                }
            }
            .instrument(info_span!("print_job", job = %id)),
        );

        JobHandle { id, cancel, task }
    }
}

/// Handle to a submitted job.
pub struct JobHandle {
    id: JobId,
    cancel: CancellationToken,
    task: JoinHandle<JobReport>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Interrupt the job's backoff or pacing wait. The job then fails with
    /// `PrinterDisconnected`. To abort a connect or write in flight, close
    /// the target with [`SharedConnector::close`].
    pub fn interrupt(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the job's report. Callbacks may still be queued on the
    /// origin context when this returns.
    pub async fn wait(self) -> JobReport {
        match self.task.await {
            Ok(report) => report,
            Err(e) => {
                error!(job = %self.id, error = %e, "print job lost");
                let now = Utc::now();
                JobReport {
                    id: self.id,
                    outcome: JobOutcome::PrinterDisconnected,
                    payloads_sent: 0,
                    failed_payload: None,
                    started_at: now,
                    finished_at: now,
                }
            }
        }
    }
}

/// Posts listener callbacks to the origin context.
#[derive(Clone)]
struct Notifier {
    origin: Arc<dyn OriginContext>,
    listener: Arc<dyn PrintListener>,
}

impl Notifier {
    fn phase(&self, phase: JobPhase) {
        debug!(?phase, "job phase");
        let listener = Arc::clone(&self.listener);
        self.origin.post(Box::new(move || match phase {
            JobPhase::Connecting => listener.on_connecting(),
            JobPhase::Connected => listener.on_connected(),
            JobPhase::Printing => listener.on_printing(),
            JobPhase::Printed => listener.on_printed(),
        }));
    }

    fn finish(&self, outcome: JobOutcome) {
        let listener = Arc::clone(&self.listener);
        self.origin.post(Box::new(move || {
            if outcome.is_success() {
                listener.on_success();
            } else {
                listener.on_error(outcome_message(outcome));
            }
        }));
    }
}

struct Progress {
    outcome: JobOutcome,
    sent: usize,
    failed_payload: Option<usize>,
}

impl Progress {
    fn failed(outcome: JobOutcome) -> Self {
        Self {
            outcome,
            sent: 0,
            failed_payload: None,
        }
    }
}

struct Job {
    target: Option<SharedConnector>,
    payloads: Vec<String>,
    formatter: Arc<dyn MarkupFormatter>,
    options: JobOptions,
    cancel: CancellationToken,
    notifier: Notifier,
}

impl Job {
    async fn run(self) -> Progress {
        if self.payloads.is_empty() {
            info!("nothing to print");
            return Progress::failed(JobOutcome::NoPrinter);
        }

        self.notifier.phase(JobPhase::Connecting);
        let Some(target) = self.target.as_ref() else {
            warn!("no printer attached to job");
            return Progress::failed(JobOutcome::NoPrinter);
        };

        let closed = target.link().close_signal();
        if let Err(e) = target
            .lock()
            .await
            .connect_until(&self.options.connect, &self.cancel)
            .await
        {
            warn!(error = %e, "could not connect to printer");
            return Progress::failed(JobOutcome::PrinterDisconnected);
        }
        self.notifier.phase(JobPhase::Connected);
        self.notifier.phase(JobPhase::Printing);

        let mut sent = 0;
        for (index, payload) in self.payloads.iter().enumerate() {
            let result = match index {
                0 => self.print_one(target, payload).await,
                _ => match self.pause(&closed).await {
                    Ok(()) => self.print_one(target, payload).await,
                    Err(e) => Err(e),
                },
            };
            if let Err(e) = result {
                warn!(payload = index, error = %e, "payload failed");
                return Progress {
                    outcome: JobOutcome::from_error(&e),
                    sent,
                    failed_payload: Some(index),
                };
            }
            sent += 1;
        }

        self.notifier.phase(JobPhase::Printed);
        Progress {
            outcome: JobOutcome::Success,
            sent,
            failed_payload: None,
        }
    }

    /// Settling pause before the next payload. Ends early on interrupt or
    /// when the session is closed.
    async fn pause(&self, closed: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = closed.cancelled() => Err(ThermlinkError::Interrupted),
            waited = wait_interruptible(self.options.pacing, &self.cancel) => waited,
        }
    }

    /// Format and send one payload, holding the connector only for the write.
    async fn print_one(&self, target: &SharedConnector, payload: &str) -> Result<()> {
        let mut connector = target.lock().await;
        let session = connector.session_mut();
        let bytes = self.formatter.format(payload, session.charset())?;
        debug!(bytes = bytes.len(), "sending payload");
        session.write(&bytes);
        session.send().await
    }
}
