use crate::batch::item::RunItem;
use crate::batch::prepare::ItemPreparer;
use crate::batch::progress::{ProgressAggregator, StepKey};
use crate::batch::summary::{BatchSummary, NOTHING_TO_RUN};
use crate::batch::worker::{Executor, ItemOutcome, Job, WorkerEvent};
use crate::definition::{engine_type, locate_plugin, progress_steps};
use crate::error::PrepareError;
use crate::model::{ClientConfig, Status};
use crate::services::host::HostConnection;
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePhase {
    Idle,
    Preparing,
    Running,
    Draining,
    Aborting,
    Done,
}

#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub multithreading: bool,
    pub poll_interval: Duration,
    pub engine_type: Option<String>,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            multithreading: true,
            poll_interval: Duration::from_millis(250),
            engine_type: None,
        }
    }
}

impl From<&ClientConfig> for QueueOptions {
    fn from(cfg: &ClientConfig) -> Self {
        Self {
            multithreading: cfg.multithreading,
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            engine_type: cfg.engine_type.clone(),
        }
    }
}

/// What changed during a `run`/`pump` call, for the UI to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueUpdate {
    NothingToRun,
    Started { total: usize },
    ItemStarted { item_id: String, label: String },
    ItemFinished { item_id: String, success: bool, message: String },
    Aborted { cleared: usize },
    Finished(BatchSummary),
}

struct InFlight {
    item_id: String,
    label: String,
    definition: JsonValue,
}

/// Runs the checked items of a batch one at a time. The UI thread drives it
/// with `pump`; host calls happen on the executor.
pub struct DefinitionRunQueue {
    host: Arc<dyn HostConnection>,
    preparer: Arc<dyn ItemPreparer>,
    options: QueueOptions,
    phase: QueuePhase,
    pending: VecDeque<String>,
    in_flight: Option<InFlight>,
    total: usize,
    succeeded: usize,
    failed: usize,
    aborted: bool,
    executor: Option<Executor>,
}

impl DefinitionRunQueue {
    pub fn new(
        host: Arc<dyn HostConnection>,
        preparer: Arc<dyn ItemPreparer>,
        options: QueueOptions,
    ) -> Self {
        Self {
            host,
            preparer,
            options,
            phase: QueuePhase::Idle,
            pending: VecDeque::new(),
            in_flight: None,
            total: 0,
            succeeded: 0,
            failed: 0,
            aborted: false,
            executor: None,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> QueuePhase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        !matches!(self.phase, QueuePhase::Idle | QueuePhase::Done)
    }

    pub fn in_flight(&self) -> Option<&str> {
        self.in_flight.as_ref().map(|f| f.item_id.as_str())
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (self.succeeded, self.failed, self.total)
    }

    /// Start a batch over the checked items, in list order.
    pub fn run(
        &mut self,
        items: &mut [RunItem],
        progress: &mut dyn ProgressAggregator,
    ) -> Vec<QueueUpdate> {
        let mut out = Vec::new();
        if self.is_busy() {
            warn!("batch already running");
            return out;
        }
        let checked: Vec<&RunItem> = items.iter().filter(|i| i.checked).collect();
        if checked.is_empty() {
            info!("{}", NOTHING_TO_RUN);
            self.phase = QueuePhase::Idle;
            progress.set_status(Status::Warning, NOTHING_TO_RUN);
            out.push(QueueUpdate::NothingToRun);
            return out;
        }

        self.phase = QueuePhase::Preparing;
        progress.set_status(Status::Running, "Initializing...");
        for item in &checked {
            progress.add_step(StepKey::item(item.label.clone(), item.item_id.clone()));
            for step in progress_steps(&item.current_definition()) {
                progress.add_step(StepKey::new(step.step_type, step.label, item.item_id.clone()));
            }
        }
        self.pending = checked.iter().map(|i| i.item_id.clone()).collect();
        self.total = self.pending.len();
        self.succeeded = 0;
        self.failed = 0;
        self.aborted = false;
        self.in_flight = None;
        self.executor = Some(Executor::new(
            Arc::clone(&self.host),
            Arc::clone(&self.preparer),
            self.options.multithreading,
            self.options.poll_interval,
        ));
        info!(total = self.total, threaded = self.options.multithreading, "batch started");
        out.push(QueueUpdate::Started { total: self.total });
        self.phase = QueuePhase::Running;
        self.dispatch_next(items, progress, &mut out);
        out
    }

    /// Drain worker events and status updates; dispatches the next item once
    /// the current one is done.
    pub fn pump(
        &mut self,
        items: &mut [RunItem],
        progress: &mut dyn ProgressAggregator,
    ) -> Vec<QueueUpdate> {
        let mut out = Vec::new();
        if !self.is_busy() {
            return out;
        }
        self.forward_status_updates(items, progress);
        let events = self
            .executor
            .as_mut()
            .map(|e| e.poll())
            .unwrap_or_default();
        for ev in events {
            match ev {
                WorkerEvent::Prepared { item_id, definition } => {
                    if let Some(f) = self.in_flight.as_mut().filter(|f| f.item_id == item_id) {
                        f.definition = definition;
                        progress.update_step(
                            &StepKey::item(f.label.clone(), item_id),
                            Status::Running,
                            "Running...",
                            None,
                        );
                    }
                }
                WorkerEvent::Finished { item_id, outcome } => {
                    self.complete(items, progress, &item_id, outcome, &mut out);
                }
            }
        }
        if self.in_flight.is_none() && self.pending.is_empty() && self.is_busy() {
            self.finish(progress, &mut out);
        }
        out
    }

    /// Drop everything not yet started. The in-flight item still finishes.
    pub fn abort(&mut self) -> usize {
        if !matches!(
            self.phase,
            QueuePhase::Preparing | QueuePhase::Running | QueuePhase::Draining
        ) {
            return 0;
        }
        let cleared = self.pending.len();
        self.pending.clear();
        self.aborted = true;
        self.phase = QueuePhase::Aborting;
        warn!(cleared, in_flight = ?self.in_flight(), "batch abort requested");
        cleared
    }

    /// Pump until done or `timeout` elapses.
    #[cfg(test)]
    pub fn wait(
        &mut self,
        items: &mut [RunItem],
        progress: &mut dyn ProgressAggregator,
        timeout: Duration,
    ) -> Vec<QueueUpdate> {
        let deadline = std::time::Instant::now() + timeout;
        let nap = self.options.poll_interval.min(Duration::from_millis(10));
        let mut out = Vec::new();
        while self.is_busy() && std::time::Instant::now() < deadline {
            out.extend(self.pump(items, progress));
            if self.is_busy() {
                std::thread::sleep(nap);
            }
        }
        out
    }

    fn dispatch_next(
        &mut self,
        items: &mut [RunItem],
        progress: &mut dyn ProgressAggregator,
        out: &mut Vec<QueueUpdate>,
    ) {
        while !self.aborted {
            let Some(item_id) = self.pending.pop_front() else {
                break;
            };
            let Some(item) = items.iter_mut().find(|i| i.item_id == item_id) else {
                warn!(item = %item_id, "item left the batch before it ran");
                continue;
            };
            let key = StepKey::item(item.label.clone(), item_id.clone());
            progress.update_step(&key, Status::Running, "Preparing...", None);
            let definition = match item.resolve_definition() {
                Ok(d) => d,
                Err(e) => {
                    self.record_failure(progress, &key, &e.to_string(), None, out);
                    continue;
                }
            };
            let Some(engine) = self
                .options
                .engine_type
                .clone()
                .or_else(|| engine_type(&definition))
            else {
                let e = PrepareError::MissingEngine {
                    item_id: item_id.clone(),
                };
                self.record_failure(progress, &key, &e.to_string(), None, out);
                continue;
            };

            item.factory.reset_error();
            item.factory.listen_widget_updates();
            let job = Job {
                item_id: item_id.clone(),
                item: item.item.clone(),
                definition: definition.clone(),
                engine_type: engine,
            };
            let submitted = self.executor.as_mut().map(|e| e.submit(job)).unwrap_or(false);
            if !submitted {
                item.factory.end_widget_updates();
                self.record_failure(progress, &key, "batch worker is not running", None, out);
                continue;
            }
            out.push(QueueUpdate::ItemStarted {
                item_id: item_id.clone(),
                label: item.label.clone(),
            });
            self.in_flight = Some(InFlight {
                item_id,
                label: item.label.clone(),
                definition,
            });
            if self.pending.is_empty() {
                self.phase = QueuePhase::Draining;
            }
            return;
        }
        if self.aborted {
            self.pending.clear();
        }
    }

    fn forward_status_updates(&mut self, items: &mut [RunItem], progress: &mut dyn ProgressAggregator) {
        let Some(f) = &self.in_flight else {
            return;
        };
        let Some(item) = items.iter_mut().find(|i| i.item_id == f.item_id) else {
            return;
        };
        for update in item.factory.pump_status_updates() {
            let (Some(status), Some(step)) = (update.status, locate_plugin(&f.definition, &update.widget_ref)) else {
                continue;
            };
            progress.update_step(
                &StepKey::new(step.step_type, step.label, f.item_id.clone()),
                status,
                update.message.as_deref().unwrap_or(""),
                None,
            );
        }
    }

    fn complete(
        &mut self,
        items: &mut [RunItem],
        progress: &mut dyn ProgressAggregator,
        item_id: &str,
        outcome: ItemOutcome,
        out: &mut Vec<QueueUpdate>,
    ) {
        if self.in_flight.as_ref().map(|f| f.item_id.as_str()) != Some(item_id) {
            warn!(item = item_id, "completion for an item that is not in flight");
            return;
        }
        // Notifications sent before the host returned are already queued.
        self.forward_status_updates(items, progress);
        let Some(f) = self.in_flight.take() else {
            return;
        };
        let key = StepKey::item(f.label, f.item_id.clone());
        let plugin_failed = match items.iter_mut().find(|i| i.item_id == item_id) {
            Some(item) => {
                item.factory.end_widget_updates();
                item.factory.has_error()
            }
            None => false,
        };
        match outcome {
            ItemOutcome::Succeeded(_) if !plugin_failed => {
                self.succeeded += 1;
                info!(item = item_id, "item published");
                progress.update_step(&key, Status::Success, "Published", None);
                out.push(QueueUpdate::ItemFinished {
                    item_id: item_id.to_string(),
                    success: true,
                    message: "Published".into(),
                });
            }
            ItemOutcome::Succeeded(_) => {
                self.record_failure(progress, &key, "a plugin reported an error", None, out);
            }
            ItemOutcome::PrepareFailed(e) => {
                self.record_failure(progress, &key, &e.to_string(), None, out);
            }
            ItemOutcome::ExecutionFailed(e) => {
                self.record_failure(progress, &key, &e.message, e.traceback.as_deref(), out);
            }
        }
        self.dispatch_next(items, progress, out);
    }

    fn record_failure(
        &mut self,
        progress: &mut dyn ProgressAggregator,
        key: &StepKey,
        message: &str,
        traceback: Option<&str>,
        out: &mut Vec<QueueUpdate>,
    ) {
        self.failed += 1;
        warn!(item = %key.batch_id, message, "item failed");
        progress.update_step(key, Status::Error, message, traceback);
        out.push(QueueUpdate::ItemFinished {
            item_id: key.batch_id.clone(),
            success: false,
            message: message.to_string(),
        });
    }

    fn finish(&mut self, progress: &mut dyn ProgressAggregator, out: &mut Vec<QueueUpdate>) {
        let total = if self.aborted {
            self.succeeded + self.failed
        } else {
            self.total
        };
        let summary = BatchSummary {
            total,
            succeeded: total - self.failed,
            failed: self.failed,
            aborted: self.aborted,
        };
        if self.aborted {
            out.push(QueueUpdate::Aborted {
                cleared: self.total - total,
            });
        }
        self.executor = None;
        self.phase = QueuePhase::Done;
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            aborted = summary.aborted,
            "batch finished"
        );
        progress.set_status(summary.status(), &summary.message());
        out.push(QueueUpdate::Finished(summary));
    }
}

#[cfg(test)]
mod queue_tests;
