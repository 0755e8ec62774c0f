use crate::batch::prepare::ItemPreparer;
use crate::error::{ExecutionError, PrepareError};
use crate::services::host::{classify, HostConnection};
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

/// One item handed to the worker.
#[derive(Debug, Clone)]
pub struct Job {
    pub item_id: String,
    pub item: JsonValue,
    pub definition: JsonValue,
    pub engine_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Succeeded(JsonValue),
    PrepareFailed(PrepareError),
    ExecutionFailed(ExecutionError),
}

/// Sent from the worker back to the UI thread.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Prepared { item_id: String, definition: JsonValue },
    Finished { item_id: String, outcome: ItemOutcome },
}

fn prepare(preparer: &dyn ItemPreparer, job: Job) -> Result<Job, PrepareError> {
    let definition = preparer.prepare(&job.item_id, &job.item, job.definition)?;
    Ok(Job { definition, ..job })
}

fn execute(host: &dyn HostConnection, job: &Job) -> ItemOutcome {
    info!(item = %job.item_id, engine = %job.engine_type, "running definition");
    let outcome = host
        .run_definition(&job.definition, &job.engine_type)
        .map_err(ExecutionError::from)
        .and_then(classify);
    match outcome {
        Ok(result) => ItemOutcome::Succeeded(result),
        Err(e) => {
            error!(item = %job.item_id, error = %e, "definition run failed");
            ItemOutcome::ExecutionFailed(e)
        }
    }
}

/// Prepare then run one job, reporting each step.
fn process(
    host: &dyn HostConnection,
    preparer: &dyn ItemPreparer,
    job: Job,
    mut emit: impl FnMut(WorkerEvent),
) {
    let item_id = job.item_id.clone();
    match prepare(preparer, job) {
        Ok(job) => {
            emit(WorkerEvent::Prepared {
                item_id: item_id.clone(),
                definition: job.definition.clone(),
            });
            let outcome = execute(host, &job);
            emit(WorkerEvent::Finished { item_id, outcome });
        }
        Err(e) => {
            error!(item = %item_id, error = %e, "prepare failed");
            emit(WorkerEvent::Finished {
                item_id,
                outcome: ItemOutcome::PrepareFailed(e),
            });
        }
    }
}

/// Background thread fed through two FIFO queues: jobs waiting to be
/// prepared, and prepared jobs waiting to run.
pub struct Worker {
    prepare_tx: Option<Sender<Job>>,
    events: Receiver<WorkerEvent>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(
        host: Arc<dyn HostConnection>,
        preparer: Arc<dyn ItemPreparer>,
        poll: Duration,
    ) -> Self {
        let (prepare_tx, prepare_rx) = mpsc::channel::<Job>();
        let (event_tx, events) = mpsc::channel::<WorkerEvent>();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            let (run_tx, run_rx) = mpsc::channel::<Job>();
            debug!("batch worker started");
            while !stop_flag.load(Ordering::SeqCst) {
                match prepare_rx.recv_timeout(poll) {
                    Ok(job) => {
                        let item_id = job.item_id.clone();
                        match prepare(preparer.as_ref(), job) {
                            Ok(job) => {
                                let _ = event_tx.send(WorkerEvent::Prepared {
                                    item_id,
                                    definition: job.definition.clone(),
                                });
                                let _ = run_tx.send(job);
                            }
                            Err(e) => {
                                error!(item = %item_id, error = %e, "prepare failed");
                                let _ = event_tx.send(WorkerEvent::Finished {
                                    item_id,
                                    outcome: ItemOutcome::PrepareFailed(e),
                                });
                            }
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
                while let Ok(job) = run_rx.try_recv() {
                    let outcome = execute(host.as_ref(), &job);
                    let _ = event_tx.send(WorkerEvent::Finished {
                        item_id: job.item_id,
                        outcome,
                    });
                }
            }
            debug!("batch worker stopped");
        });
        Self {
            prepare_tx: Some(prepare_tx),
            events,
            stop,
            handle: Some(handle),
        }
    }

    pub fn submit(&self, job: Job) -> bool {
        self.prepare_tx
            .as_ref()
            .map(|tx| tx.send(job).is_ok())
            .unwrap_or(false)
    }

    pub fn try_events(&self) -> Vec<WorkerEvent> {
        self.events.try_iter().collect()
    }

    /// Stop after the current job; does not interrupt a host call.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.prepare_tx = None;
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Where dispatched jobs go: the background worker, or run on the caller
/// during the next pump.
pub enum Executor {
    Inline {
        host: Arc<dyn HostConnection>,
        preparer: Arc<dyn ItemPreparer>,
        queued: VecDeque<Job>,
    },
    Thread(Worker),
}

impl Executor {
    pub fn new(
        host: Arc<dyn HostConnection>,
        preparer: Arc<dyn ItemPreparer>,
        multithreading: bool,
        poll: Duration,
    ) -> Self {
        if multithreading {
            Executor::Thread(Worker::spawn(host, preparer, poll))
        } else {
            Executor::Inline {
                host,
                preparer,
                queued: VecDeque::new(),
            }
        }
    }

    pub fn submit(&mut self, job: Job) -> bool {
        match self {
            Executor::Inline { queued, .. } => {
                queued.push_back(job);
                true
            }
            Executor::Thread(w) => w.submit(job),
        }
    }

    pub fn poll(&mut self) -> Vec<WorkerEvent> {
        match self {
            Executor::Inline {
                host,
                preparer,
                queued,
            } => {
                let mut out = Vec::new();
                if let Some(job) = queued.pop_front() {
                    process(host.as_ref(), preparer.as_ref(), job, |ev| out.push(ev));
                }
                out
            }
            Executor::Thread(w) => w.try_events(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::prepare::ContextPreparer;
    use crate::model::Status;
    use crate::services::host::Envelope;
    use crate::services::testing::ScriptedHost;
    use serde_json::json;
    use std::time::Instant;

    fn job(id: &str, item: JsonValue) -> Job {
        Job {
            item_id: id.into(),
            item,
            definition: json!({"contexts": []}),
            engine_type: "publisher".into(),
        }
    }

    fn collect(exec: &mut Executor, want: usize) -> Vec<WorkerEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut out = Vec::new();
        while out.len() < want && Instant::now() < deadline {
            out.extend(exec.poll());
            thread::sleep(Duration::from_millis(2));
        }
        out
    }

    #[test]
    fn worker_reports_prepare_then_finish_in_order() {
        let host: Arc<dyn HostConnection> = Arc::new(
            ScriptedHost::new("h").on_run(|_, _| Envelope::failure(Status::Error, "bad export")),
        );
        let preparer = Arc::new(ContextPreparer::new(Arc::clone(&host), None));
        let mut exec = Executor::new(host, preparer, true, Duration::from_millis(5));
        assert!(exec.submit(job("a", json!({"context_id": "c"}))));
        assert!(exec.submit(job("b", json!({}))));
        let events = collect(&mut exec, 3);
        assert!(matches!(&events[0], WorkerEvent::Prepared { item_id, .. } if item_id == "a"));
        assert!(matches!(
            &events[1],
            WorkerEvent::Finished { item_id, outcome: ItemOutcome::ExecutionFailed(e) }
                if item_id == "a" && e.message == "bad export"
        ));
        assert!(matches!(
            &events[2],
            WorkerEvent::Finished { item_id, outcome: ItemOutcome::PrepareFailed(_) } if item_id == "b"
        ));
    }

    #[test]
    fn inline_executor_runs_one_job_per_poll() {
        let host = Arc::new(ScriptedHost::new("h"));
        let shared: Arc<dyn HostConnection> = host.clone();
        let preparer = Arc::new(ContextPreparer::new(Arc::clone(&shared), Some("c".into())));
        let mut exec = Executor::new(shared, preparer, false, Duration::from_millis(5));
        exec.submit(job("a", json!({})));
        exec.submit(job("b", json!({})));
        assert_eq!(host.run_count(), 0);
        let first = exec.poll();
        assert_eq!(first.len(), 2);
        assert_eq!(host.run_count(), 1);
        exec.poll();
        assert_eq!(host.run_count(), 2);
        assert!(exec.poll().is_empty());
    }
}
