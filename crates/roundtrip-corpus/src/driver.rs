//! Parallel corpus driver.
//!
//! Workers pull items from a shared cursor, so uneven per-item cost spreads
//! across the pool. Each worker checks the sink's stop flag before taking
//! its next item; once a failure lands nothing new is dispatched, but items
//! already taken run to completion.
//!
//! The calling thread only polls: it wakes every `poll_interval` to print
//! `Processed: N`, and returns as soon as every worker has exited.

use crate::sink::{Response, Sink, SinkState, WorkerFault};
use roundtrip_kernel::FailureRecord;
use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tracing::{debug, info};

/// Stack reserved for each worker. Parsing, generating and comparing are
/// recursive over tree depth, which the toy parser caps; this leaves
/// headroom for that cap in unoptimized builds.
pub const WORKER_STACK_SIZE: usize = 64 << 20;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("worker crashed on {item}: {message}")]
    WorkerCrashed { item: String, message: String },
}

#[derive(Debug, Clone)]
pub struct Driver {
    pub workers: usize,
    pub poll_interval: Duration,
    /// Print `Processed: N` lines to stdout.
    pub progress: bool,
}

impl Default for Driver {
    /// One worker per available processing unit, polling once a second.
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(1, usize::from),
            poll_interval: Duration::from_secs(1),
            progress: true,
        }
    }
}

impl Driver {
    pub fn new(workers: usize, poll_interval: Duration) -> Self {
        Self {
            workers: workers.max(1),
            poll_interval,
            progress: true,
        }
    }

    pub fn quiet(mut self) -> Self {
        self.progress = false;
        self
    }

    /// Apply `verify` to every item and aggregate the outcomes.
    ///
    /// `verify` returns `Ok(Some(_))` for a validation failure and `Err(_)`
    /// for an infrastructure fault. A fault or a panic inside `verify`
    /// aborts the run with [`DriverError::WorkerCrashed`].
    pub fn run<T, F>(&self, items: &[T], verify: F) -> Result<SinkState, DriverError>
    where
        T: Debug + Sync,
        F: Fn(&T) -> Result<Option<FailureRecord>, String> + Sync,
    {
        let sink = Sink::new();
        let cursor = AtomicUsize::new(0);
        let workers = self.workers.max(1).min(items.len().max(1));
        info!(items = items.len(), workers, "driver starting");

        std::thread::scope(|s| {
            let (done_tx, done_rx) = mpsc::channel::<()>();
            for worker_id in 0..workers {
                let done_tx = done_tx.clone();
                let sink = &sink;
                let cursor = &cursor;
                let verify = &verify;
                let spawned = std::thread::Builder::new()
                    .name(format!("corpus-worker-{worker_id}"))
                    .stack_size(WORKER_STACK_SIZE)
                    .spawn_scoped(s, move || {
                        run_worker(worker_id, items, cursor, sink, verify);
                        drop(done_tx);
                    });
                if let Err(error) = spawned {
                    sink.response(Response {
                        error: Some(WorkerFault {
                            item: format!("worker {worker_id}"),
                            message: format!("failed to spawn: {error}"),
                        }),
                        result: None,
                        log: String::new(),
                    });
                    break;
                }
            }
            drop(done_tx);

            loop {
                match done_rx.recv_timeout(self.poll_interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if self.progress {
                            println!("Processed: {}", sink.total());
                        }
                        if sink.stop() {
                            debug!("stop requested; waiting for in-flight items");
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                    Ok(()) => {}
                }
            }
        });

        let state = sink.into_state();
        if self.progress {
            println!("Processed: {}", state.total);
        }
        if let Some(fault) = state.fault {
            return Err(DriverError::WorkerCrashed {
                item: fault.item,
                message: fault.message,
            });
        }
        info!(total = state.total, failures = state.errors.len(), "driver finished");
        Ok(state)
    }
}

fn run_worker<T, F>(worker_id: usize, items: &[T], cursor: &AtomicUsize, sink: &Sink, verify: &F)
where
    T: Debug,
    F: Fn(&T) -> Result<Option<FailureRecord>, String>,
{
    debug!(worker_id, "worker started");
    loop {
        if sink.stop() {
            break;
        }
        let index = cursor.fetch_add(1, Ordering::SeqCst);
        let Some(item) = items.get(index) else {
            break;
        };
        let label = format!("{item:?}");
        let response = match panic::catch_unwind(AssertUnwindSafe(|| verify(item))) {
            Ok(Ok(result)) => Response {
                log: format!(
                    "{label}: {}",
                    if result.is_some() { "failed" } else { "ok" }
                ),
                result,
                error: None,
            },
            Ok(Err(message)) => Response {
                error: Some(WorkerFault {
                    item: label.clone(),
                    message,
                }),
                log: format!("{label}: fault"),
                result: None,
            },
            Err(payload) => Response {
                error: Some(WorkerFault {
                    item: label.clone(),
                    message: panic_message(payload.as_ref()),
                }),
                log: format!("{label}: panicked"),
                result: None,
            },
        };
        sink.response(response);
    }
    debug!(worker_id, "worker exiting");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
