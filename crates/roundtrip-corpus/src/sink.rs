//! Result aggregator shared by the driver's workers.

use roundtrip_kernel::FailureRecord;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Infrastructure fault raised while verifying one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerFault {
    pub item: String,
    pub message: String,
}

/// Outcome of one work item.
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// Worker crash; always fatal.
    pub error: Option<WorkerFault>,
    /// Validation failure; reported, not fatal to other items.
    pub result: Option<FailureRecord>,
    pub log: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SinkState {
    pub total: usize,
    pub errors: Vec<FailureRecord>,
    pub fault: Option<WorkerFault>,
}

impl SinkState {
    pub fn stop(&self) -> bool {
        !self.errors.is_empty() || self.fault.is_some()
    }
}

/// Serialized accumulator with a lock-free view of `stop` and `total`.
#[derive(Debug, Default)]
pub struct Sink {
    state: Mutex<SinkState>,
    stop: AtomicBool,
    total: AtomicUsize,
}

impl Sink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one response. Safe to call from any number of threads.
    pub fn response(&self, response: Response) {
        let mut state = self.lock();
        if !response.log.is_empty() {
            debug!(total = state.total, "{}", response.log);
        }
        if let Some(fault) = response.error {
            warn!(item = %fault.item, message = %fault.message, "worker fault");
            if state.fault.is_none() {
                state.fault = Some(fault);
            }
        } else {
            state.total += 1;
            if let Some(failure) = response.result {
                state.errors.push(failure);
            }
        }
        self.total.store(state.total, Ordering::SeqCst);
        if state.stop() {
            self.stop.store(true, Ordering::SeqCst);
        }
    }

    /// True once any failure or fault has been recorded.
    pub fn stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> SinkState {
        self.lock().clone()
    }

    pub fn into_state(self) -> SinkState {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(id: &str) -> FailureRecord {
        FailureRecord {
            identification: id.to_string(),
            digest: None,
            report: format!("{id} failed"),
        }
    }

    #[test]
    fn counts_every_response_and_keeps_failures_in_order() {
        let sink = Sink::new();
        sink.response(Response::default());
        assert!(!sink.stop());
        sink.response(Response {
            result: Some(failure("a")),
            ..Response::default()
        });
        sink.response(Response {
            result: Some(failure("b")),
            ..Response::default()
        });
        assert!(sink.stop());
        assert_eq!(sink.total(), 3);
        let state = sink.into_state();
        assert_eq!(state.total, 3);
        let ids: Vec<_> = state.errors.iter().map(|f| f.identification.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn fault_stops_without_counting() {
        let sink = Sink::new();
        sink.response(Response {
            error: Some(WorkerFault {
                item: "x".to_string(),
                message: "boom".to_string(),
            }),
            ..Response::default()
        });
        assert!(sink.stop());
        let state = sink.snapshot();
        assert_eq!(state.total, 0);
        assert_eq!(state.fault.map(|f| f.message), Some("boom".to_string()));
    }

    #[test]
    fn concurrent_responses_are_all_counted() {
        let sink = Sink::new();
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..250 {
                        sink.response(Response::default());
                    }
                });
            }
        });
        assert_eq!(sink.total(), 2000);
        assert_eq!(sink.snapshot().total, 2000);
    }
}
