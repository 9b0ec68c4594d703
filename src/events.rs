//! Run events and cooperative cancellation.
//!
//! The pipeline reports progress over an unbounded channel of `RunEvent`s;
//! the batch checkpoint event carries a one-shot reply handle that the
//! consumer resolves with a continue/stop decision. A `StopSignal` is the
//! only way to cancel a run and is observed solely at suspension points:
//! in-flight work completes and its result is discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::run_state::EnrichedRecord;

/// Decision delivered at a batch checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchDecision {
    Continue,
    Stop,
}

/// A pause point reached every fixed count of processed identifiers.
/// Resolving `decision` resumes or terminates the fetcher; dropping it
/// unresolved counts as a stop.
#[derive(Debug)]
pub struct BatchCheckpoint {
    pub completed: usize,
    pub total: usize,
    pub remaining: usize,
    pub decision: oneshot::Sender<BatchDecision>,
}

/// Everything the surrounding UI/storage layer can observe about a run.
#[derive(Debug)]
pub enum RunEvent {
    Started,
    /// A new unique identifier was appended; carries the cumulative count.
    UsernameCollected { handle: String, count: usize },
    /// One identifier finished enrichment.
    RecordEnriched {
        current: usize,
        total: usize,
        count: usize,
        latest: EnrichedRecord,
    },
    BatchCheckpoint(BatchCheckpoint),
    /// Terminal event: final record count, full result set in discovery order.
    Stopped { count: usize, records: Vec<EnrichedRecord> },
    Error { message: String },
}

pub type EventSender = mpsc::UnboundedSender<RunEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<RunEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Cooperative stop flag shared between the run owner and a controller
/// (Ctrl-C handler, UI stop button).
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
