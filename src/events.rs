//! Structured events emitted by the orchestrator.
//!
//! The orchestrator never formats or prints anything itself. It hands each
//! state transition to an [`EventSink`]; [`TracingSink`] turns them into
//! `tracing` records and the terminal UI renders them on a spinner.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::api::OutputFormat;
use crate::report::OutcomeReport;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    JobSubmitted {
        job_id: String,
        files: usize,
        attempts: u32,
    },
    /// An existing job id was supplied; submission was skipped.
    JobResumed {
        job_id: String,
        files: usize,
    },
    SubmitRetry {
        attempt: u32,
        error: String,
        delay: Duration,
    },
    PollTick {
        round: u32,
        terminal: usize,
        total: usize,
    },
    PollFailed {
        round: u32,
        error: String,
    },
    UnknownState {
        file_id: String,
        raw: String,
    },
    PollComplete {
        rounds: u32,
    },
    FileProcessed {
        file_id: String,
        format: OutputFormat,
        attempts: u32,
    },
    FileFailed {
        file_id: String,
        reason: String,
    },
    FileUnprocessed {
        file_id: String,
        reason: String,
    },
    SecondaryFormatFailed {
        file_id: String,
        format: OutputFormat,
        reason: String,
    },
    RetryRound {
        round: u32,
        queued: usize,
    },
    RetriesExhausted {
        rounds: u32,
        remaining: usize,
    },
    Cancelled {
        phase: &'static str,
    },
    Summary(OutcomeReport),
}

/// Receiver of orchestrator events.
pub trait EventSink {
    fn emit(&self, event: &Event);
}

impl<T: EventSink + ?Sized> EventSink for &T {
    fn emit(&self, event: &Event) {
        (**self).emit(event);
    }
}

/// Fan an event out to two sinks.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&self, event: &Event) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

/// Forwards events to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &Event) {
        match event {
            Event::JobSubmitted {
                job_id,
                files,
                attempts,
            } => info!(job_id = %job_id, files, attempts, "Job submitted"),
            Event::JobResumed { job_id, files } => {
                info!(job_id = %job_id, files, "Resuming existing job")
            }
            Event::SubmitRetry {
                attempt,
                error,
                delay,
            } => warn!(
                attempt,
                error = %error,
                delay_secs = delay.as_secs(),
                "Submission failed, retrying"
            ),
            Event::PollTick {
                round,
                terminal,
                total,
            } => info!(round, terminal, total, "Status poll"),
            Event::PollFailed { round, error } => {
                warn!(round, error = %error, "Status poll failed, will retry")
            }
            Event::UnknownState { file_id, raw } => {
                warn!(file_id = %file_id, state = %raw, "Unrecognized file state")
            }
            Event::PollComplete { rounds } => info!(rounds, "All files reached a terminal state"),
            Event::FileProcessed {
                file_id,
                format,
                attempts,
            } => info!(file_id = %file_id, format = %format, attempts, "File processed"),
            Event::FileFailed { file_id, reason } => {
                warn!(file_id = %file_id, reason = %reason, "File processing failed")
            }
            Event::FileUnprocessed { file_id, reason } => {
                debug!(file_id = %file_id, reason = %reason, "File not ready, queued for retry")
            }
            Event::SecondaryFormatFailed {
                file_id,
                format,
                reason,
            } => warn!(
                file_id = %file_id,
                format = %format,
                reason = %reason,
                "Secondary format download failed"
            ),
            Event::RetryRound { round, queued } => info!(round, queued, "Starting retry round"),
            Event::RetriesExhausted { rounds, remaining } => {
                warn!(rounds, remaining, "Retry rounds exhausted")
            }
            Event::Cancelled { phase } => warn!(phase, "Cancelled"),
            Event::Summary(report) => info!(
                job_id = %report.job_id,
                processed = report.processed.len(),
                failed = report.failed.len(),
                unprocessed = report.unprocessed.len(),
                retry_rounds = report.retry_rounds,
                elapsed_ms = report.elapsed_ms,
                "Job finished"
            ),
        }
    }
}

/// Records every event; used by tests to assert on the event stream.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemorySink {
    events: std::sync::Mutex<Vec<Event>>,
}

#[cfg(test)]
impl MemorySink {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl EventSink for MemorySink {
    fn emit(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }
}
