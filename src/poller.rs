//! Status poller: waits until the service reports every file as terminal.
//!
//! The poller only aggregates. It never retries individual files and never
//! gives up on its own; the only way out before completion is cancellation.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::api::{OcrService, RemoteState, StatusMap};
use crate::events::{Event, EventSink};
use crate::timer::{Timer, wait_or_cancel};

/// How a polling session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Every file reported Processed or Failed.
    AllTerminal { states: StatusMap, rounds: u32 },
    /// Cancelled between queries; `states` is the last successful answer.
    Cancelled { states: StatusMap, rounds: u32 },
}

pub struct StatusPoller<'a, S, T> {
    service: &'a S,
    timer: &'a T,
    sink: &'a dyn EventSink,
    interval: Duration,
}

impl<'a, S: OcrService, T: Timer> StatusPoller<'a, S, T> {
    pub fn new(service: &'a S, timer: &'a T, sink: &'a dyn EventSink, interval: Duration) -> Self {
        Self {
            service,
            timer,
            sink,
            interval,
        }
    }

    /// Query immediately, then once per interval, until every id in
    /// `file_ids` is terminal. Ids the service does not list yet and
    /// unrecognized states count as still running. Failed queries are
    /// reported and retried on the next tick.
    pub async fn poll_until_terminal(
        &self,
        job_id: &str,
        file_ids: &[String],
        cancel: &CancellationToken,
    ) -> PollOutcome {
        let mut last = StatusMap::new();
        let mut reported_unknown: BTreeSet<String> = BTreeSet::new();
        let mut round = 0;

        loop {
            if cancel.is_cancelled() {
                return PollOutcome::Cancelled {
                    states: last,
                    rounds: round,
                };
            }
            round += 1;

            match self.service.query_status(job_id).await {
                Ok(states) => {
                    for file_id in file_ids {
                        if let Some(RemoteState::Unknown(raw)) = states.get(file_id) {
                            if reported_unknown.insert(file_id.clone()) {
                                self.sink.emit(&Event::UnknownState {
                                    file_id: file_id.clone(),
                                    raw: raw.clone(),
                                });
                            }
                        }
                    }

                    let terminal = count_terminal(&states, file_ids);
                    self.sink.emit(&Event::PollTick {
                        round,
                        terminal,
                        total: file_ids.len(),
                    });
                    last = states;

                    if terminal == file_ids.len() {
                        self.sink.emit(&Event::PollComplete { rounds: round });
                        return PollOutcome::AllTerminal {
                            states: last,
                            rounds: round,
                        };
                    }
                }
                Err(e) => self.sink.emit(&Event::PollFailed {
                    round,
                    error: e.to_string(),
                }),
            }

            if !wait_or_cancel(self.timer, self.interval, cancel).await {
                return PollOutcome::Cancelled {
                    states: last,
                    rounds: round,
                };
            }
        }
    }
}

fn count_terminal(states: &StatusMap, file_ids: &[String]) -> usize {
    file_ids
        .iter()
        .filter(|id| states.get(*id).is_some_and(RemoteState::is_terminal))
        .count()
}
