use tokio_util::sync::CancellationToken;

use crate::api::{FetchResult, OcrService, RemoteState, StatusMap};
use crate::config::Config;
use crate::error::BatchError;
use crate::events::{Event, EventSink};
use crate::manifest::Manifest;
use crate::output::OutputStore;
use crate::poller::{PollOutcome, StatusPoller};
use crate::report::OutcomeReport;
use crate::state_machine::{AttemptOutcome, FileTask, Job, RetryQueue, StateMachine, Transition};
use crate::timer::{Timer, wait_or_cancel};

/// Drives one job from submission to the final report.
///
/// Submission is retried until acknowledged, status polling runs until every
/// file is terminal, then each file is downloaded in manifest order. Files
/// that are not ready go to a retry queue that is re-attempted once per
/// retry interval until it drains, the round limit is hit, or the run is
/// cancelled.
pub struct JobOrchestrator<'a, S, T> {
    service: &'a S,
    timer: &'a T,
    sink: &'a dyn EventSink,
    config: &'a Config,
    store: OutputStore,
    cancel: CancellationToken,
}

impl<'a, S: OcrService, T: Timer> JobOrchestrator<'a, S, T> {
    pub fn new(
        service: &'a S,
        timer: &'a T,
        sink: &'a dyn EventSink,
        config: &'a Config,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            timer,
            sink,
            config,
            store: OutputStore::new(&config.output_dir),
            cancel,
        }
    }

    /// Run a job end to end. With `existing_job_id` submission is skipped and
    /// the run resumes at polling.
    ///
    /// Only submission can fail; everything after it ends in a report.
    pub async fn run(
        &self,
        manifest: &Manifest,
        existing_job_id: Option<String>,
    ) -> Result<OutcomeReport, BatchError> {
        let job = match existing_job_id {
            Some(job_id) => {
                let job = Job::new(job_id, manifest.file_ids.clone());
                self.sink.emit(&Event::JobResumed {
                    job_id: job.job_id.clone(),
                    files: job.file_ids.len(),
                });
                job
            }
            None => self.submit_with_retry(manifest).await?,
        };
        let mut tasks = job.tasks();

        let poller = StatusPoller::new(
            self.service,
            self.timer,
            self.sink,
            self.config.poll_interval(),
        );
        let rounds = match poller
            .poll_until_terminal(&job.job_id, &job.file_ids, &self.cancel)
            .await
        {
            PollOutcome::AllTerminal { states, .. } => {
                self.download_all(&job, &mut tasks, &states).await
            }
            PollOutcome::Cancelled { .. } => {
                self.sink.emit(&Event::Cancelled { phase: "polling" });
                0
            }
        };

        let report = OutcomeReport::from_tasks(&job, &tasks, rounds);
        self.sink.emit(&Event::Summary(report.clone()));
        Ok(report)
    }

    /// Submit the manifest until the service acknowledges it, resending the
    /// same payload after each failure.
    pub async fn submit_with_retry(&self, manifest: &Manifest) -> Result<Job, BatchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.service.submit(&manifest.payload).await {
                Ok(job_id) => {
                    let job = Job::new(job_id, manifest.file_ids.clone());
                    self.sink.emit(&Event::JobSubmitted {
                        job_id: job.job_id.clone(),
                        files: job.file_ids.len(),
                        attempts: attempt,
                    });
                    return Ok(job);
                }
                Err(e) if !e.is_transient() => return Err(e.into()),
                Err(e) => {
                    if self
                        .config
                        .max_submit_attempts
                        .is_some_and(|max| attempt >= max)
                    {
                        return Err(BatchError::SubmissionExhausted {
                            attempts: attempt,
                            last: e,
                        });
                    }
                    let delay = self.config.submit_retry_interval();
                    self.sink.emit(&Event::SubmitRetry {
                        attempt,
                        error: e.to_string(),
                        delay,
                    });
                    if !wait_or_cancel(self.timer, delay, &self.cancel).await {
                        self.sink.emit(&Event::Cancelled {
                            phase: "submission",
                        });
                        return Err(BatchError::Cancelled);
                    }
                }
            }
        }
    }

    /// First pass over every file, then retry rounds until the queue drains.
    /// Files the service already reported as failed are settled from
    /// `states` without a download. Returns the number of retry rounds run.
    async fn download_all(&self, job: &Job, tasks: &mut [FileTask], states: &StatusMap) -> u32 {
        let mut queue = RetryQueue::new();

        for index in 0..tasks.len() {
            if self.cancel.is_cancelled() {
                self.sink.emit(&Event::Cancelled { phase: "download" });
                return 0;
            }
            if states.get(&tasks[index].file_id) == Some(&RemoteState::Failed) {
                self.settle_failed(&mut tasks[index]);
                continue;
            }
            self.attempt(job, index, &mut tasks[index], &mut queue).await;
        }

        let limit = self.config.retry_round_limit();
        let mut round = 0;
        while !queue.is_empty() {
            if limit.is_some_and(|max| round >= max) {
                self.sink.emit(&Event::RetriesExhausted {
                    rounds: round,
                    remaining: queue.len(),
                });
                break;
            }
            if !wait_or_cancel(self.timer, self.config.retry_interval(), &self.cancel).await {
                self.sink.emit(&Event::Cancelled { phase: "retry" });
                break;
            }

            round += 1;
            self.sink.emit(&Event::RetryRound {
                round,
                queued: queue.len(),
            });
            for index in queue.take_round() {
                self.attempt(job, index, &mut tasks[index], &mut queue).await;
            }
        }
        round
    }

    /// One primary-format attempt for one task. Terminal tasks are skipped.
    async fn attempt(&self, job: &Job, index: usize, task: &mut FileTask, queue: &mut RetryQueue) {
        if !StateMachine::begin_attempt(task) {
            return;
        }

        let primary = self.config.primary_format;
        let outcome = match self
            .service
            .fetch_result(&job.job_id, &task.file_id, primary)
            .await
        {
            Ok(FetchResult::Ready(bytes)) => {
                match self.store.write(&job.job_id, &task.file_id, primary, &bytes).await {
                    Ok(_) => AttemptOutcome::Downloaded(primary),
                    Err(e) => AttemptOutcome::Retryable(format!("cannot write result: {e}")),
                }
            }
            Ok(FetchResult::NotReady) => AttemptOutcome::Retryable("result not ready".into()),
            Ok(FetchResult::PermanentFailure(reason)) => AttemptOutcome::PermanentFailure(reason),
            Err(e) => AttemptOutcome::Retryable(e.to_string()),
        };

        match StateMachine::next(task, outcome) {
            Transition::Processed => {
                self.sink.emit(&Event::FileProcessed {
                    file_id: task.file_id.clone(),
                    format: primary,
                    attempts: task.attempts,
                });
                self.fetch_secondary(job, task).await;
            }
            Transition::Failed(reason) => self.sink.emit(&Event::FileFailed {
                file_id: task.file_id.clone(),
                reason,
            }),
            Transition::Requeue(reason) => {
                queue.push(index);
                self.sink.emit(&Event::FileUnprocessed {
                    file_id: task.file_id.clone(),
                    reason,
                });
            }
            Transition::Ignored => {}
        }
    }

    fn settle_failed(&self, task: &mut FileTask) {
        let outcome = AttemptOutcome::PermanentFailure("service reported processing failed".into());
        if let Transition::Failed(reason) = StateMachine::next(task, outcome) {
            self.sink.emit(&Event::FileFailed {
                file_id: task.file_id.clone(),
                reason,
            });
        }
    }

    /// Best-effort download of the secondary format. A failure here is
    /// reported but never touches the task's state or the retry queue.
    async fn fetch_secondary(&self, job: &Job, task: &mut FileTask) {
        let Some(format) = self.config.secondary_format else {
            return;
        };

        let reason = match self
            .service
            .fetch_result(&job.job_id, &task.file_id, format)
            .await
        {
            Ok(FetchResult::Ready(bytes)) => {
                match self.store.write(&job.job_id, &task.file_id, format, &bytes).await {
                    Ok(_) => {
                        task.formats_downloaded.insert(format);
                        return;
                    }
                    Err(e) => format!("cannot write result: {e}"),
                }
            }
            Ok(FetchResult::NotReady) => "result not ready".to_string(),
            Ok(FetchResult::PermanentFailure(reason)) => reason,
            Err(e) => e.to_string(),
        };
        self.sink.emit(&Event::SecondaryFormatFailed {
            file_id: task.file_id.clone(),
            format,
            reason,
        });
    }
}
