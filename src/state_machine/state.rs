use std::fmt;

use crate::api::OutputFormat;

use super::job::{FileState, FileTask};

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileState::Pending => write!(f, "PENDING"),
            FileState::Processing => write!(f, "PROCESSING"),
            FileState::Processed => write!(f, "PROCESSED"),
            FileState::ProcessingFailed => write!(f, "PROCESSING_FAILED"),
            FileState::Unprocessed => write!(f, "UNPROCESSED"),
        }
    }
}

/// Resolution of one primary-format download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The result was downloaded and stored.
    Downloaded(OutputFormat),
    /// The service reported the file's processing failed.
    PermanentFailure(String),
    /// Not available yet, or the attempt failed for a transient reason.
    Retryable(String),
}

/// What the orchestrator has to do with a task after an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Task reached Processed; drop it from the retry queue.
    Processed,
    /// Task reached ProcessingFailed; drop it from the retry queue.
    Failed(String),
    /// Task is Unprocessed and belongs in the retry queue.
    Requeue(String),
    /// Task was already terminal; nothing changed.
    Ignored,
}

/// Applies download outcomes to file tasks.
pub struct StateMachine;

impl StateMachine {
    /// Claim `task` for a download attempt: marks it Processing and counts
    /// the attempt. Returns `false` (and changes nothing) unless the task is
    /// Pending or Unprocessed, so a task is never fetched twice at once or
    /// after reaching a terminal state.
    pub fn begin_attempt(task: &mut FileTask) -> bool {
        if !task.is_fetchable() {
            return false;
        }
        task.state = FileState::Processing;
        task.attempts += 1;
        true
    }

    /// Compute and apply the transition for `task` given `outcome`.
    ///
    /// Terminal tasks are left untouched and yield [`Transition::Ignored`].
    pub fn next(task: &mut FileTask, outcome: AttemptOutcome) -> Transition {
        if task.state.is_terminal() {
            return Transition::Ignored;
        }

        match outcome {
            AttemptOutcome::Downloaded(format) => {
                task.formats_downloaded.insert(format);
                task.state = FileState::Processed;
                Transition::Processed
            }
            AttemptOutcome::PermanentFailure(reason) => {
                task.state = FileState::ProcessingFailed;
                Transition::Failed(reason)
            }
            AttemptOutcome::Retryable(reason) => {
                task.state = FileState::Unprocessed;
                Transition::Requeue(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> FileTask {
        FileTask::new("a.jpg".to_string())
    }

    #[test]
    fn download_marks_processed() {
        let mut task = task();
        let t = StateMachine::next(&mut task, AttemptOutcome::Downloaded(OutputFormat::Txt));
        assert_eq!(t, Transition::Processed);
        assert_eq!(task.state, FileState::Processed);
        assert!(task.formats_downloaded.contains(&OutputFormat::Txt));
    }

    #[test]
    fn permanent_failure_marks_failed() {
        let mut task = task();
        let t = StateMachine::next(
            &mut task,
            AttemptOutcome::PermanentFailure("invalid image".into()),
        );
        assert_eq!(t, Transition::Failed("invalid image".into()));
        assert_eq!(task.state, FileState::ProcessingFailed);
    }

    #[test]
    fn retryable_requeues_and_can_still_succeed() {
        let mut task = task();
        let t = StateMachine::next(&mut task, AttemptOutcome::Retryable("not ready".into()));
        assert_eq!(t, Transition::Requeue("not ready".into()));
        assert_eq!(task.state, FileState::Unprocessed);

        let t = StateMachine::next(&mut task, AttemptOutcome::Downloaded(OutputFormat::Txt));
        assert_eq!(t, Transition::Processed);
        assert_eq!(task.state, FileState::Processed);
    }

    #[test]
    fn terminal_states_are_sticky() {
        let mut task = task();
        StateMachine::next(&mut task, AttemptOutcome::Downloaded(OutputFormat::Txt));
        let t = StateMachine::next(&mut task, AttemptOutcome::Retryable("late".into()));
        assert_eq!(t, Transition::Ignored);
        assert_eq!(task.state, FileState::Processed);

        let mut failed = FileTask::new("b".into());
        StateMachine::next(&mut failed, AttemptOutcome::PermanentFailure("x".into()));
        let t = StateMachine::next(&mut failed, AttemptOutcome::Downloaded(OutputFormat::Txt));
        assert_eq!(t, Transition::Ignored);
        assert_eq!(failed.state, FileState::ProcessingFailed);
        assert!(failed.formats_downloaded.is_empty());
    }

    #[test]
    fn begin_attempt_claims_fetchable_tasks_only() {
        let mut task = task();
        assert!(StateMachine::begin_attempt(&mut task));
        assert_eq!(task.state, FileState::Processing);
        assert_eq!(task.attempts, 1);

        // Already in flight.
        assert!(!StateMachine::begin_attempt(&mut task));
        assert_eq!(task.attempts, 1);

        StateMachine::next(&mut task, AttemptOutcome::Downloaded(OutputFormat::Txt));
        assert!(!StateMachine::begin_attempt(&mut task));
        assert_eq!(task.attempts, 1);
    }

    #[test]
    fn state_display() {
        assert_eq!(FileState::Pending.to_string(), "PENDING");
        assert_eq!(FileState::ProcessingFailed.to_string(), "PROCESSING_FAILED");
        assert_eq!(FileState::Unprocessed.to_string(), "UNPROCESSED");
    }
}
