mod job;
mod state;

pub use job::{FileState, FileTask, Job, RetryQueue};
pub use state::{AttemptOutcome, StateMachine, Transition};
