//! Outcome reporter: folds the final task states into a summary.

use std::collections::BTreeSet;
use std::fmt;

use chrono::Utc;
use serde::Serialize;

use crate::state_machine::{FileState, FileTask, Job};

/// Final partition of a job's files plus timing.
///
/// Every file id of the job appears in exactly one of the three sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeReport {
    pub job_id: String,
    pub processed: BTreeSet<String>,
    pub failed: BTreeSet<String>,
    pub unprocessed: BTreeSet<String>,
    pub retry_rounds: u32,
    pub elapsed_ms: i64,
}

impl OutcomeReport {
    /// Build the report. Anything not terminal counts as unprocessed.
    pub fn from_tasks(job: &Job, tasks: &[FileTask], retry_rounds: u32) -> Self {
        let mut processed = BTreeSet::new();
        let mut failed = BTreeSet::new();
        let mut unprocessed = BTreeSet::new();

        for task in tasks {
            let bucket = match task.state {
                FileState::Processed => &mut processed,
                FileState::ProcessingFailed => &mut failed,
                FileState::Pending | FileState::Processing | FileState::Unprocessed => {
                    &mut unprocessed
                }
            };
            bucket.insert(task.file_id.clone());
        }

        let elapsed = Utc::now() - job.submitted_at;
        Self {
            job_id: job.job_id.clone(),
            processed,
            failed,
            unprocessed,
            retry_rounds,
            elapsed_ms: elapsed.num_milliseconds().max(0),
        }
    }

    pub fn total(&self) -> usize {
        self.processed.len() + self.failed.len() + self.unprocessed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty()
    }
}

/// Render milliseconds as `1h 02m 03s`.
fn format_elapsed(ms: i64) -> String {
    let secs = ms / 1000;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{}.{:03}s", s, ms % 1000)
    }
}

impl fmt::Display for OutcomeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Job {}", self.job_id)?;
        writeln!(f, "  processed:   {}/{}", self.processed.len(), self.total())?;
        writeln!(f, "  failed:      {}", self.failed.len())?;
        writeln!(f, "  unprocessed: {}", self.unprocessed.len())?;
        writeln!(f, "  retry rounds: {}", self.retry_rounds)?;
        write!(f, "  elapsed:     {}", format_elapsed(self.elapsed_ms))?;
        if !self.failed.is_empty() {
            let ids: Vec<&str> = self.failed.iter().map(String::as_str).collect();
            write!(f, "\n  failed ids: {}", ids.join(", "))?;
        }
        if !self.unprocessed.is_empty() {
            let ids: Vec<&str> = self.unprocessed.iter().map(String::as_str).collect();
            write!(f, "\n  unprocessed ids: {}", ids.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, state: FileState) -> FileTask {
        let mut task = FileTask::new(id.to_string());
        task.state = state;
        task
    }

    #[test]
    fn partitions_every_file_exactly_once() {
        let job = Job::new(
            "J1".into(),
            vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
        );
        let tasks = vec![
            task("a", FileState::Processed),
            task("b", FileState::ProcessingFailed),
            task("c", FileState::Unprocessed),
            task("d", FileState::Pending),
            task("e", FileState::Processed),
        ];

        let report = OutcomeReport::from_tasks(&job, &tasks, 2);
        assert_eq!(report.processed, BTreeSet::from(["a".to_string(), "e".to_string()]));
        assert_eq!(report.failed, BTreeSet::from(["b".to_string()]));
        assert_eq!(report.unprocessed, BTreeSet::from(["c".to_string(), "d".to_string()]));
        assert_eq!(report.total(), 5);
        assert_eq!(report.retry_rounds, 2);
        assert!(!report.is_complete());
        assert!(report.elapsed_ms >= 0);
    }

    #[test]
    fn display_lists_counts_and_problem_ids() {
        let report = OutcomeReport {
            job_id: "J1".into(),
            processed: BTreeSet::from(["a".to_string()]),
            failed: BTreeSet::from(["b".to_string()]),
            unprocessed: BTreeSet::new(),
            retry_rounds: 1,
            elapsed_ms: 3_723_000,
        };
        let text = report.to_string();
        assert!(text.contains("processed:   1/2"));
        assert!(text.contains("failed:      1"));
        assert!(text.contains("elapsed:     1h 02m 03s"));
        assert!(text.contains("failed ids: b"));
        assert!(!text.contains("unprocessed ids"));
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(1_250), "1.250s");
        assert_eq!(format_elapsed(125_000), "2m 05s");
        assert_eq!(format_elapsed(7_200_000), "2h 00m 00s");
    }

    #[test]
    fn report_serializes_to_json() {
        let job = Job::new("J2".into(), vec!["x".into()]);
        let report = OutcomeReport::from_tasks(&job, &[task("x", FileState::Processed)], 0);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["job_id"], "J2");
        assert_eq!(json["processed"][0], "x");
        assert!(json["failed"].as_array().unwrap().is_empty());
    }
}
