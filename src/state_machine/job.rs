use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::OutputFormat;

/// One batch submission, immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub submitted_at: DateTime<Utc>,
    pub file_ids: Vec<String>,
}

impl Job {
    pub fn new(job_id: String, file_ids: Vec<String>) -> Self {
        Self {
            job_id,
            submitted_at: Utc::now(),
            file_ids,
        }
    }

    /// One `Pending` task per file, in manifest order.
    pub fn tasks(&self) -> Vec<FileTask> {
        self.file_ids.iter().cloned().map(FileTask::new).collect()
    }
}

/// Local tracking state of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileState {
    Pending,
    Processing,
    Processed,
    ProcessingFailed,
    Unprocessed,
}

impl FileState {
    /// Processed and ProcessingFailed never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileState::Processed | FileState::ProcessingFailed)
    }
}

/// Per-image record from submission to download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTask {
    pub file_id: String,
    pub state: FileState,
    pub formats_downloaded: BTreeSet<OutputFormat>,
    /// Primary-format download attempts so far.
    pub attempts: u32,
}

impl FileTask {
    pub fn new(file_id: String) -> Self {
        Self {
            file_id,
            state: FileState::Pending,
            formats_downloaded: BTreeSet::new(),
            attempts: 0,
        }
    }

    /// Only Pending and Unprocessed tasks may be fetched.
    pub fn is_fetchable(&self) -> bool {
        matches!(self.state, FileState::Pending | FileState::Unprocessed)
    }
}

/// Ordered, duplicate-free queue of task indices awaiting another attempt.
#[derive(Debug, Default, Clone)]
pub struct RetryQueue {
    entries: VecDeque<usize>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a task index. Returns `false` if it was already queued.
    pub fn push(&mut self, index: usize) -> bool {
        if self.entries.contains(&index) {
            return false;
        }
        self.entries.push_back(index);
        true
    }

    /// Take every queued index, in insertion order, for one retry round.
    pub fn take_round(&mut self) -> Vec<usize> {
        self.entries.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
