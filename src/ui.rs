//! Terminal rendering of a batch run: a spinner plus colored output.
//!
//! Uses `indicatif` for the spinner and `console` for styling. The
//! [`ConsoleProgress`] sink follows the event stream of one job; the
//! structured log stays with [`TracingSink`](crate::events::TracingSink).

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::StatusMap;
use crate::events::{Event, EventSink};
use crate::report::OutcomeReport;

/// Spinner and colored per-file lines for one job.
pub struct ConsoleProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl ConsoleProgress {
    pub fn start(manifest_name: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(format!("Submitting {manifest_name}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(120));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }

    /// Print the final report with counts colored by outcome.
    pub fn print_report(&self, report: &OutcomeReport) {
        self.pb.finish_and_clear();
        let headline = if report.is_complete() && report.failed.is_empty() {
            self.green.apply_to("─── Job complete ───")
        } else if report.is_complete() {
            self.yellow.apply_to("─── Job complete with failures ───")
        } else {
            self.red.apply_to("─── Job incomplete ───")
        };
        println!();
        println!("{headline}");
        println!("{report}");
    }
}

impl EventSink for ConsoleProgress {
    fn emit(&self, event: &Event) {
        match event {
            Event::JobSubmitted { job_id, files, .. } | Event::JobResumed { job_id, files } => {
                self.pb
                    .set_message(format!("Job {job_id}: waiting for {files} files"));
            }
            Event::SubmitRetry { attempt, error, delay } => self.pb.println(format!(
                "  {} Submission attempt {attempt} failed: {error} (retrying in {}s)",
                self.yellow.apply_to("↻"),
                delay.as_secs()
            )),
            Event::PollTick {
                round,
                terminal,
                total,
            } => self
                .pb
                .set_message(format!("Poll {round}: {terminal}/{total} files finished")),
            Event::PollFailed { round, error } => self.pb.println(format!(
                "  {} Poll {round} failed: {error}",
                self.yellow.apply_to("↻")
            )),
            Event::UnknownState { file_id, raw } => self.pb.println(format!(
                "  {} {file_id}: unrecognized state {raw}",
                self.yellow.apply_to("?")
            )),
            Event::PollComplete { .. } => self.pb.set_message("Downloading results"),
            Event::FileProcessed {
                file_id, format, ..
            } => self.pb.println(format!(
                "  {} {file_id} ({format})",
                self.green.apply_to("✓")
            )),
            Event::FileFailed { file_id, reason } => self.pb.println(format!(
                "  {} {file_id}: {reason}",
                self.red.apply_to("✗")
            )),
            Event::FileUnprocessed { .. } => {}
            Event::SecondaryFormatFailed {
                file_id,
                format,
                reason,
            } => self.pb.println(format!(
                "  {} {file_id} ({format}): {reason}",
                self.yellow.apply_to("!")
            )),
            Event::RetryRound { round, queued } => self
                .pb
                .set_message(format!("Retry round {round}: {queued} files")),
            Event::RetriesExhausted { remaining, .. } => self.pb.println(format!(
                "  {} Giving up on {remaining} files",
                self.red.apply_to("✗")
            )),
            Event::Cancelled { phase } => self.pb.println(format!(
                "  {} Cancelled during {phase}",
                self.yellow.apply_to("■")
            )),
            Event::Summary(_) => self.pb.set_message("Done"),
        }
    }
}

/// Render a one-shot status query as aligned lines.
pub fn format_status(job_id: &str, states: &StatusMap) -> String {
    let width = states.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    let mut out = format!("Job {job_id}: {} files", states.len());
    for (file_id, state) in states {
        out.push_str(&format!("\n  {file_id:<width$}  {state}"));
    }
    out
}
