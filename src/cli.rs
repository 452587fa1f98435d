//! Command line interface built on clap.
//!
//! Defines [`Cli`] with subcommands [`Command`] (run, status, engines) and
//! global flags that override the configuration file.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::api::OutputFormat;
use crate::config::Config;

/// Batch client for a remote OCR service.
#[derive(Debug, Parser)]
#[command(name = "ocr-batch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to ./ocr-batch.toml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Seconds between status queries.
    #[arg(long, global = true)]
    pub poll_interval: Option<u64>,

    /// Seconds between download retry rounds.
    #[arg(long, global = true)]
    pub retry_interval: Option<u64>,

    /// Maximum number of download retry rounds.
    #[arg(long, global = true, conflicts_with = "retry_forever")]
    pub max_retry_rounds: Option<u32>,

    /// Keep retrying downloads until every file settles.
    #[arg(long, global = true, default_value_t = false)]
    pub retry_forever: bool,

    /// Format downloaded for every file.
    #[arg(long, global = true)]
    pub primary_format: Option<FormatArg>,

    /// Format downloaded best-effort after the primary one.
    #[arg(long, global = true)]
    pub secondary_format: Option<FormatArg>,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Output format accepted on the command line, mapped to [`OutputFormat`].
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    /// Plain text.
    Txt,
    /// ALTO XML.
    Alto,
    /// PAGE XML.
    Page,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Txt => OutputFormat::Txt,
            FormatArg::Alto => OutputFormat::Alto,
            FormatArg::Page => OutputFormat::Page,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit a manifest, wait for recognition, and download the results.
    Run {
        /// JSON manifest with an `images` object keyed by file identifier.
        manifest: PathBuf,

        /// Resume an already-submitted job instead of submitting again.
        #[arg(long)]
        job_id: Option<String>,

        /// Root directory for downloaded results.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Also write the final report as JSON to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Query a job's per-file states once.
    Status {
        job_id: String,

        /// Only show this file.
        #[arg(long)]
        file: Option<String>,
    },

    /// List the recognition engines offered by the service.
    Engines,
}

impl Cli {
    /// Apply flag overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(secs) = self.poll_interval {
            config.poll_interval_secs = secs;
        }
        if let Some(secs) = self.retry_interval {
            config.retry_interval_secs = secs;
        }
        if let Some(rounds) = self.max_retry_rounds {
            config.max_retry_rounds = rounds;
            config.retry_forever = false;
        }
        if self.retry_forever {
            config.retry_forever = true;
        }
        if let Some(format) = self.primary_format {
            config.primary_format = format.into();
        }
        if let Some(format) = self.secondary_format {
            config.secondary_format = Some(format.into());
        }
        if let Command::Run {
            output_dir: Some(dir),
            ..
        } = &self.command
        {
            config.output_dir = dir.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from(["ocr-batch", "run", "OCRs/ocr_data.json"]);
        match cli.command {
            Command::Run {
                manifest,
                job_id,
                output_dir,
                report,
            } => {
                assert_eq!(manifest, PathBuf::from("OCRs/ocr_data.json"));
                assert!(job_id.is_none());
                assert!(output_dir.is_none());
                assert!(report.is_none());
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "ocr-batch",
            "--poll-interval",
            "30",
            "--max-retry-rounds",
            "5",
            "--primary-format",
            "alto",
            "--secondary-format",
            "txt",
            "--verbose",
            "run",
            "m.json",
            "--job-id",
            "J7",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.poll_interval, Some(30));
        assert_eq!(cli.max_retry_rounds, Some(5));
        assert!(matches!(cli.primary_format, Some(FormatArg::Alto)));
        match &cli.command {
            Command::Run { job_id, .. } => assert_eq!(job_id.as_deref(), Some("J7")),
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn overrides_apply_to_config() {
        let cli = Cli::parse_from([
            "ocr-batch",
            "--retry-interval",
            "15",
            "--secondary-format",
            "page",
            "run",
            "m.json",
            "--output-dir",
            "/tmp/out",
        ]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.retry_interval_secs, 15);
        assert_eq!(config.secondary_format, Some(OutputFormat::Page));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.poll_interval_secs, 1200);
    }

    #[test]
    fn retry_forever_flag() {
        let cli = Cli::parse_from(["ocr-batch", "--retry-forever", "status", "J1"]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.retry_round_limit(), None);
    }

    #[test]
    fn cli_parses_status_with_file() {
        let cli = Cli::parse_from(["ocr-batch", "status", "J3", "--file", "page 1.jpg"]);
        match cli.command {
            Command::Status { job_id, file } => {
                assert_eq!(job_id, "J3");
                assert_eq!(file.as_deref(), Some("page 1.jpg"));
            }
            _ => panic!("expected Status command"),
        }
    }

    #[test]
    fn retry_flags_conflict() {
        let result = Cli::try_parse_from([
            "ocr-batch",
            "--retry-forever",
            "--max-retry-rounds",
            "3",
            "engines",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
