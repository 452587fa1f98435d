use std::path::PathBuf;

use thiserror::Error;

use crate::api::ApiError;

/// Fatal errors of a batch run. Anything here aborts the process with a
/// non-zero exit code; per-file outcomes never end up in this type.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Submission gave up after {attempts} attempts: {last}")]
    SubmissionExhausted { attempts: u32, last: ApiError },

    #[error("Cancelled before the job was submitted")]
    Cancelled,

    #[error("Remote service error: {0}")]
    Api(#[from] ApiError),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Problems with the input manifest. Raised before any network call.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("manifest is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("manifest has no `{0}` field")]
    MissingField(&'static str),

    #[error("manifest field `{0}` must be an object keyed by file identifier")]
    NotAnObject(&'static str),

    #[error("manifest lists no images")]
    Empty,
}
