//! Wire types for the OCR service and their typed counterparts.
//!
//! The status payload is dynamic (per-file objects whose fields come and go)
//! and is folded into the closed [`RemoteState`] enum at this boundary.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Output representations the service can produce for a recognized page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text.
    Txt,
    /// ALTO XML layout.
    Alto,
    /// PAGE XML layout.
    Page,
}

impl OutputFormat {
    /// Path segment used by the download endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Alto => "alto",
            OutputFormat::Page => "page",
        }
    }

    /// File extension for downloaded results.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Alto => "alto.xml",
            OutputFormat::Page => "page.xml",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" => Ok(OutputFormat::Txt),
            "alto" => Ok(OutputFormat::Alto),
            "page" => Ok(OutputFormat::Page),
            other => Err(format!("unknown output format `{other}` (expected txt, alto or page)")),
        }
    }
}

/// Per-file processing state as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RemoteState {
    Waiting,
    Processing,
    Processed,
    Failed,
    /// A state string this client does not recognize. Never treated as terminal.
    Unknown(String),
}

impl RemoteState {
    /// Map a raw state string into the closed enum. Matching is case-insensitive.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "WAITING" | "CREATED" | "PENDING" => RemoteState::Waiting,
            "PROCESSING" => RemoteState::Processing,
            "PROCESSED" => RemoteState::Processed,
            "FAILED" | "INVALID_FILE" | "NOT_FOUND" => RemoteState::Failed,
            _ => RemoteState::Unknown(raw.to_string()),
        }
    }

    /// Processed and Failed are final; nothing else is.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteState::Processed | RemoteState::Failed)
    }
}

impl fmt::Display for RemoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteState::Waiting => write!(f, "WAITING"),
            RemoteState::Processing => write!(f, "PROCESSING"),
            RemoteState::Processed => write!(f, "PROCESSED"),
            RemoteState::Failed => write!(f, "FAILED"),
            RemoteState::Unknown(raw) => write!(f, "UNKNOWN({raw})"),
        }
    }
}

/// Per-file states of one job, keyed by file identifier.
pub type StatusMap = BTreeMap<String, RemoteState>;

/// Outcome of downloading one file in one format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// The result body.
    Ready(Vec<u8>),
    /// The service has no result for this format yet.
    NotReady,
    /// Processing of the file failed on the service side; retrying is pointless.
    PermanentFailure(String),
}

/// Acknowledgement body of `post_processing_request`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SubmitResponse {
    /// The request id, if and only if the service explicitly reported success.
    pub fn accepted_id(&self) -> Option<&str> {
        match (self.status.as_deref(), self.request_id.as_deref()) {
            (Some(status), Some(id)) if status.eq_ignore_ascii_case("success") && !id.is_empty() => {
                Some(id)
            }
            _ => None,
        }
    }
}

/// Body of `request_status/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub request_status: Option<Map<String, Value>>,
    #[serde(default)]
    pub message: Option<String>,
}

impl StatusResponse {
    /// The reported `status` when the service answered with something other
    /// than success. A body without `status` is not a rejection.
    pub fn rejection(&self) -> Option<&str> {
        self.status
            .as_deref()
            .filter(|status| !status.eq_ignore_ascii_case("success"))
    }

    /// Extract a typed state per file. Entries without a string `state`
    /// field become [`RemoteState::Unknown`].
    pub fn file_states(&self) -> Option<StatusMap> {
        let entries = self.request_status.as_ref()?;
        let states = entries
            .iter()
            .map(|(file_id, entry)| {
                let state = match entry.get("state").and_then(Value::as_str) {
                    Some(raw) => RemoteState::parse(raw),
                    None => RemoteState::Unknown(entry.to_string()),
                };
                (file_id.clone(), state)
            })
            .collect();
        Some(states)
    }
}
