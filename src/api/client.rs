use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

use super::error::ApiError;
use super::types::{FetchResult, OutputFormat, RemoteState, StatusMap, StatusResponse, SubmitResponse};

const API_KEY_HEADER: &str = "api-key";

/// Operations the orchestrator needs from the OCR service.
///
/// [`OcrClient`] is the HTTP implementation; tests script their own.
#[allow(async_fn_in_trait)]
pub trait OcrService {
    /// Send the job payload. Succeeds only on an explicit success acknowledgement.
    async fn submit(&self, payload: &Value) -> Result<String, ApiError>;

    /// Current per-file states of a job.
    async fn query_status(&self, job_id: &str) -> Result<StatusMap, ApiError>;

    /// State of a single file, `None` when the service does not list it.
    async fn query_file_status(
        &self,
        job_id: &str,
        file_id: &str,
    ) -> Result<Option<RemoteState>, ApiError> {
        let mut states = self.query_status(job_id).await?;
        Ok(states.remove(file_id))
    }

    /// Download one file's result in one format.
    async fn fetch_result(
        &self,
        job_id: &str,
        file_id: &str,
        format: OutputFormat,
    ) -> Result<FetchResult, ApiError>;
}

/// HTTP client for the OCR service. One pooled connection set is reused for
/// every call of a job.
pub struct OcrClient {
    api_key: String,
    client: Client,
    base_url: Url,
}

impl OcrClient {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            api_key,
            client,
            base_url,
        })
    }

    /// Build an endpoint URL, percent-encoding each segment (file ids may
    /// contain spaces or `#`).
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// List the recognition engines the service offers. Not part of a batch
    /// run; used by the `engines` subcommand.
    pub async fn list_engines(&self) -> Result<Value, ApiError> {
        let url = self.endpoint(&["get_engines"])?;
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: body,
            });
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl OcrService for OcrClient {
    async fn submit(&self, payload: &Value) -> Result<String, ApiError> {
        let url = self.endpoint(&["post_processing_request"])?;
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(ApiError::Submission {
                status_code: status.as_u16(),
                message: body,
            });
        }

        let ack: SubmitResponse = serde_json::from_str(&body).map_err(|e| ApiError::Submission {
            status_code: status.as_u16(),
            message: format!("unreadable acknowledgement: {e}"),
        })?;
        match ack.accepted_id() {
            Some(id) => Ok(id.to_string()),
            None => Err(ApiError::Submission {
                status_code: status.as_u16(),
                message: ack.message.unwrap_or(body),
            }),
        }
    }

    async fn query_status(&self, job_id: &str) -> Result<StatusMap, ApiError> {
        let url = self.endpoint(&["request_status", job_id])?;
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: StatusResponse =
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
        if let Some(reported) = parsed.rejection() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: parsed
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("service reported status {reported}")),
            });
        }
        parsed
            .file_states()
            .ok_or_else(|| ApiError::Decode("status response has no `request_status` object".into()))
    }

    async fn fetch_result(
        &self,
        job_id: &str,
        file_id: &str,
        format: OutputFormat,
    ) -> Result<FetchResult, ApiError> {
        let url = self.endpoint(&["download_results", job_id, file_id, format.as_str()])?;
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            let bytes = response.bytes().await?;
            return Ok(FetchResult::Ready(bytes.to_vec()));
        }

        match status {
            StatusCode::BAD_REQUEST | StatusCode::GONE | StatusCode::UNPROCESSABLE_ENTITY => {
                let reason = response
                    .text()
                    .await
                    .ok()
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or_else(|| status.to_string());
                Ok(FetchResult::PermanentFailure(reason))
            }
            _ => Ok(FetchResult::NotReady),
        }
    }
}
