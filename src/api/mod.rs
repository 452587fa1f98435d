pub mod client;
pub mod error;
pub mod types;

pub use client::{OcrClient, OcrService};
pub use error::ApiError;
pub use types::{FetchResult, OutputFormat, RemoteState, StatusMap};
