//! Input loader: reads the job manifest.
//!
//! The manifest is the exact JSON document submitted to the service. Its
//! `images` object is keyed by file identifier; key order is the processing
//! order for every download pass.

use std::path::Path;

use serde_json::Value;

use crate::error::ManifestError;

const IMAGES_FIELD: &str = "images";

/// A parsed manifest: the verbatim job payload plus its file identifiers.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub payload: Value,
    pub file_ids: Vec<String>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ManifestError> {
        let payload: Value = serde_json::from_str(contents)?;
        let images = match payload.get(IMAGES_FIELD) {
            None | Some(Value::Null) => return Err(ManifestError::MissingField(IMAGES_FIELD)),
            Some(Value::Object(images)) => images,
            Some(_) => return Err(ManifestError::NotAnObject(IMAGES_FIELD)),
        };
        if images.is_empty() {
            return Err(ManifestError::Empty);
        }

        let file_ids = images.keys().cloned().collect();
        Ok(Self { payload, file_ids })
    }
}
