//! The persisted session blob.
//!
//! One JSON file owned exclusively by the upstream client. Writes go
//! through a temp-file-then-rename so a crash mid-write never leaves a
//! truncated blob behind, and two processes never observe a half-written
//! file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;

/// The serialized session state: everything needed to resume an
/// authenticated session without logging in again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBlob {
    pub session_token: String,
    pub csrf_token: Option<String>,
}

impl SessionBlob {
    /// Loads the blob from `path`. A missing file is `Ok(None)`; a file
    /// that exists but does not parse is treated the same way (the
    /// client falls through to the next credential mode), with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::SessionFile`] on I/O failure other than
    /// the file not existing.
    pub async fn load(path: &Path) -> Result<Option<Self>, UpstreamError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(UpstreamError::SessionFile {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };

        match serde_json::from_str::<SessionBlob>(&raw) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "session file does not parse — ignoring it"
                );
                Ok(None)
            }
        }
    }

    /// Persists the blob atomically: write `<path>.tmp`, then rename over
    /// the target.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::SessionFile`] on I/O failure.
    pub async fn save(&self, path: &Path) -> Result<(), UpstreamError> {
        let wrap = |e: std::io::Error| UpstreamError::SessionFile {
            path: path.display().to_string(),
            source: e,
        };

        let body = serde_json::to_string_pretty(self).map_err(|e| UpstreamError::SessionFile {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);

        tokio::fs::write(&tmp, body).await.map_err(wrap)?;
        tokio::fs::rename(&tmp, path).await.map_err(wrap)?;
        Ok(())
    }
}
