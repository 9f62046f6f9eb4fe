//! Audio extraction via the external `yt-dlp` tool.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::{AudioExtractor, EnrichError};

/// Spawns `yt-dlp` to download a media page's audio track as mp3.
///
/// The subprocess runs without the platform proxy: extraction fetches
/// public CDN URLs and deliberately does not share the authenticated
/// identity's network path.
pub struct YtDlpExtractor {
    binary: String,
}

impl YtDlpExtractor {
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// `yt-dlp` appends the final extension itself, so the output
    /// template is the destination with `.mp3` stripped.
    fn output_template(dest: &Path) -> String {
        let stem = dest.with_extension("");
        format!("{}.%(ext)s", stem.display())
    }
}

#[async_trait]
impl AudioExtractor for YtDlpExtractor {
    async fn extract(&self, media_url: &str, dest: &Path) -> Result<(), EnrichError> {
        let output = Command::new(&self.binary)
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg("mp3")
            .arg("--audio-quality")
            .arg("192K")
            .arg("--output")
            .arg(Self::output_template(dest))
            .arg("--quiet")
            .arg("--no-progress")
            .arg(media_url)
            .output()
            .await
            .map_err(|e| EnrichError::Spawn {
                tool: self.binary.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(EnrichError::ToolFailed {
                tool: self.binary.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let meta = tokio::fs::metadata(dest)
            .await
            .map_err(|_| EnrichError::MissingOutput {
                path: dest.to_path_buf(),
            })?;
        if meta.len() == 0 {
            return Err(EnrichError::MissingOutput {
                path: dest.to_path_buf(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_template_strips_extension() {
        let template = YtDlpExtractor::output_template(Path::new("/audio/S1.mp3"));
        assert_eq!(template, "/audio/S1.%(ext)s");
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let extractor = YtDlpExtractor::new("definitely-not-a-real-binary-xyz");
        let result = extractor
            .extract("https://example.com/reel/S1/", Path::new("/tmp/S1.mp3"))
            .await;
        assert!(matches!(result, Err(EnrichError::Spawn { .. })));
    }
}
