//! Transcription via the external `whisper` CLI.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::{EnrichError, Transcriber};

/// Spawns the `whisper` CLI on an audio file and reads back the text it
/// writes next to it.
///
/// Transcription is the one CPU-heavy step on the scheduling path;
/// running it as a subprocess keeps the timer loop free.
pub struct WhisperCli {
    binary: String,
    model: String,
}

impl WhisperCli {
    #[must_use]
    pub fn new(binary: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperCli {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, EnrichError> {
        let output_dir = audio_path.parent().unwrap_or_else(|| Path::new("."));

        let output = Command::new(&self.binary)
            .arg(audio_path)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_format")
            .arg("txt")
            .arg("--output_dir")
            .arg(output_dir)
            .arg("--fp16")
            .arg("False")
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

        // whisper writes `<stem>.txt` into the output directory.
        let text_path = audio_path.with_extension("txt");
        let text = tokio::fs::read_to_string(&text_path)
            .await
            .map_err(|_| EnrichError::MissingOutput {
                path: text_path.clone(),
            })?;

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let transcriber = WhisperCli::new("definitely-not-a-real-binary-xyz", "base");
        let result = transcriber.transcribe(Path::new("/tmp/S1.mp3")).await;
        assert!(matches!(result, Err(EnrichError::Spawn { .. })));
    }
}
