//! Media enrichment: audio download and transcription.
//!
//! For a freshly discovered video the [`Enricher`] resolves the media
//! URL into a local content-addressed mp3 and a text transcription.
//! Both steps are opaque external tools behind the [`AudioExtractor`]
//! and [`Transcriber`] seams; partial failure is a valid outcome and no
//! error ever escapes to the caller — a video without audio or text is
//! still worth a row.

mod extractor;
mod transcriber;

pub use extractor::YtDlpExtractor;
pub use transcriber::WhisperCli;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("expected output file missing or empty: {path}")]
    MissingOutput { path: PathBuf },

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Produces a local audio file from a media page URL.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Downloads the media at `media_url` and writes its audio track to
    /// `dest` as mp3.
    async fn extract(&self, media_url: &str, dest: &Path) -> Result<(), EnrichError>;
}

/// Turns an audio file into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, EnrichError>;
}

/// The enrichment result. Either field may be absent; `transcription`
/// without `audio_file_path` cannot occur.
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub audio_file_path: Option<PathBuf>,
    pub transcription: Option<String>,
}

/// Orchestrates extraction and transcription for one shortcode.
pub struct Enricher {
    audio_dir: PathBuf,
    extractor: Box<dyn AudioExtractor>,
    transcriber: Box<dyn Transcriber>,
}

impl Enricher {
    pub fn new(
        audio_dir: PathBuf,
        extractor: Box<dyn AudioExtractor>,
        transcriber: Box<dyn Transcriber>,
    ) -> Self {
        Self {
            audio_dir,
            extractor,
            transcriber,
        }
    }

    /// The deterministic audio path for a shortcode.
    #[must_use]
    pub fn audio_path(&self, shortcode: &str) -> PathBuf {
        self.audio_dir.join(format!("{shortcode}.mp3"))
    }

    /// Downloads and transcribes the media behind `media_url`.
    ///
    /// Idempotent per shortcode: an existing non-empty mp3 skips
    /// extraction, and a repeated call re-attempts only what is missing.
    /// Failures are logged and downgraded — the returned [`Enrichment`]
    /// simply carries less.
    pub async fn enrich(&self, shortcode: &str, media_url: &str) -> Enrichment {
        let dest = self.audio_path(shortcode);

        if !file_is_nonempty(&dest).await {
            if let Err(e) = self.extractor.extract(media_url, &dest).await {
                tracing::warn!(shortcode, error = %e, "audio extraction failed");
                return Enrichment::default();
            }
            if !file_is_nonempty(&dest).await {
                tracing::warn!(shortcode, path = %dest.display(), "extractor produced no audio");
                return Enrichment::default();
            }
        } else {
            tracing::debug!(shortcode, "audio already on disk — skipping extraction");
        }

        let transcription = match self.transcriber.transcribe(&dest).await {
            Ok(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
            Err(e) => {
                tracing::warn!(shortcode, error = %e, "transcription failed");
                None
            }
        };

        Enrichment {
            audio_file_path: Some(dest),
            transcription,
        }
    }
}

async fn file_is_nonempty(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct StubExtractor {
        calls: Arc<AtomicU32>,
        fail: bool,
    }

    #[async_trait]
    impl AudioExtractor for StubExtractor {
        async fn extract(&self, _media_url: &str, dest: &Path) -> Result<(), EnrichError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EnrichError::MissingOutput {
                    path: dest.to_path_buf(),
                });
            }
            tokio::fs::write(dest, b"mp3-bytes").await.map_err(|e| EnrichError::Io {
                path: dest.to_path_buf(),
                source: e,
            })
        }
    }

    struct StubTranscriber {
        calls: Arc<AtomicU32>,
        result: Option<String>,
    }

    #[async_trait]
    impl Transcriber for StubTranscriber {
        async fn transcribe(&self, audio_path: &Path) -> Result<String, EnrichError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().ok_or_else(|| EnrichError::MissingOutput {
                path: audio_path.to_path_buf(),
            })
        }
    }

    fn enricher(
        dir: &Path,
        extract_fail: bool,
        transcription: Option<String>,
    ) -> (Enricher, Arc<AtomicU32>, Arc<AtomicU32>) {
        let extract_calls = Arc::new(AtomicU32::new(0));
        let transcribe_calls = Arc::new(AtomicU32::new(0));
        let enricher = Enricher::new(
            dir.to_path_buf(),
            Box::new(StubExtractor {
                calls: Arc::clone(&extract_calls),
                fail: extract_fail,
            }),
            Box::new(StubTranscriber {
                calls: Arc::clone(&transcribe_calls),
                result: transcription,
            }),
        );
        (enricher, extract_calls, transcribe_calls)
    }

    #[tokio::test]
    async fn full_enrichment_produces_audio_and_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (enricher, _, _) = enricher(dir.path(), false, Some("hello world".to_string()));

        let result = enricher.enrich("S1", "https://example.com/reel/S1/").await;
        assert_eq!(result.audio_file_path, Some(dir.path().join("S1.mp3")));
        assert_eq!(result.transcription.as_deref(), Some("hello world"));
    }

    #[tokio::test]
    async fn extraction_failure_downgrades_to_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (enricher, _, transcribe_calls) =
            enricher(dir.path(), true, Some("never".to_string()));

        let result = enricher.enrich("S1", "https://example.com/reel/S1/").await;
        assert!(result.audio_file_path.is_none());
        assert!(result.transcription.is_none());
        assert_eq!(
            transcribe_calls.load(Ordering::SeqCst),
            0,
            "no transcription attempt without audio"
        );
    }

    #[tokio::test]
    async fn transcription_failure_keeps_audio() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (enricher, _, _) = enricher(dir.path(), false, None);

        let result = enricher.enrich("S1", "https://example.com/reel/S1/").await;
        assert!(result.audio_file_path.is_some());
        assert!(result.transcription.is_none());
    }

    #[tokio::test]
    async fn existing_audio_skips_extraction_and_retries_transcription() {
        let dir = tempfile::tempdir().expect("tempdir");
        tokio::fs::write(dir.path().join("S1.mp3"), b"already-here")
            .await
            .expect("pre-seed audio");
        let (enricher, extract_calls, transcribe_calls) =
            enricher(dir.path(), false, Some("recovered text".to_string()));

        let result = enricher.enrich("S1", "https://example.com/reel/S1/").await;
        assert_eq!(extract_calls.load(Ordering::SeqCst), 0, "mp3 reused");
        assert_eq!(transcribe_calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.transcription.as_deref(), Some("recovered text"));
    }

    #[tokio::test]
    async fn empty_existing_file_is_re_extracted() {
        let dir = tempfile::tempdir().expect("tempdir");
        tokio::fs::write(dir.path().join("S1.mp3"), b"")
            .await
            .expect("pre-seed empty file");
        let (enricher, extract_calls, _) =
            enricher(dir.path(), false, Some("text".to_string()));

        let result = enricher.enrich("S1", "https://example.com/reel/S1/").await;
        assert_eq!(extract_calls.load(Ordering::SeqCst), 1);
        assert!(result.audio_file_path.is_some());
    }

    #[tokio::test]
    async fn whitespace_transcription_becomes_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (enricher, _, _) = enricher(dir.path(), false, Some("   \n".to_string()));

        let result = enricher.enrich("S1", "https://example.com/reel/S1/").await;
        assert!(result.transcription.is_none());
    }
}
