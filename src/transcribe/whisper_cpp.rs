use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::TranscriberConfig;
use crate::error::{DubError, Result};
use crate::media::MediaCommand;
use super::{Transcript, TranscriptSegment, TranscriberTrait};

/// whisper.cpp `-oj` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppOutput {
    pub result: Option<WhisperCppResult>,
    pub transcription: Vec<WhisperCppSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppResult {
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppSegment {
    pub offsets: WhisperCppOffsets,
    pub text: String,
}

/// Segment offsets in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppOffsets {
    pub from: i64,
    pub to: i64,
}

impl From<WhisperCppOutput> for Transcript {
    fn from(output: WhisperCppOutput) -> Self {
        let segments = output
            .transcription
            .into_iter()
            .map(|seg| TranscriptSegment {
                start: seg.offsets.from as f64 / 1000.0,
                end: seg.offsets.to as f64 / 1000.0,
                text: seg.text.trim().to_string(),
            })
            .collect();
        Transcript::from_segments(segments, output.result.map(|r| r.language))
    }
}

/// Transcriber backed by the whisper.cpp CLI
pub struct WhisperCppTranscriber {
    config: TranscriberConfig,
}

impl WhisperCppTranscriber {
    pub fn new(config: TranscriberConfig) -> Self {
        Self { config }
    }

    /// whisper.cpp appends `.json` to the `-of` prefix
    fn output_prefix(json_path: &Path) -> PathBuf {
        json_path.with_extension("")
    }

    fn build_command(&self, audio_path: &Path, language: &str, json_path: &Path) -> MediaCommand {
        MediaCommand::new(&self.config.binary_path, "Transcription")
            .path_arg("-m", &self.config.model_path)
            .path_arg("-f", audio_path)
            .arg("-l")
            .arg(language)
            .arg("-t")
            .arg(self.config.threads.to_string())
            .arg("-oj")
            .path_arg("-of", Self::output_prefix(json_path))
            .arg("-np")
    }
}

#[async_trait]
impl TranscriberTrait for WhisperCppTranscriber {
    async fn transcribe(&self, audio_path: &Path, language: &str, scratch_path: &Path) -> Result<Transcript> {
        info!("Transcribing {} ({})", audio_path.display(), language);

        let json_path = Self::output_prefix(scratch_path).with_extension("json");
        self.build_command(audio_path, language, &json_path)
            .execute_as(DubError::Recognition)
            .await?;

        let content = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            DubError::Recognition(format!(
                "Failed to read transcription output {}: {}",
                json_path.display(),
                e
            ))
        })?;
        debug!("whisper.cpp produced {} bytes of JSON", content.len());

        let output: WhisperCppOutput = serde_json::from_str(&content)
            .map_err(|e| DubError::Recognition(format!("Failed to parse whisper output: {}", e)))?;
        let transcript = Transcript::from(output);

        if transcript.is_empty() {
            return Err(DubError::Recognition("No speech recognized".to_string()));
        }

        info!(
            "Transcription completed: {} segments, {:.1}s",
            transcript.segments.len(),
            transcript.duration()
        );
        Ok(transcript)
    }
}
