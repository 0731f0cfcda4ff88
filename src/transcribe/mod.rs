// Speech transcription
//
// - WhisperCpp: whisper.cpp command-line implementation
//
// A new engine implements `TranscriberTrait` and maps its own output into
// `Transcript`.

pub mod whisper_cpp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::TranscriberConfig;
use crate::error::Result;

/// One timed piece of recognized speech
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    pub text: String,
}

/// Recognized speech of a whole audio track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
    /// Language reported by the engine, if any
    pub language: Option<String>,
}

impl Transcript {
    /// Build a transcript whose text is the concatenation of its segments
    pub fn from_segments(segments: Vec<TranscriptSegment>, language: Option<String>) -> Self {
        let text = segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            text,
            segments,
            language,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Duration covered by the segments, in seconds
    pub fn duration(&self) -> f64 {
        self.segments.last().map(|s| s.end).unwrap_or(0.0)
    }
}

/// Speech recognition capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriberTrait: Send + Sync {
    /// Transcribe `audio_path`, spoken in `language`. Engines that produce
    /// an intermediate file write it to `scratch_path`.
    async fn transcribe(&self, audio_path: &Path, language: &str, scratch_path: &Path) -> Result<Transcript>;
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    /// Create the default transcriber (whisper.cpp)
    pub fn create_default(config: TranscriberConfig) -> Box<dyn TranscriberTrait> {
        Box::new(whisper_cpp::WhisperCppTranscriber::new(config))
    }
}
