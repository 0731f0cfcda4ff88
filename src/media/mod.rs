// Media processing
//
// - Commands: external tool invocation shared by every collaborator that
//   shells out (ffmpeg, whisper-cli, tts, wav2lip)
// - Processor: ffmpeg-backed audio extraction

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Video to audio extraction capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Extract the audio track of `video_path` into `audio_path`
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<PathBuf>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config))
    }
}
