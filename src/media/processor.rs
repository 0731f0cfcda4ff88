use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::MediaConfig;
use crate::error::{DubError, Result};
use super::{MediaCommandBuilder, MediaProcessorTrait};

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    /// Create a new media processor implementation
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);

        Self {
            config,
            command_builder,
        }
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<PathBuf> {
        info!("Extracting audio from {} to {}", video_path.display(), audio_path.display());

        let command = self
            .command_builder
            .extract_audio(video_path, audio_path, self.config.sample_rate);
        command.execute().await?;

        if !audio_path.is_file() {
            return Err(DubError::Media(format!(
                "ffmpeg reported success but {} was not written",
                audio_path.display()
            )));
        }

        info!("Audio extraction completed");
        Ok(audio_path.to_path_buf())
    }
}
