use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::LipSyncConfig;
use crate::error::{DubError, Result};
use crate::media::MediaCommand;
use super::LipSyncTrait;

pub struct Wav2LipSyncer {
    config: LipSyncConfig,
}

impl Wav2LipSyncer {
    pub fn new(config: LipSyncConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, video_path: &Path, audio_path: &Path, output_path: &Path) -> MediaCommand {
        MediaCommand::new(&self.config.interpreter, "Lip synchronization")
            .output(&self.config.script_path)
            .path_arg("--checkpoint_path", &self.config.checkpoint_path)
            .path_arg("--face", video_path)
            .path_arg("--audio", audio_path)
            .path_arg("--outfile", output_path)
    }
}

#[async_trait]
impl LipSyncTrait for Wav2LipSyncer {
    async fn sync(&self, video_path: &Path, audio_path: &Path, output_path: &Path) -> Result<PathBuf> {
        info!(
            "Synchronizing lips of {} to {} -> {}",
            video_path.display(),
            audio_path.display(),
            output_path.display()
        );

        self.build_command(video_path, audio_path, output_path)
            .execute_as(DubError::Sync)
            .await?;

        if !output_path.is_file() {
            return Err(DubError::Sync(format!(
                "Wav2Lip finished without writing {}",
                output_path.display()
            )));
        }

        info!("Lip synchronization completed");
        Ok(output_path.to_path_buf())
    }
}
