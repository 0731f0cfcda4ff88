use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::VoiceConfig;
use crate::error::{DubError, Result};
use crate::media::MediaCommand;
use super::VoiceClonerTrait;

pub struct CoquiVoiceCloner {
    config: VoiceConfig,
}

impl CoquiVoiceCloner {
    pub fn new(config: VoiceConfig) -> Self {
        Self { config }
    }

    fn build_command(
        &self,
        text: &str,
        reference_audio: &Path,
        output_path: &Path,
        language: &str,
    ) -> MediaCommand {
        let cmd = MediaCommand::new(&self.config.binary_path, "Voice cloning")
            .arg("--text")
            .arg(text)
            .arg("--model_name")
            .arg(&self.config.model_name)
            .path_arg("--speaker_wav", reference_audio)
            .arg("--language_idx")
            .arg(language)
            .path_arg("--out_path", output_path);

        if self.config.use_cuda {
            cmd.arg("--use_cuda").arg("true")
        } else {
            cmd
        }
    }
}

#[async_trait]
impl VoiceClonerTrait for CoquiVoiceCloner {
    async fn clone_voice(
        &self,
        text: &str,
        reference_audio: &Path,
        output_path: &Path,
        language: &str,
    ) -> Result<PathBuf> {
        if text.trim().is_empty() {
            return Err(DubError::Synthesis("No text to synthesize".to_string()));
        }
        info!(
            "Cloning voice from {} into {} ({})",
            reference_audio.display(),
            output_path.display(),
            language
        );

        self.build_command(text, reference_audio, output_path, language)
            .execute_as(DubError::Synthesis)
            .await?;

        if !output_path.is_file() {
            return Err(DubError::Synthesis(format!(
                "tts finished without writing {}",
                output_path.display()
            )));
        }

        info!("Voice cloning completed");
        Ok(output_path.to_path_buf())
    }
}
