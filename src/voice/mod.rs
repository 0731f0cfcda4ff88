// Voice cloning
//
// - Coqui: multilingual YourTTS through the coqui `tts` CLI

pub mod coqui;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use coqui::CoquiVoiceCloner;
use crate::config::VoiceConfig;
use crate::error::Result;

/// Text-to-speech conditioned on a reference voice
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceClonerTrait: Send + Sync {
    /// Speak `text` in `language` with the voice of `reference_audio`,
    /// writing the result to `output_path`
    async fn clone_voice(
        &self,
        text: &str,
        reference_audio: &Path,
        output_path: &Path,
        language: &str,
    ) -> Result<PathBuf>;
}

/// Factory for creating voice cloner instances
pub struct VoiceClonerFactory;

impl VoiceClonerFactory {
    pub fn create_default(config: VoiceConfig) -> Box<dyn VoiceClonerTrait> {
        Box::new(CoquiVoiceCloner::new(config))
    }
}
