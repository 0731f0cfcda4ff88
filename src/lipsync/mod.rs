// Lip synchronization
//
// - Wav2Lip: `inference.py` from the Wav2Lip project

pub mod wav2lip;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use wav2lip::Wav2LipSyncer;
use crate::config::LipSyncConfig;
use crate::error::Result;

/// Re-animates the speaker in a video to match a new audio track
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LipSyncTrait: Send + Sync {
    async fn sync(&self, video_path: &Path, audio_path: &Path, output_path: &Path) -> Result<PathBuf>;
}

/// Factory for creating lip-sync instances
pub struct LipSyncFactory;

impl LipSyncFactory {
    pub fn create_default(config: LipSyncConfig) -> Box<dyn LipSyncTrait> {
        Box::new(Wav2LipSyncer::new(config))
    }
}
