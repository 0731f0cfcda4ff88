use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ErrorKind;
use crate::lipsync::LipSyncTrait;
use crate::stage::{PipelineStage, StageContext, StageError, StagePayload, StageResult};
use super::LIP_SYNC;

/// Dubbed audio path in, final video path out. Writes straight to the
/// requested output, which is not an artifact.
pub struct LipSyncStage {
    syncer: Arc<dyn LipSyncTrait>,
}

impl LipSyncStage {
    pub fn new(syncer: Arc<dyn LipSyncTrait>) -> Self {
        Self { syncer }
    }
}

#[async_trait]
impl PipelineStage for LipSyncStage {
    fn name(&self) -> &str {
        LIP_SYNC
    }

    fn completion_message(&self) -> String {
        "Lips synchronized".to_string()
    }

    async fn execute(&self, ctx: &mut StageContext<'_>) -> StageResult {
        let audio = ctx.input_path()?;
        let video = ctx.request().video_path().to_path_buf();
        let output = ctx.request().output_path().to_path_buf();

        let output = self
            .syncer
            .sync(&video, &audio, &output)
            .await
            .map_err(|e| StageError::classify(e, ErrorKind::Sync))?;
        Ok(StagePayload::Path(output))
    }
}
