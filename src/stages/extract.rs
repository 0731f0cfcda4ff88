use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ErrorKind;
use crate::media::MediaProcessorTrait;
use crate::stage::{PipelineStage, StageContext, StageError, StagePayload, StageResult};
use super::EXTRACT_AUDIO;

/// Video path in, extracted audio path out
pub struct ExtractAudioStage {
    processor: Arc<dyn MediaProcessorTrait>,
}

impl ExtractAudioStage {
    pub fn new(processor: Arc<dyn MediaProcessorTrait>) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl PipelineStage for ExtractAudioStage {
    fn name(&self) -> &str {
        EXTRACT_AUDIO
    }

    fn completion_message(&self) -> String {
        "Audio extracted".to_string()
    }

    async fn execute(&self, ctx: &mut StageContext<'_>) -> StageResult {
        let video = ctx.input_path()?;
        let audio = ctx.allocate("audio", "wav")?;

        let audio = self
            .processor
            .extract_audio(&video, &audio)
            .await
            .map_err(|e| StageError::classify(e, ErrorKind::Media))?;
        Ok(StagePayload::Path(audio))
    }
}
