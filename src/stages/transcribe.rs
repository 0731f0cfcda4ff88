use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ErrorKind;
use crate::stage::{PipelineStage, StageContext, StageError, StagePayload, StageResult};
use crate::transcribe::TranscriberTrait;
use super::TRANSCRIBE;

/// Audio path in, transcript out
pub struct TranscribeStage {
    transcriber: Arc<dyn TranscriberTrait>,
}

impl TranscribeStage {
    pub fn new(transcriber: Arc<dyn TranscriberTrait>) -> Self {
        Self { transcriber }
    }
}

#[async_trait]
impl PipelineStage for TranscribeStage {
    fn name(&self) -> &str {
        TRANSCRIBE
    }

    fn completion_message(&self) -> String {
        "Audio transcribed".to_string()
    }

    async fn execute(&self, ctx: &mut StageContext<'_>) -> StageResult {
        let audio = ctx.input_path()?;
        let language = ctx.request().source_language().to_string();
        let scratch = ctx.allocate("transcript", "json")?;

        let transcript = self
            .transcriber
            .transcribe(&audio, &language, &scratch)
            .await
            .map_err(|e| StageError::classify(e, ErrorKind::Recognition))?;
        Ok(StagePayload::Transcript(transcript))
    }
}
