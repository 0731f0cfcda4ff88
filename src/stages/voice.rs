use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ErrorKind;
use crate::stage::{PipelineStage, StageContext, StageError, StagePayload, StageResult};
use crate::voice::VoiceClonerTrait;
use super::CLONE_VOICE;

/// Translated text in, dubbed audio path out
pub struct CloneVoiceStage {
    cloner: Arc<dyn VoiceClonerTrait>,
}

impl CloneVoiceStage {
    pub fn new(cloner: Arc<dyn VoiceClonerTrait>) -> Self {
        Self { cloner }
    }
}

#[async_trait]
impl PipelineStage for CloneVoiceStage {
    fn name(&self) -> &str {
        CLONE_VOICE
    }

    fn completion_message(&self) -> String {
        "Voice cloned".to_string()
    }

    async fn execute(&self, ctx: &mut StageContext<'_>) -> StageResult {
        let text = ctx.input_text()?;
        let dubbed = ctx.allocate("dubbed", "wav")?;
        let reference = ctx.request().reference_audio_path().to_path_buf();
        let language = ctx.request().target_language().to_string();

        let dubbed = self
            .cloner
            .clone_voice(&text, &reference, &dubbed, &language)
            .await
            .map_err(|e| StageError::classify(e, ErrorKind::Synthesis))?;
        Ok(StagePayload::Path(dubbed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DubError;
    use crate::stages::testing::{request, run_stage};
    use crate::voice::MockVoiceClonerTrait;
    use std::path::Path;

    #[tokio::test]
    async fn test_clones_with_reference_and_target_language() {
        let mut cloner = MockVoiceClonerTrait::new();
        cloner
            .expect_clone_voice()
            .withf(|text, reference, _, language| {
                text == "नमस्ते" && reference == Path::new("b.wav") && language == "hi"
            })
            .times(1)
            .returning(|_, _, output, _| Ok(output.to_path_buf()));

        let stage = CloneVoiceStage::new(Arc::new(cloner));
        let (result, artifacts) =
            run_stage(&stage, request("en", "hi"), StagePayload::Text("नमस्ते".to_string())).await;

        assert_eq!(artifacts[0].stage, CLONE_VOICE);
        assert_eq!(result.unwrap(), StagePayload::Path(artifacts[0].path.clone()));
    }

    #[tokio::test]
    async fn test_failure_is_synthesis_error() {
        let mut cloner = MockVoiceClonerTrait::new();
        cloner
            .expect_clone_voice()
            .returning(|_, _, _, _| Err(DubError::Synthesis("model unavailable".to_string())));

        let stage = CloneVoiceStage::new(Arc::new(cloner));
        let (result, artifacts) =
            run_stage(&stage, request("en", "hi"), StagePayload::Text("hi".to_string())).await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Synthesis);
        assert!(err.message.contains("model unavailable"));
        // the output path was allocated before the collaborator failed
        assert_eq!(artifacts.len(), 1);
    }
}
