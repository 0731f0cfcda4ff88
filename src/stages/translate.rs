use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::error::ErrorKind;
use crate::stage::{PipelineStage, RetryPolicy, StageContext, StageError, StagePayload, StageResult};
use crate::translate::Translator;
use super::TRANSLATE;

/// Transcript in, translated text out. Retries the translator per its policy.
pub struct TranslateStage {
    translator: Arc<dyn Translator>,
    retry: RetryPolicy,
}

impl TranslateStage {
    pub fn new(translator: Arc<dyn Translator>, retry: RetryPolicy) -> Self {
        Self { translator, retry }
    }
}

#[async_trait]
impl PipelineStage for TranslateStage {
    fn name(&self) -> &str {
        TRANSLATE
    }

    fn completion_message(&self) -> String {
        "Text translated".to_string()
    }

    async fn execute(&self, ctx: &mut StageContext<'_>) -> StageResult {
        let transcript = ctx.input_transcript()?;
        let source = ctx.request().source_language().to_string();
        let target = ctx.request().target_language().to_string();

        if transcript.is_empty() {
            return Err(StageError::new(ErrorKind::Translation, "Transcript is empty"));
        }
        if source == target {
            info!("Source and target language are both '{}', skipping translation", source);
            return Ok(StagePayload::Text(transcript.text));
        }

        let text = transcript.text.as_str();
        let (source, target) = (source.as_str(), target.as_str());
        let translated = self
            .retry
            .run("Translation", || {
                let translator = Arc::clone(&self.translator);
                async move { translator.translate(text, source, target).await }
            })
            .await
            .map_err(|e| StageError::classify(e, ErrorKind::Translation))?;
        Ok(StagePayload::Text(translated))
    }
}
