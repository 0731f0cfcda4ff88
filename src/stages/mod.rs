//! Stage wrappers around the external collaborators.
//!
//! Each wrapper pulls its input from the previous payload, allocates its
//! outputs through the run's artifact store and classifies collaborator
//! failures into the stage's error kind.

pub mod extract;
pub mod lipsync;
pub mod transcribe;
pub mod translate;
pub mod voice;

pub use extract::ExtractAudioStage;
pub use lipsync::LipSyncStage;
pub use transcribe::TranscribeStage;
pub use translate::TranslateStage;
pub use voice::CloneVoiceStage;

pub const EXTRACT_AUDIO: &str = "extract-audio";
pub const TRANSCRIBE: &str = "transcribe";
pub const TRANSLATE: &str = "translate";
pub const CLONE_VOICE: &str = "clone-voice";
pub const LIP_SYNC: &str = "lip-sync";

#[cfg(test)]
pub(crate) mod testing {
    use uuid::Uuid;

    use crate::artifact::{Artifact, ArtifactStore};
    use crate::request::PipelineRequest;
    use crate::stage::{PipelineStage, StageContext, StagePayload, StageResult};

    pub(crate) fn request(source: &str, target: &str) -> PipelineRequest {
        PipelineRequest::new("a.mp4", "b.wav", "c.mp4", source, target)
    }

    /// Run one stage against a throwaway artifact store.
    pub(crate) async fn run_stage(
        stage: &dyn PipelineStage,
        request: PipelineRequest,
        input: StagePayload,
    ) -> (StageResult, Vec<Artifact>) {
        let root = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(root.path(), Uuid::new_v4()).unwrap();
        let outputs = Vec::new();

        let result = {
            let mut ctx = StageContext::new(stage.name(), &request, &mut store, &input, &outputs);
            stage.execute(&mut ctx).await
        };
        let artifacts = store.artifacts().to_vec();
        store.release_all();
        (result, artifacts)
    }
}
