use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::artifact::probe_writable;
use crate::config::PipelineConfig;
use crate::error::{DubError, Result};

/// Immutable input of one dubbing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRequest {
    video_path: PathBuf,
    reference_audio_path: PathBuf,
    output_path: PathBuf,
    source_language: String,
    target_language: String,
}

impl PipelineRequest {
    pub fn new(
        video_path: impl Into<PathBuf>,
        reference_audio_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            video_path: video_path.into(),
            reference_audio_path: reference_audio_path.into(),
            output_path: output_path.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
        }
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    pub fn reference_audio_path(&self) -> &Path {
        &self.reference_audio_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }
}

/// Checks a request against the filesystem and the supported language set
/// before any run state is created.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    languages: BTreeSet<String>,
    video_formats: Vec<String>,
    audio_formats: Vec<String>,
}

impl RequestValidator {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            languages: config.supported_languages.keys().cloned().collect(),
            video_formats: config.video_formats.iter().map(|f| f.to_lowercase()).collect(),
            audio_formats: config.audio_formats.iter().map(|f| f.to_lowercase()).collect(),
        }
    }

    pub fn validate(&self, request: &PipelineRequest) -> Result<()> {
        check_input(request.video_path(), "Input video", &self.video_formats)?;
        check_input(request.reference_audio_path(), "Reference audio", &self.audio_formats)?;
        self.check_output(request)?;
        self.check_language(request.source_language(), "Source")?;
        self.check_language(request.target_language(), "Target")?;
        Ok(())
    }

    fn check_output(&self, request: &PipelineRequest) -> Result<()> {
        let output = request.output_path();
        if output.as_os_str().is_empty() {
            return Err(DubError::Validation("Output path is empty".to_string()));
        }
        if output == request.video_path() {
            return Err(DubError::Validation(
                "Output path must differ from the input video".to_string(),
            ));
        }

        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let metadata = std::fs::metadata(parent).map_err(|e| {
            DubError::Validation(format!(
                "Output directory {} is not accessible: {}",
                parent.display(),
                e
            ))
        })?;
        if !metadata.is_dir() {
            return Err(DubError::Validation(format!(
                "Output parent {} is not a directory",
                parent.display()
            )));
        }
        probe_writable(parent).map_err(|e| {
            DubError::Validation(format!(
                "Output directory {} is not writable: {}",
                parent.display(),
                e
            ))
        })
    }

    fn check_language(&self, code: &str, role: &str) -> Result<()> {
        if self.languages.contains(code) {
            Ok(())
        } else {
            Err(DubError::Validation(format!(
                "{} language '{}' is not supported (supported: {})",
                role,
                code,
                self.languages.iter().cloned().collect::<Vec<_>>().join(", ")
            )))
        }
    }
}

fn check_input(path: &Path, role: &str, formats: &[String]) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(DubError::Validation(format!("{} path is empty", role)));
    }
    if !path.is_file() {
        return Err(DubError::Validation(format!(
            "{} not found: {}",
            role,
            path.display()
        )));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !formats.contains(&extension) {
        return Err(DubError::Validation(format!(
            "{} has unsupported format '{}' (accepted: {})",
            role,
            extension,
            formats.join(", ")
        )));
    }
    Ok(())
}
