use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{Result, DubError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub media: MediaConfig,
    pub transcriber: TranscriberConfig,
    pub translate: TranslateConfig,
    pub voice: VoiceConfig,
    pub lipsync: LipSyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root directory for per-run intermediate artifacts
    pub temp_root: PathBuf,
    /// Supported language codes mapped to their English names
    pub supported_languages: BTreeMap<String, String>,
    /// Accepted input video extensions (without leading dot)
    pub video_formats: Vec<String>,
    /// Accepted reference audio extensions (without leading dot)
    pub audio_formats: Vec<String>,
    /// Attempts a retrying stage makes against its collaborator
    pub max_retries: u32,
    /// Initial backoff between retry attempts, doubled per attempt
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Sample rate of the extracted audio track
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Path to transcriber binary (e.g., whisper-cli)
    pub binary_path: String,
    /// Path to the ggml model file
    pub model_path: PathBuf,
    /// Number of inference threads
    pub threads: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Ollama endpoint URL
    pub endpoint: String,
    /// LLM model to use for translation
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Path to the coqui `tts` binary
    pub binary_path: String,
    /// Multilingual voice-cloning model name
    pub model_name: String,
    /// Run inference on GPU
    pub use_cuda: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LipSyncConfig {
    /// Interpreter used to run the inference script
    pub interpreter: String,
    /// Path to Wav2Lip `inference.py`
    pub script_path: PathBuf,
    /// Path to the Wav2Lip checkpoint
    pub checkpoint_path: PathBuf,
}

impl PipelineConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn language_name(&self, code: &str) -> Option<&str> {
        self.supported_languages.get(code).map(String::as_str)
    }
}

impl Default for Config {
    fn default() -> Self {
        let supported_languages = [
            ("en", "English"),
            ("es", "Spanish"),
            ("fr", "French"),
            ("de", "German"),
            ("hi", "Hindi"),
            ("ja", "Japanese"),
            ("ko", "Korean"),
            ("zh", "Chinese"),
        ]
        .into_iter()
        .map(|(code, name)| (code.to_string(), name.to_string()))
        .collect();

        Self {
            pipeline: PipelineConfig {
                temp_root: PathBuf::from("temp"),
                supported_languages,
                video_formats: vec!["mp4".to_string(), "avi".to_string(), "mov".to_string()],
                audio_formats: vec!["mp3".to_string(), "wav".to_string()],
                max_retries: 3,
                retry_backoff_ms: 500,
            },
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                sample_rate: 16000,
            },
            transcriber: TranscriberConfig {
                binary_path: "whisper-cli".to_string(),
                model_path: PathBuf::from("models/ggml-base.bin"),
                threads: 4,
            },
            translate: TranslateConfig {
                endpoint: "http://localhost:11434".to_string(),
                model: "llama3.2:3b".to_string(),
                timeout_secs: 300,
            },
            voice: VoiceConfig {
                binary_path: "tts".to_string(),
                model_name: "tts_models/multilingual/multi-dataset/your_tts".to_string(),
                use_cuda: false,
            },
            lipsync: LipSyncConfig {
                interpreter: "python3".to_string(),
                script_path: PathBuf::from("Wav2Lip/inference.py"),
                checkpoint_path: PathBuf::from("Wav2Lip/checkpoints/wav2lip_gan.pth"),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DubError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| DubError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DubError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| DubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
