//! Lipdub - Lip-Synchronized Video Dubbing
//!
//! Turns a source-language video into a dubbed, lip-synchronized
//! target-language video by chaining ffmpeg, whisper-cpp, ollama,
//! coqui-tts and Wav2Lip behind a single-run orchestrator.

pub mod artifact;
pub mod cli;
pub mod config;
pub mod error;
pub mod lipsync;
pub mod media;
pub mod pipeline;
pub mod progress;
pub mod request;
pub mod stage;
pub mod stages;
pub mod transcribe;
pub mod translate;
pub mod voice;
