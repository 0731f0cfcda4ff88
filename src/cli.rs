use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dub a video into another language with the speaker's cloned voice
    Dub {
        /// Input video file
        #[arg(short = 'i', long)]
        video: PathBuf,

        /// Reference recording of the voice to clone
        #[arg(short, long)]
        reference_audio: PathBuf,

        /// Output video file
        #[arg(short, long)]
        output: PathBuf,

        /// Language spoken in the input video
        #[arg(short, long, default_value = "en")]
        source: String,

        /// Language of the dubbed output
        #[arg(short, long, default_value = "hi")]
        target: String,
    },

    /// List supported languages
    Languages,

    /// Remove intermediate files left behind by interrupted runs
    Clean,

    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        #[arg(short, long, default_value = "config.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dub() {
        let args = Args::try_parse_from([
            "lipdub", "-v", "dub", "--video", "a.mp4", "--reference-audio", "b.wav", "--output", "c.mp4",
            "--target", "es",
        ])
        .unwrap();

        assert!(args.verbose);
        match args.command {
            Commands::Dub { video, source, target, .. } => {
                assert_eq!(video, PathBuf::from("a.mp4"));
                assert_eq!(source, "en");
                assert_eq!(target, "es");
            }
            _ => panic!("expected dub"),
        }
    }

    #[test]
    fn test_dub_requires_output() {
        let result = Args::try_parse_from(["lipdub", "dub", "--video", "a.mp4", "--reference-audio", "b.wav"]);
        assert!(result.is_err());
    }
}
