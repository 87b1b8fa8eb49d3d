use clap::Parser;
use std::path::PathBuf;

use crate::silence::IntroParams;

/// Scan a folder of hymn recordings for total duration and intro length.
#[derive(Parser, Debug)]
#[clap(version)]
pub struct Args {
    /// Folder holding the audio files
    pub input_dir: PathBuf,

    /// JSON file rewritten after every processed file
    pub output: PathBuf,

    #[clap(long, env = "HYMNSCAN_EXTENSION", default_value = "mp3")]
    pub extension: String,

    #[clap(long, env = "HYMNSCAN_INTRO_MIN_MS", default_value_t = 5_000)]
    pub intro_min_ms: u64,

    #[clap(long, env = "HYMNSCAN_INTRO_MAX_MS", default_value_t = 25_000)]
    pub intro_max_ms: u64,

    #[clap(long, env = "HYMNSCAN_MIN_SILENCE_MS", default_value_t = 1_000)]
    pub min_silence_ms: u64,

    /// Silence is anything at or below (track dBFS - this offset)
    #[clap(long, env = "HYMNSCAN_SILENCE_THRESH_DB", default_value_t = 16.0)]
    pub silence_thresh_db: f64,

    /// Path to the ffmpeg binary used for non-WAV input
    #[clap(long, env = "HYMNSCAN_FFMPEG")]
    pub ffmpeg: Option<PathBuf>,

    /// Hymns.json catalogue to update with the scanned durations
    #[clap(long, env = "HYMNSCAN_MERGE_INTO")]
    pub merge_into: Option<PathBuf>,
}

impl Args {
    pub fn intro_params(&self) -> IntroParams {
        IntroParams {
            min_ms: self.intro_min_ms,
            max_ms: self.intro_max_ms,
            min_silence_len_ms: self.min_silence_ms,
            silence_thresh_db_offset: self.silence_thresh_db,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tuned_detection_constants() {
        let args = Args::try_parse_from(["hymnscan", "../mp3", "out.json"]).unwrap();
        assert_eq!(args.intro_params(), IntroParams::default());
        assert_eq!(args.extension, "mp3");
        assert!(args.ffmpeg.is_none());
        assert!(args.merge_into.is_none());
    }

    #[test]
    fn requires_both_positionals() {
        assert!(Args::try_parse_from(["hymnscan", "../mp3"]).is_err());
        assert!(Args::try_parse_from(["hymnscan", "a", "b", "c"]).is_err());
    }

    #[test]
    fn flags_override_detection_params() {
        let args = Args::try_parse_from([
            "hymnscan",
            "in",
            "out.json",
            "--intro-min-ms",
            "3000",
            "--silence-thresh-db",
            "20",
        ])
        .unwrap();
        let params = args.intro_params();
        assert_eq!(params.min_ms, 3_000);
        assert_eq!(params.max_ms, 25_000);
        assert_eq!(params.silence_thresh_db_offset, 20.0);
    }
}
