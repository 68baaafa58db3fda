use std::path::PathBuf;

use clap::Parser;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

/// Tuning flags are optional so a config file can fill what the command line leaves out.
#[derive(Parser, Debug, Default)]
#[command(name = "deck-player", version = VERSION)]
pub struct Args {
    /// Audio file to open at startup
    pub path: Option<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Resampler input chunk size in frames (higher => more latency, lower => more overhead)
    #[arg(long)]
    pub chunk_frames: Option<usize>,

    /// Playback callback refill cap (frames)
    #[arg(long)]
    pub refill_max_frames: Option<usize>,

    /// Queue buffer target in seconds (per stage)
    #[arg(long)]
    pub buffer_seconds: Option<f32>,

    /// Seconds skipped by the seek keys
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub seek_step: Option<u32>,

    /// Directory the file chooser starts in
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_path_and_flags() {
        let args = Args::try_parse_from([
            "deck-player",
            "song.flac",
            "--device",
            "usb",
            "--seek-step",
            "5",
            "--buffer-seconds",
            "1.5",
        ])
        .unwrap();
        assert_eq!(args.path, Some(PathBuf::from("song.flac")));
        assert_eq!(args.device.as_deref(), Some("usb"));
        assert_eq!(args.seek_step, Some(5));
        assert_eq!(args.buffer_seconds, Some(1.5));
        assert!(args.chunk_frames.is_none());
        assert!(!args.list_devices);
    }

    #[test]
    fn zero_seek_step_is_rejected() {
        assert!(Args::try_parse_from(["deck-player", "--seek-step", "0"]).is_err());
        let args = Args::try_parse_from(["deck-player", "--seek-step", "1"]).unwrap();
        assert_eq!(args.seek_step, Some(1));
    }

    #[test]
    fn everything_is_optional() {
        let args = Args::try_parse_from(["deck-player"]).unwrap();
        assert!(args.path.is_none());
        assert!(args.config.is_none());
    }
}
