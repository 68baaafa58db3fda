//! Player settings: optional TOML file merged under the command line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use audio_player::PlaybackConfig;
use serde::Deserialize;

use crate::cli::Args;

/// Default seek step in seconds.
pub const DEFAULT_SEEK_STEP_SECS: u32 = 10;

/// Config file schema. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Output device substring.
    pub device: Option<String>,
    pub buffer_seconds: Option<f32>,
    pub chunk_frames: Option<usize>,
    pub refill_max_frames: Option<usize>,
    pub seek_step_secs: Option<u32>,
    /// Chooser start directory.
    pub start_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg =
            toml::from_str::<FileConfig>(&raw).with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

/// Effective settings after merging.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub playback: PlaybackConfig,
    pub device: Option<String>,
    pub seek_step_secs: u32,
    pub start_dir: PathBuf,
}

/// Merge command line over file over defaults.
pub fn resolve(args: &Args, file: FileConfig) -> Settings {
    let defaults = PlaybackConfig::default();
    let playback = PlaybackConfig {
        chunk_frames: args
            .chunk_frames
            .or(file.chunk_frames)
            .unwrap_or(defaults.chunk_frames),
        refill_max_frames: args
            .refill_max_frames
            .or(file.refill_max_frames)
            .unwrap_or(defaults.refill_max_frames),
        buffer_seconds: args
            .buffer_seconds
            .or(file.buffer_seconds)
            .unwrap_or(defaults.buffer_seconds),
    };
    Settings {
        playback,
        device: args.device.clone().or(file.device),
        seek_step_secs: args
            .seek_step
            .filter(|s| *s > 0)
            .or(file.seek_step_secs.filter(|s| *s > 0))
            .unwrap_or(DEFAULT_SEEK_STEP_SECS),
        start_dir: args
            .dir
            .clone()
            .or(file.start_dir)
            .unwrap_or_else(|| PathBuf::from(".")),
    }
}

/// Load the file named by `--config` (if any) and merge.
pub fn settings_from_args(args: &Args) -> Result<Settings> {
    let file = match args.config.as_deref() {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    Ok(resolve(args, file))
}
