//! `deck-player`: a small terminal audio player.
//!
//! Opens one local file at a time and offers play/pause, restart, relative seek and
//! volume control. Playback runs through the `audio-player` pipeline.

mod cli;
mod config;
mod logging;
mod ui;

use anyhow::Result;
use audio_player::LocalPipelineFactory;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Args::parse();

    if args.list_devices {
        let host = cpal::default_host();
        audio_player::device::list_devices(&host)?;
        return Ok(());
    }

    let log_rx = logging::init()?;
    let settings = config::settings_from_args(&args)?;
    tracing::info!(
        device = settings.device.as_deref().unwrap_or("default"),
        seek_step_secs = settings.seek_step_secs,
        start_dir = %settings.start_dir.display(),
        "deck-player starting"
    );

    let factory = LocalPipelineFactory::new(settings.playback, settings.device);
    ui::run_tui(
        factory,
        settings.start_dir,
        settings.seek_step_secs,
        args.path,
        log_rx,
    )
}
