//! Ratatui front end.
//!
//! Keys:
//! - o: open the file chooser (↑/↓ move, Enter open/enter dir, ←/Backspace parent, Esc cancel)
//! - Space: play/pause
//! - ←/→: seek back/forward by the seek step
//! - r: restart from the beginning
//! - +/= or ↑, - or ↓: volume
//! - l: logs
//! - q, Esc or Ctrl-C: quit

mod app;
mod chooser;
mod display;
mod render;

pub(crate) use app::run_tui;
