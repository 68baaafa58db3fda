//! Display-side capability the controller pushes state into.

/// Icon shown on the play/pause control.
///
/// The icon names the action the control performs next: `Play` while paused,
/// `Pause` while playing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayPauseIcon {
    Play,
    Pause,
}

/// Widget updates driven by the controller.
pub trait UiSink {
    fn set_file_label(&mut self, text: &str);
    fn set_play_pause_icon(&mut self, icon: PlayPauseIcon);
    fn set_volume_label(&mut self, text: &str);
}

/// Label text for a volume value in percent.
pub fn volume_label(percent: f64) -> String {
    format!("Volume: {percent:.0}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_label_rounds_to_whole_percent() {
        assert_eq!(volume_label(70.0), "Volume: 70%");
        assert_eq!(volume_label(0.0), "Volume: 0%");
        assert_eq!(volume_label(33.4), "Volume: 33%");
        assert_eq!(volume_label(100.0), "Volume: 100%");
    }
}
