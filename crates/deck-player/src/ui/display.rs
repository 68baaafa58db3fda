use deck_core::{PlayPauseIcon, UiSink};

pub(crate) const NO_FILE_LABEL: &str = "No file has been selected";
pub(crate) const INITIAL_VOLUME_LABEL: &str = "Volume Control: 0%";

/// Widget text the session writes into and the renderer reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DisplayState {
    pub(crate) file_label: String,
    pub(crate) play_pause: PlayPauseIcon,
    pub(crate) volume_label: String,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            file_label: NO_FILE_LABEL.to_string(),
            play_pause: PlayPauseIcon::Play,
            volume_label: INITIAL_VOLUME_LABEL.to_string(),
        }
    }
}

impl DisplayState {
    /// Glyph for the play/pause control.
    pub(crate) fn play_pause_glyph(&self) -> &'static str {
        match self.play_pause {
            PlayPauseIcon::Play => "▶",
            PlayPauseIcon::Pause => "⏸",
        }
    }
}

impl UiSink for DisplayState {
    fn set_file_label(&mut self, text: &str) {
        self.file_label = text.to_string();
    }

    fn set_play_pause_icon(&mut self, icon: PlayPauseIcon) {
        self.play_pause = icon;
    }

    fn set_volume_label(&mut self, text: &str) {
        self.volume_label = text.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_placeholder_labels() {
        let d = DisplayState::default();
        assert_eq!(d.file_label, "No file has been selected");
        assert_eq!(d.volume_label, "Volume Control: 0%");
        assert_eq!(d.play_pause, PlayPauseIcon::Play);
    }

    #[test]
    fn sink_updates_fields() {
        let mut d = DisplayState::default();
        d.set_file_label("song.flac");
        d.set_play_pause_icon(PlayPauseIcon::Pause);
        d.set_volume_label("Volume: 70%");
        assert_eq!(d.file_label, "song.flac");
        assert_eq!(d.play_pause_glyph(), "⏸");
        assert_eq!(d.volume_label, "Volume: 70%");
    }
}
