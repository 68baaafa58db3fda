use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use deck_core::{DEFAULT_VOLUME_PERCENT, PipelineFactory, PlaybackSession};
use ratatui::{Terminal, backend::CrosstermBackend};

use super::chooser::{FileChooser, Pick};
use super::display::DisplayState;
use super::render;

const LOG_CAP: usize = 500;

/// Whether the loop keeps going after a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

/// Launch the TUI and drive it until the user quits.
pub(crate) fn run_tui<F: PipelineFactory>(
    factory: F,
    start_dir: PathBuf,
    seek_step_secs: u32,
    initial: Option<PathBuf>,
    log_rx: Receiver<String>,
) -> Result<()> {
    let mut app = App::new(factory, start_dir, seek_step_secs, log_rx);
    if let Some(path) = initial {
        app.open_path(&path);
    }

    let mut term = init_terminal()?;
    let result = ui_loop(&mut term, &mut app);
    restore_terminal(&mut term)?;

    app.session.shutdown();
    result
}

/// UI state around the playback session.
pub(crate) struct App<F: PipelineFactory> {
    pub(crate) session: PlaybackSession<F, DisplayState>,
    pub(crate) chooser: Option<FileChooser>,
    pub(crate) start_dir: PathBuf,
    pub(crate) seek_step_secs: u32,
    /// Volume slider position, `0..=100`.
    pub(crate) volume: u8,
    pub(crate) status: String,

    pub(crate) logs_open: bool,
    pub(crate) logs: VecDeque<String>,
    pub(crate) logs_scroll: usize,
    log_rx: Receiver<String>,
}

impl<F: PipelineFactory> App<F> {
    pub(crate) fn new(
        factory: F,
        start_dir: PathBuf,
        seek_step_secs: u32,
        log_rx: Receiver<String>,
    ) -> Self {
        let mut session = PlaybackSession::new(factory, DisplayState::default());
        session.initial_volume_display();
        Self {
            session,
            chooser: None,
            start_dir,
            seek_step_secs,
            volume: DEFAULT_VOLUME_PERCENT as u8,
            status: "Press o to open a file".to_string(),
            logs_open: false,
            logs: VecDeque::new(),
            logs_scroll: 0,
            log_rx,
        }
    }

    pub(crate) fn display(&self) -> &DisplayState {
        self.session.sink()
    }

    pub(crate) fn open_path(&mut self, path: &Path) {
        match self.session.open_file(path) {
            Ok(()) => {
                self.status = format!("Opened {}", self.display().file_label);
            }
            Err(e) => {
                tracing::warn!("open failed: {e:#}");
                self.status = format!("Open failed: {e:#}");
            }
        }
    }

    fn open_chooser(&mut self) {
        let dir = self
            .chooser
            .as_ref()
            .map(|c| c.dir.clone())
            .unwrap_or_else(|| self.start_dir.clone());
        match FileChooser::open(&dir) {
            Ok(chooser) => self.chooser = Some(chooser),
            Err(e) => self.status = format!("Cannot browse {}: {e:#}", dir.display()),
        }
    }

    fn activate_chooser(&mut self) {
        let Some(chooser) = self.chooser.as_mut() else {
            return;
        };
        match chooser.activate() {
            Ok(Pick::File(path)) => {
                self.start_dir = chooser.dir.clone();
                self.chooser = None;
                self.open_path(&path);
            }
            Ok(Pick::Navigated) | Ok(Pick::Nothing) => {}
            Err(e) => self.status = format!("Browse failed: {e:#}"),
        }
    }

    fn nudge_volume(&mut self, delta: i16) {
        let next = (i16::from(self.volume) + delta).clamp(0, 100) as u8;
        self.volume = next;
        self.session.set_volume(f64::from(next));
    }

    fn seek(&mut self, forward: bool) {
        let step = i64::from(self.seek_step_secs);
        self.session.seek_relative(if forward { step } else { -step });
    }

    fn toggle_logs(&mut self) {
        self.logs_open = !self.logs_open;
        if !self.logs_open {
            self.logs_scroll = 0;
        }
    }

    fn scroll_logs_up(&mut self) {
        let max = self.logs.len().saturating_sub(1);
        self.logs_scroll = (self.logs_scroll + 1).min(max);
    }

    fn scroll_logs_down(&mut self) {
        self.logs_scroll = self.logs_scroll.saturating_sub(1);
    }

    fn push_log_line(&mut self, line: String) {
        if self.logs.len() >= LOG_CAP {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
    }

    pub(crate) fn drain_logs(&mut self) {
        while let Ok(line) = self.log_rx.try_recv() {
            self.push_log_line(line);
        }
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) -> Flow {
        if key.kind != KeyEventKind::Press {
            return Flow::Continue;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Flow::Quit;
        }

        if self.logs_open {
            match key.code {
                KeyCode::Char('q') => return Flow::Quit,
                KeyCode::Esc | KeyCode::Char('l') => self.toggle_logs(),
                KeyCode::Up => self.scroll_logs_up(),
                KeyCode::Down => self.scroll_logs_down(),
                _ => {}
            }
            return Flow::Continue;
        }

        if let Some(chooser) = self.chooser.as_mut() {
            match key.code {
                KeyCode::Esc => self.chooser = None,
                KeyCode::Up => chooser.select_prev(),
                KeyCode::Down => chooser.select_next(),
                KeyCode::Left | KeyCode::Backspace => {
                    if let Err(e) = chooser.go_parent() {
                        self.status = format!("Browse failed: {e:#}");
                    }
                }
                KeyCode::Enter => self.activate_chooser(),
                _ => {}
            }
            return Flow::Continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
            KeyCode::Char('o') => self.open_chooser(),
            KeyCode::Char(' ') => self.session.toggle_play_pause(),
            KeyCode::Char('r') => self.session.restart(),
            KeyCode::Left => self.seek(false),
            KeyCode::Right => self.seek(true),
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => self.nudge_volume(1),
            KeyCode::Char('-') | KeyCode::Down => self.nudge_volume(-1),
            KeyCode::Char('l') => self.toggle_logs(),
            _ => {}
        }
        Flow::Continue
    }
}

fn ui_loop<F: PipelineFactory>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<F>,
) -> Result<()> {
    let tick = Duration::from_millis(33);
    let mut last_tick = Instant::now();

    loop {
        app.drain_logs();
        terminal.draw(|f| render::draw(f, app))?;

        let timeout = tick.saturating_sub(last_tick.elapsed());
        if event::poll(timeout).context("poll terminal events")? {
            if let CEvent::Key(k) = event::read().context("read terminal event")? {
                if app.handle_key(k) == Flow::Quit {
                    return Ok(());
                }
            }
        }

        if last_tick.elapsed() >= tick {
            last_tick = Instant::now();
        }
    }
}

fn init_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("create terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use crossbeam_channel::unbounded;
    use deck_core::{MediaPipeline, PipelineState, PlayPauseIcon, SeekFlags};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        opened: Vec<String>,
        states: Vec<PipelineState>,
        volumes: Vec<f64>,
        seeks: Vec<Duration>,
    }

    struct StubPipeline {
        log: Rc<RefCell<Log>>,
    }

    impl MediaPipeline for StubPipeline {
        fn set_state(&mut self, state: PipelineState) -> Result<()> {
            self.log.borrow_mut().states.push(state);
            Ok(())
        }

        fn set_volume(&mut self, fraction: f64) {
            self.log.borrow_mut().volumes.push(fraction);
        }

        fn seek_absolute(&mut self, position: Duration, _flags: SeekFlags) -> Result<()> {
            self.log.borrow_mut().seeks.push(position);
            Ok(())
        }

        fn query_position(&self) -> Option<Duration> {
            Some(Duration::from_secs(30))
        }

        fn query_duration(&self) -> Option<Duration> {
            Some(Duration::from_secs(100))
        }
    }

    struct StubFactory {
        log: Rc<RefCell<Log>>,
        fail: bool,
    }

    impl PipelineFactory for StubFactory {
        type Pipeline = StubPipeline;

        fn open(&mut self, uri: &str) -> Result<StubPipeline> {
            if self.fail {
                return Err(anyhow!("cannot decode"));
            }
            self.log.borrow_mut().opened.push(uri.to_string());
            Ok(StubPipeline {
                log: self.log.clone(),
            })
        }
    }

    fn app_with(fail: bool) -> (App<StubFactory>, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let (_tx, rx) = unbounded();
        let factory = StubFactory {
            log: log.clone(),
            fail,
        };
        (App::new(factory, std::env::temp_dir(), 10, rx), log)
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn starts_at_default_volume() {
        let (app, _) = app_with(false);
        assert_eq!(app.volume, 50);
        assert_eq!(app.display().volume_label, "Volume: 50%");
        assert_eq!(app.display().file_label, "No file has been selected");
    }

    #[test]
    fn opening_a_path_starts_playback() {
        let (mut app, log) = app_with(false);
        app.open_path(Path::new("/music/song.flac"));
        assert_eq!(log.borrow().opened, ["file:///music/song.flac"]);
        assert_eq!(log.borrow().states, [PipelineState::Playing]);
        assert_eq!(log.borrow().volumes, [0.5]);
        assert_eq!(app.display().file_label, "song.flac");
        assert_eq!(app.display().play_pause, PlayPauseIcon::Pause);
    }

    #[test]
    fn failed_open_lands_in_status_line() {
        let (mut app, _) = app_with(true);
        app.open_path(Path::new("/music/broken.flac"));
        assert!(app.status.starts_with("Open failed"), "{}", app.status);
        assert!(!app.session.has_pipeline());
    }

    #[test]
    fn space_toggles_play_pause() {
        let (mut app, log) = app_with(false);
        app.open_path(Path::new("/music/song.flac"));
        app.handle_key(press(KeyCode::Char(' ')));
        assert_eq!(app.display().play_pause, PlayPauseIcon::Play);
        app.handle_key(press(KeyCode::Char(' ')));
        assert_eq!(app.display().play_pause, PlayPauseIcon::Pause);
        assert_eq!(
            log.borrow().states,
            [
                PipelineState::Playing,
                PipelineState::Paused,
                PipelineState::Playing
            ]
        );
    }

    #[test]
    fn arrows_seek_by_step_and_r_restarts() {
        let (mut app, log) = app_with(false);
        app.open_path(Path::new("/music/song.flac"));
        app.handle_key(press(KeyCode::Right));
        app.handle_key(press(KeyCode::Left));
        app.handle_key(press(KeyCode::Char('r')));
        assert_eq!(
            log.borrow().seeks,
            [
                Duration::from_secs(40),
                Duration::from_secs(20),
                Duration::ZERO
            ]
        );
    }

    #[test]
    fn volume_keys_move_slider_within_bounds() {
        let (mut app, log) = app_with(false);
        app.handle_key(press(KeyCode::Char('+')));
        assert_eq!(app.volume, 51);
        assert_eq!(app.display().volume_label, "Volume: 51%");

        app.volume = 100;
        app.handle_key(press(KeyCode::Up));
        assert_eq!(app.volume, 100);

        app.volume = 0;
        app.handle_key(press(KeyCode::Char('-')));
        assert_eq!(app.volume, 0);
        assert_eq!(app.display().volume_label, "Volume: 0%");
        assert!(log.borrow().volumes.is_empty());
    }

    #[test]
    fn quit_keys() {
        let (mut app, _) = app_with(false);
        assert_eq!(app.handle_key(press(KeyCode::Char('q'))), Flow::Quit);
        assert_eq!(app.handle_key(press(KeyCode::Esc)), Flow::Quit);
        assert_eq!(
            app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Flow::Quit
        );
    }

    #[test]
    fn key_releases_are_ignored() {
        let (mut app, _) = app_with(false);
        let release =
            KeyEvent::new_with_kind(KeyCode::Char('q'), KeyModifiers::NONE, KeyEventKind::Release);
        assert_eq!(app.handle_key(release), Flow::Continue);
    }

    #[test]
    fn escape_closes_chooser_without_opening() {
        let (mut app, log) = app_with(false);
        app.handle_key(press(KeyCode::Char('o')));
        assert!(app.chooser.is_some());
        assert_eq!(app.handle_key(press(KeyCode::Esc)), Flow::Continue);
        assert!(app.chooser.is_none());
        assert!(log.borrow().opened.is_empty());
    }

    #[test]
    fn chooser_enter_on_file_opens_it() {
        let dir = std::env::temp_dir().join(format!("deck-app-pick-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("track.wav"), b"").unwrap();

        let (mut app, log) = app_with(false);
        app.start_dir = dir.clone();
        app.handle_key(press(KeyCode::Char('o')));
        app.handle_key(press(KeyCode::Down));
        app.handle_key(press(KeyCode::Enter));

        assert!(app.chooser.is_none());
        assert_eq!(log.borrow().opened.len(), 1);
        assert!(log.borrow().opened[0].ends_with("/track.wav"));
        assert_eq!(app.display().file_label, "track.wav");
    }

    #[test]
    fn log_panel_collects_and_caps_lines() {
        let log = Rc::new(RefCell::new(Log::default()));
        let (tx, rx) = unbounded();
        let mut app = App::new(
            StubFactory { log, fail: false },
            std::env::temp_dir(),
            10,
            rx,
        );
        for i in 0..(LOG_CAP + 5) {
            tx.send(format!("line {i}")).unwrap();
        }
        app.drain_logs();
        assert_eq!(app.logs.len(), LOG_CAP);
        assert_eq!(app.logs.front().map(String::as_str), Some("line 5"));

        app.handle_key(press(KeyCode::Char('l')));
        assert!(app.logs_open);
        app.handle_key(press(KeyCode::Up));
        assert_eq!(app.logs_scroll, 1);
        app.handle_key(press(KeyCode::Esc));
        assert!(!app.logs_open);
        assert_eq!(app.logs_scroll, 0);
    }
}
