//! File chooser modal over the local filesystem.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ratatui::widgets::ListState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Entry {
    Parent(PathBuf),
    Dir { path: PathBuf, name: String },
    File { path: PathBuf, name: String },
}

impl Entry {
    pub(crate) fn label(&self) -> String {
        match self {
            Entry::Parent(_) => "..".to_string(),
            Entry::Dir { name, .. } => format!("{name}/"),
            Entry::File { name, .. } => name.clone(),
        }
    }
}

/// What Enter did.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Pick {
    /// Moved into another directory; the chooser stays open.
    Navigated,
    /// A file was chosen.
    File(PathBuf),
    Nothing,
}

pub(crate) struct FileChooser {
    pub(crate) dir: PathBuf,
    pub(crate) entries: Vec<Entry>,
    pub(crate) state: ListState,
}

impl FileChooser {
    /// Open on `dir`, made absolute.
    pub(crate) fn open(dir: &Path) -> Result<Self> {
        let dir = std::path::absolute(dir).with_context(|| format!("resolve {dir:?}"))?;
        let mut chooser = Self {
            dir: PathBuf::new(),
            entries: Vec::new(),
            state: ListState::default(),
        };
        chooser.enter(dir)?;
        Ok(chooser)
    }

    fn enter(&mut self, dir: PathBuf) -> Result<()> {
        self.entries = list_entries(&dir)?;
        self.dir = dir;
        self.state
            .select(if self.entries.is_empty() { None } else { Some(0) });
        Ok(())
    }

    pub(crate) fn select_next(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let i = self.state.selected().map_or(0, |i| (i + 1).min(self.entries.len() - 1));
        self.state.select(Some(i));
    }

    pub(crate) fn select_prev(&mut self) {
        let i = self.state.selected().map_or(0, |i| i.saturating_sub(1));
        self.state.select(Some(i));
    }

    /// Navigate to the parent directory, if any.
    pub(crate) fn go_parent(&mut self) -> Result<()> {
        match self.dir.parent() {
            Some(parent) => self.enter(parent.to_path_buf()),
            None => Ok(()),
        }
    }

    pub(crate) fn activate(&mut self) -> Result<Pick> {
        let Some(entry) = self.state.selected().and_then(|i| self.entries.get(i)).cloned() else {
            return Ok(Pick::Nothing);
        };
        match entry {
            Entry::Parent(path) | Entry::Dir { path, .. } => {
                self.enter(path)?;
                Ok(Pick::Navigated)
            }
            Entry::File { path, .. } => Ok(Pick::File(path)),
        }
    }
}

/// `..` first, then directories, then files; hidden entries skipped.
fn list_entries(dir: &Path) -> Result<Vec<Entry>> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for item in std::fs::read_dir(dir).with_context(|| format!("read dir {dir:?}"))? {
        let item = item.with_context(|| format!("read dir entry in {dir:?}"))?;
        let name = item.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let path = item.path();
        if path.is_dir() {
            dirs.push(Entry::Dir { path, name });
        } else {
            files.push(Entry::File { path, name });
        }
    }
    dirs.sort_by(|a, b| a.label().cmp(&b.label()));
    files.sort_by(|a, b| a.label().cmp(&b.label()));

    let mut entries = Vec::with_capacity(dirs.len() + files.len() + 1);
    if let Some(parent) = dir.parent() {
        entries.push(Entry::Parent(parent.to_path_buf()));
    }
    entries.extend(dirs);
    entries.extend(files);
    Ok(entries)
}
