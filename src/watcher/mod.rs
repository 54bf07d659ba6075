//! Watching the input file for `--watch`.
//!
//! Uses the notify crate for cross-platform file system events. A change is
//! reported once events stop arriving for the debounce interval, and is
//! classified by comparing the file length with the last one seen: a longer
//! file is read from where the previous read stopped, anything else is
//! reloaded from scratch.
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::perf;

/// What happened to the watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputChange {
    /// Data was appended; the file is now `len` bytes long.
    Grown { len: u64 },
    /// Truncated, rewritten or replaced.
    Replaced,
    /// The file is gone (e.g. mid-rename by an editor).
    Removed,
}

/// Watches one input file and emits debounced, classified changes.
pub struct InputWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    watch_root: PathBuf,
    target_path: PathBuf,
    target_name: Option<OsString>,
    debounce: Duration,
    pending_since: Option<Instant>,
    known_len: u64,
}

impl InputWatcher {
    /// Watch `path`, whose current length is taken as already read.
    ///
    /// # Errors
    /// Returns an error if the watcher cannot be created or the parent
    /// directory cannot be watched.
    pub fn new(path: impl AsRef<Path>, debounce: Duration) -> notify::Result<Self> {
        // Event paths arrive canonical.
        let target_path = path
            .as_ref()
            .canonicalize()
            .unwrap_or_else(|_| path.as_ref().to_path_buf());
        let target_name = target_path.file_name().map(std::ffi::OsStr::to_os_string);
        let watch_root = watch_root_for(&target_path);
        let known_len = file_len(&target_path).unwrap_or(0);

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&watch_root, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = %target_path.display(), known_len, "watching input");

        Ok(Self {
            _watcher: watcher,
            rx,
            watch_root,
            target_path,
            target_name,
            debounce,
            pending_since: None,
            known_len,
        })
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// File length as of the last reported change.
    pub const fn known_len(&self) -> u64 {
        self.known_len
    }

    /// Drain pending events; returns a change once the file has been quiet
    /// for the debounce interval.
    pub fn poll_change(&mut self) -> Option<InputChange> {
        let mut relevant = 0u32;
        let mut ignored = 0u32;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                Ok(ev) if self.is_relevant(&ev) => relevant += 1,
                Ok(ev) => {
                    ignored += 1;
                    perf::log_event(
                        "watcher.ignored",
                        format!("kind={:?} paths={:?}", ev.kind, ev.paths),
                    );
                }
                Err(err) => {
                    tracing::warn!(%err, "file watcher error");
                    perf::log_event("watcher.error", err.to_string());
                }
            }
        }
        if relevant + ignored > 0 {
            perf::log_event(
                "watcher.poll",
                format!(
                    "relevant={relevant} ignored={ignored} target={} root={}",
                    self.target_path.display(),
                    self.watch_root.display(),
                ),
            );
        }

        if relevant > 0 {
            self.pending_since = Some(Instant::now());
        }
        let pending_since = self.pending_since?;
        if pending_since.elapsed() < self.debounce {
            return None;
        }
        self.pending_since = None;
        let change = self.classify(file_len(&self.target_path));
        tracing::debug!(?change, "input changed");
        change
    }

    fn classify(&mut self, len: Option<u64>) -> Option<InputChange> {
        let Some(len) = len else {
            return Some(InputChange::Removed);
        };
        let previous = std::mem::replace(&mut self.known_len, len);
        match len.cmp(&previous) {
            std::cmp::Ordering::Greater => Some(InputChange::Grown { len }),
            // touched without new content
            std::cmp::Ordering::Equal if len == 0 => None,
            _ => Some(InputChange::Replaced),
        }
    }

    fn is_relevant(&self, event: &Event) -> bool {
        event.paths.iter().any(|path| {
            path == &self.watch_root
                || path == &self.target_path
                || self
                    .target_name
                    .as_ref()
                    .is_some_and(|name| path.file_name().is_some_and(|f| f == name))
        })
    }
}

fn file_len(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|meta| meta.len())
}

fn watch_root_for(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}
