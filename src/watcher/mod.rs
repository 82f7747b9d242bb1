//! File watching for live re-import.
//!
//! Uses notify crate for cross-platform file system events. A changed file
//! is pushed into the session through `set_markdown`, exactly as a host
//! editor would push new text.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::session::Session;

/// Quiet period tracking: a burst of events becomes one sync once the
/// window passes without another event.
#[derive(Debug, Clone, Copy)]
pub struct Debounce {
    window: Duration,
    last_event: Option<Instant>,
}

impl Debounce {
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            last_event: None,
        }
    }

    pub fn record(&mut self, at: Instant) {
        self.last_event = Some(at);
    }

    /// True once per burst, when `now` is past the quiet window.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.last_event {
            Some(at) if now.duration_since(at) >= self.window => {
                self.last_event = None;
                true
            }
            _ => false,
        }
    }
}

/// Watches the directory holding one markdown document and syncs the
/// document into a session after each debounced burst of changes.
pub struct DocumentWatcher {
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
    document: PathBuf,
    debounce: Debounce,
}

impl DocumentWatcher {
    /// # Errors
    /// The platform watcher cannot be created or the directory cannot be watched.
    pub fn new(path: &Path, window: Duration) -> notify::Result<Self> {
        // Event paths from the OS are absolute and canonical.
        let document = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let (tx, events) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&parent_dir(&document), RecursiveMode::NonRecursive)?;
        Ok(Self {
            _watcher: watcher,
            events,
            document,
            debounce: Debounce::new(window),
        })
    }

    pub fn document(&self) -> &Path {
        &self.document
    }

    /// Drain pending events. Returns true when a burst touching the
    /// document has settled.
    pub fn changed(&mut self) -> bool {
        while let Ok(event) = self.events.try_recv() {
            match event {
                Ok(event) if touches(&self.document, &event) => self.debounce.record(Instant::now()),
                Ok(event) => tracing::trace!(kind = ?event.kind, "unrelated fs event"),
                Err(err) => tracing::warn!(error = %err, "watch error"),
            }
        }
        self.debounce.fire(Instant::now())
    }

    /// Sync the document into `session` if it changed. Returns whether a
    /// sync ran.
    ///
    /// # Errors
    /// As [`sync_from_disk`].
    pub fn poll(&mut self, session: &Session) -> Result<bool> {
        if !self.changed() {
            return Ok(false);
        }
        sync_from_disk(session, &self.document)?;
        tracing::debug!(
            file = %self.document.display(),
            error = session.error().is_some(),
            "synced from disk"
        );
        Ok(true)
    }
}

/// Editors often save by writing a sibling and renaming it, so an event on
/// the directory itself counts too.
fn touches(document: &Path, event: &Event) -> bool {
    let name = document.file_name();
    let dir = parent_dir(document);
    event.paths.iter().any(|path| {
        path == document || *path == dir || (name.is_some() && path.file_name() == name)
    })
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Re-read `path` and hand its text to the session. Unchanged text is a
/// no-op inside the session.
///
/// # Errors
/// Unreadable files and fatal session errors.
pub fn sync_from_disk(session: &Session, path: &Path) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    session.set_markdown(&text)?;
    Ok(())
}

/// Block, re-importing `path` into `session` on every debounced change and
/// calling `on_sync` afterwards. Returns when `on_sync` returns false.
///
/// # Errors
/// Watch setup failures and anything [`sync_from_disk`] reports.
pub fn watch_document(
    session: &Session,
    path: &Path,
    debounce: Duration,
    poll: Duration,
    mut on_sync: impl FnMut(&Session) -> bool,
) -> Result<()> {
    let mut watcher = DocumentWatcher::new(path, debounce)
        .with_context(|| format!("Failed to watch {}", path.display()))?;
    tracing::debug!(file = %watcher.document().display(), "watching");
    loop {
        if watcher.poll(session)? && !on_sync(session) {
            return Ok(());
        }
        std::thread::sleep(poll);
    }
}
