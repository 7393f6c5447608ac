use crossbeam_channel::Sender;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

/// Watches one phrase file and forwards its change events to a channel.
/// notify runs the watch on its own background thread.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    path: Option<PathBuf>,
}

impl FileWatcher {
    /// Create a new file watcher that sends events to the provided channel
    pub fn new(tx: Sender<notify::Result<Event>>) -> notify::Result<Self> {
        let watcher = notify::recommended_watcher(move |res| {
            // the receiver is gone once the REPL exits
            let _ = tx.send(res);
        })?;

        Ok(Self {
            watcher,
            path: None,
        })
    }

    /// Watch `path`, replacing any previously watched file.
    pub fn watch<P: AsRef<Path>>(&mut self, path: P) -> notify::Result<()> {
        self.unwatch()?;
        self.watcher
            .watch(path.as_ref(), RecursiveMode::NonRecursive)?;
        self.path = Some(path.as_ref().to_path_buf());
        Ok(())
    }

    /// Stop watching. Returns the path that was watched.
    pub fn unwatch(&mut self) -> notify::Result<Option<PathBuf>> {
        match self.path.take() {
            Some(path) => {
                self.watcher.unwatch(&path)?;
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Whether `event` means a file's contents may have changed.
pub fn is_content_change(event: &Event) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
}

/// The playable text of a phrase file: `#` starts a comment, lines are
/// joined with spaces.
pub fn phrase_text(contents: &str) -> String {
    contents
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
