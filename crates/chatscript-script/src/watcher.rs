//! Hot reloading of script files
//!
//! Watches script files and directories and reports which `.rhai` files
//! changed, so the host can call [`ScriptEngine::reload`](crate::ScriptEngine::reload).

use anyhow::{Result, anyhow};
use notify::RecursiveMode;
use notify_debouncer_mini::{DebouncedEvent, Debouncer, new_debouncer};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, channel};
use std::time::Duration;

const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Something that happened to a watched script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A script file was written, created or removed
    Changed(PathBuf),
    /// The underlying watcher failed
    Error(String),
}

/// Watches script files for changes
pub struct ScriptWatcher {
    debouncer: Debouncer<notify::RecommendedWatcher>,
    receiver: Receiver<WatchEvent>,
    watched: Arc<Mutex<Vec<PathBuf>>>,
}

impl ScriptWatcher {
    /// Create a watcher that coalesces bursts of writes
    ///
    /// `debounce_ms` defaults to 100.
    pub fn new(debounce_ms: Option<u64>) -> Result<Self> {
        let (tx, rx) = channel();
        let watched: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
        let filter = Arc::clone(&watched);

        let debounce = Duration::from_millis(debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS));
        let debouncer = new_debouncer(
            debounce,
            move |result: Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    let watched = filter.lock();
                    for event in events {
                        if is_script_change(&watched, &event.path) {
                            let _ = tx.send(WatchEvent::Changed(event.path));
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::Error(format!("Watch error: {:?}", e)));
                }
            },
        )
        .map_err(|e| anyhow!("Failed to create file watcher: {:?}", e))?;

        Ok(Self {
            debouncer,
            receiver: rx,
            watched,
        })
    }

    /// Watch a script file, or every `.rhai` file in a directory
    pub fn watch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let canonical = path
            .canonicalize()
            .map_err(|e| anyhow!("Failed to watch path {}: {}", path.display(), e))?;

        self.debouncer
            .watcher()
            .watch(&canonical, RecursiveMode::NonRecursive)
            .map_err(|e| anyhow!("Failed to watch path {}: {}", canonical.display(), e))?;

        let mut watched = self.watched.lock();
        if !watched.contains(&canonical) {
            watched.push(canonical.clone());
        }
        tracing::info!("Watching: {}", canonical.display());
        Ok(())
    }

    /// Stop watching a path
    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        self.watched.lock().retain(|p| p != &canonical);
        self.debouncer
            .watcher()
            .unwatch(&canonical)
            .map_err(|e| anyhow!("Failed to unwatch path {}: {}", canonical.display(), e))?;
        Ok(())
    }

    /// Paths currently watched
    pub fn watched(&self) -> Vec<PathBuf> {
        self.watched.lock().clone()
    }

    /// Next event, without blocking
    pub fn try_recv(&self) -> Option<WatchEvent> {
        self.receiver.try_recv().ok()
    }

    /// Next event, waiting at most `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WatchEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// All pending events, with duplicate changes collapsed
    ///
    /// Errors are logged and dropped. Returns the distinct changed paths in
    /// sorted order.
    pub fn drain_changes(&self) -> Vec<PathBuf> {
        let mut changed = BTreeSet::new();
        for event in self.receiver.try_iter() {
            match event {
                WatchEvent::Changed(path) => {
                    changed.insert(path);
                }
                WatchEvent::Error(message) => tracing::warn!("{}", message),
            }
        }
        changed.into_iter().collect()
    }
}

/// Whether a changed path is a script under one of the watched paths
fn is_script_change(watched: &[PathBuf], path: &Path) -> bool {
    let is_rhai = path.extension().is_some_and(|e| e == "rhai");
    watched
        .iter()
        .any(|p| p == path || (is_rhai && path.parent() == Some(p.as_path())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_watcher_creation() {
        assert!(ScriptWatcher::new(None).is_ok());
    }

    #[test]
    fn test_watch_nonexistent() {
        let mut watcher = ScriptWatcher::new(None).unwrap();
        assert!(watcher.watch("/nonexistent/path/test.rhai").is_err());
        assert!(watcher.watched().is_empty());
    }

    #[test]
    fn test_watch_directory() {
        let dir = std::env::temp_dir().join("chatscript_watch_test");
        std::fs::create_dir_all(&dir).unwrap();

        let mut watcher = ScriptWatcher::new(Some(10)).unwrap();
        watcher.watch(&dir).unwrap();
        assert_eq!(watcher.watched(), vec![dir.canonicalize().unwrap()]);

        watcher.unwatch(&dir).unwrap();
        assert!(watcher.watched().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_script_filter() {
        let dir = PathBuf::from("/scripts");
        let watched = vec![dir.clone(), PathBuf::from("/other/main.txt")];

        assert!(is_script_change(&watched, &dir.join("chat.rhai")));
        assert!(!is_script_change(&watched, &dir.join("notes.md")));
        assert!(!is_script_change(&watched, &dir.join("nested/deep.rhai")));
        assert!(is_script_change(&watched, Path::new("/other/main.txt")));
    }
}
