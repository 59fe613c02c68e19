//! Rule file watcher for hot reload.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// A watcher that turns rule file changes into payload-free change signals.
///
/// The parent directory is watched so that editors which replace the file
/// by rename are still seen.
pub struct RuleFileWatcher {
    path: PathBuf,
    poll_interval: Duration,
    change_tx: mpsc::UnboundedSender<()>,
}

impl RuleFileWatcher {
    /// Create a new RuleFileWatcher.
    ///
    /// Returns the watcher and a receiver for change signals.
    pub fn new(path: &Path, poll_interval: Duration) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (change_tx, change_rx) = mpsc::unbounded_channel();

        (Self {
            path: path.to_path_buf(),
            poll_interval,
            change_tx,
        }, change_rx)
    }

    /// Another sender for the same signal channel (e.g. SIGHUP-driven reloads).
    pub fn sender(&self) -> mpsc::UnboundedSender<()> {
        self.change_tx.clone()
    }

    /// Start watching. Dropping the returned handle stops the watch.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.change_tx.clone();
        let file_name = self.path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    let relevant = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant && (event.kind.is_modify() || event.kind.is_create()) {
                        tracing::debug!(kind = ?event.kind, "Rule file change detected");
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            }
        }, Config::default().with_poll_interval(self.poll_interval))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Rule watcher started");
        Ok(watcher)
    }
}
