//! Hot-reload pipeline.
//!
//! # States
//! ```text
//! Uninitialized → Watching      initial snapshot loaded (or empty default kept)
//! Watching      → Reloading     change signal received
//! Reloading     → Watching      snapshot installed or rejected
//! any           → Stopped       shutdown signal or change channel closed
//! ```
//!
//! # Design Decisions
//! - Signals carry no payload; every reload fetches the latest bytes
//! - Signals queued while a reload runs are drained before the next fetch
//! - A failed fetch or parse keeps the installed snapshot

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::observability::metrics;
use crate::rules::error::RuleError;
use crate::rules::parser::{self, ParseWarning};
use crate::rules::source::RuleSource;
use crate::rules::store::SharedRuleStore;

/// Reload pipeline state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    Uninitialized = 0,
    Watching = 1,
    Reloading = 2,
    Stopped = 3,
}

impl From<u8> for ReloadState {
    fn from(val: u8) -> Self {
        match val {
            1 => ReloadState::Watching,
            2 => ReloadState::Reloading,
            3 => ReloadState::Stopped,
            _ => ReloadState::Uninitialized,
        }
    }
}

/// Summary of one successful install.
#[derive(Debug, Clone)]
pub struct Installed {
    pub generation: u64,
    pub rules: usize,
    pub warnings: Vec<ParseWarning>,
}

/// Fetches, parses and installs rule snapshots.
#[derive(Debug)]
pub struct Reloader {
    source: Arc<dyn RuleSource>,
    store: SharedRuleStore,
    state: AtomicU8,
}

impl Reloader {
    pub fn new(source: Arc<dyn RuleSource>, store: SharedRuleStore) -> Self {
        Self {
            source,
            store,
            state: AtomicU8::new(ReloadState::Uninitialized as u8),
        }
    }

    pub fn state(&self) -> ReloadState {
        ReloadState::from(self.state.load(Ordering::Acquire))
    }

    pub fn store(&self) -> &SharedRuleStore {
        &self.store
    }

    fn set_state(&self, state: ReloadState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Load the initial snapshot synchronously.
    ///
    /// On failure the store keeps whatever it already holds (the empty set
    /// for a fresh store) and the pipeline still moves to `Watching`.
    pub fn start(&self) -> Result<Installed, RuleError> {
        let result = self.reload();
        if result.is_err() {
            tracing::warn!(
                rules = self.store.current().len(),
                "No initial rule snapshot, routing with current rules"
            );
        }
        self.set_state(ReloadState::Watching);
        result
    }

    /// Fetch the latest bytes and install them.
    pub fn reload(&self) -> Result<Installed, RuleError> {
        let raw = match self.source.fetch() {
            Ok(raw) => raw,
            Err(e) => {
                metrics::record_reload("source_error");
                tracing::error!(error = %e, "Failed to fetch rule snapshot, keeping current rules");
                return Err(e.into());
            }
        };
        self.apply(&raw)
    }

    /// Parse `raw` and install it. The store is untouched on error.
    pub fn apply(&self, raw: &[u8]) -> Result<Installed, RuleError> {
        let parsed = match parser::parse(raw) {
            Ok(p) => p,
            Err(e) => {
                metrics::record_reload("rejected");
                tracing::error!(error = %e, "Rejected rule snapshot, keeping current rules");
                return Err(e);
            }
        };

        for warning in &parsed.warnings {
            tracing::warn!(
                line = warning.line,
                key = %warning.key,
                "Rule entry: {}",
                warning.message
            );
        }

        let rules = parsed.rule_set.len();
        let switches = parsed.rule_set.switches().len();
        let generation = self.store.install(parsed.rule_set);

        metrics::record_reload("installed");
        metrics::set_rule_count(rules);
        tracing::info!(
            generation,
            rules,
            switches,
            warnings = parsed.warnings.len(),
            ignored = parsed.ignored.len(),
            "Installed rule snapshot"
        );

        Ok(Installed {
            generation,
            rules,
            warnings: parsed.warnings,
        })
    }

    /// React to change signals until shutdown or until the signal channel closes.
    pub async fn run(
        self: Arc<Self>,
        mut changes: mpsc::UnboundedReceiver<()>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        if self.state() == ReloadState::Uninitialized {
            self.set_state(ReloadState::Watching);
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Rule reloader shutting down");
                    break;
                }
                signal = changes.recv() => {
                    if signal.is_none() {
                        tracing::info!("Rule change channel closed");
                        break;
                    }

                    let mut coalesced = 0usize;
                    while changes.try_recv().is_ok() {
                        coalesced += 1;
                    }

                    self.set_state(ReloadState::Reloading);
                    tracing::debug!(coalesced, "Rule change detected, reloading");

                    let this = self.clone();
                    match tokio::task::spawn_blocking(move || this.reload()).await {
                        Ok(Ok(_)) => {}
                        // Already logged where it failed.
                        Ok(Err(e)) => tracing::debug!(error = %e, "Rule reload skipped"),
                        Err(e) => {
                            tracing::error!(error = %e, "Rule reload task panicked");
                        }
                    }
                    self.set_state(ReloadState::Watching);
                }
            }
        }

        self.set_state(ReloadState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::error::SourceError;
    use crate::rules::model::RuleKind;
    use crate::rules::store::RuleStore;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct MemorySource {
        content: Mutex<Option<Vec<u8>>>,
        fetches: AtomicUsize,
    }

    impl MemorySource {
        fn set(&self, content: &str) {
            *self.content.lock().unwrap() = Some(content.as_bytes().to_vec());
        }

        fn set_raw(&self, content: Vec<u8>) {
            *self.content.lock().unwrap() = Some(content);
        }
    }

    impl RuleSource for MemorySource {
        fn fetch(&self) -> Result<Vec<u8>, SourceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.content
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| SourceError::Other("no content".into()))
        }
    }

    fn reloader(source: Arc<MemorySource>) -> Arc<Reloader> {
        Arc::new(Reloader::new(source, Arc::new(RuleStore::default())))
    }

    #[test]
    fn test_start_without_content_keeps_empty_set() {
        let source = Arc::new(MemorySource::default());
        let reloader = reloader(source);

        assert_eq!(reloader.state(), ReloadState::Uninitialized);
        assert!(reloader.start().is_err());
        assert_eq!(reloader.state(), ReloadState::Watching);
        assert!(reloader.store().current().is_empty());
    }

    #[test]
    fn test_parse_failure_keeps_previous_snapshot() {
        let source = Arc::new(MemorySource::default());
        source.set("gray.v1=auth:10.0.0.1 <= user:1");
        let reloader = reloader(source.clone());
        reloader.start().unwrap();

        source.set_raw(vec![0xff, 0xfe, 0xfd]);
        assert!(matches!(reloader.reload(), Err(RuleError::StructurallyInvalid(_))));

        let current = reloader.store().current();
        assert!(current.get(RuleKind::Gray, "v1").is_some());
        assert_eq!(reloader.store().generation(), 1);
    }

    #[tokio::test]
    async fn test_rapid_signals_coalesce_into_one_reload() {
        let source = Arc::new(MemorySource::default());
        source.set("gray.v1=auth:10.0.0.1 <= user:1");
        let reloader = reloader(source.clone());
        reloader.start().unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        source.set("gray.v2=auth:10.0.0.2 <= user:2");
        source.set("gray.v3=auth:10.0.0.3 <= user:3");
        for _ in 0..3 {
            tx.send(()).unwrap();
        }
        drop(tx);

        reloader.clone().run(rx, shutdown_rx).await;
        drop(shutdown_tx);

        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(reloader.store().generation(), 2);
        let current = reloader.store().current();
        assert_eq!(current.len(), 1);
        assert!(current.get(RuleKind::Gray, "v3").is_some());
        assert_eq!(reloader.state(), ReloadState::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_loop() {
        let source = Arc::new(MemorySource::default());
        let reloader = reloader(source);
        let (_tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(reloader.clone().run(rx, shutdown_rx));
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(reloader.state(), ReloadState::Stopped);
    }
}
