//! OS signal handling.
//!
//! # Responsibilities
//! - SIGTERM/SIGINT → trigger graceful shutdown
//! - SIGHUP → force a rule reload, not shutdown

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::lifecycle::shutdown::Shutdown;

/// Listen for process signals until shutdown.
#[cfg(unix)]
pub async fn handle_signals(
    shutdown: Arc<Shutdown>,
    reload_tx: mpsc::UnboundedSender<()>,
) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut stop = shutdown.subscribe();

    loop {
        tokio::select! {
            _ = hangup.recv() => {
                tracing::info!("SIGHUP received, reloading rules");
                let _ = reload_tx.send(());
            }
            _ = terminate.recv() => {
                tracing::info!("SIGTERM received");
                shutdown.trigger();
                break;
            }
            _ = interrupt.recv() => {
                tracing::info!("SIGINT received");
                shutdown.trigger();
                break;
            }
            _ = stop.recv() => break,
        }
    }
    Ok(())
}

/// Listen for Ctrl-C until shutdown.
#[cfg(not(unix))]
pub async fn handle_signals(
    shutdown: Arc<Shutdown>,
    _reload_tx: mpsc::UnboundedSender<()>,
) -> std::io::Result<()> {
    let mut stop = shutdown.subscribe();
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("Ctrl-C received");
            shutdown.trigger();
        }
        _ = stop.recv() => {}
    }
    Ok(())
}
