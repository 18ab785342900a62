//! Stopping a sync run early.
//!
//! The first SIGINT, SIGTERM or SIGHUP cancels the run's token. The engine
//! checks it between recordings, so the file being written is finished and
//! its event id lands in the ledger before the run winds down. The ledger is
//! then persisted and the instance lock released as on a normal exit.
//!
//! A second signal exits on the spot. The ledger file keeps its contents from
//! the previous run, and a half-written `.part` file may be left beside the
//! recordings; the next run downloads those events again.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

/// Exit status after a second signal, as for an interrupted shell command.
const FORCE_EXIT_CODE: i32 = 130;

/// What a signal means, given how many arrived before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// Finish the current recording, then persist the ledger and stop.
    FinishRecording,
    /// Abandon the run without touching the ledger.
    Abandon,
}

impl Interrupt {
    fn after(previous_signals: u32) -> Self {
        if previous_signals == 0 {
            Interrupt::FinishRecording
        } else {
            Interrupt::Abandon
        }
    }
}

/// Listen for termination signals for the rest of the run. Returns the token
/// the sync engine watches.
pub(crate) fn install_signal_handler() -> anyhow::Result<CancellationToken> {
    let stop = CancellationToken::new();
    let received = Arc::new(AtomicU32::new(0));

    #[cfg(unix)]
    let (mut sigterm, mut sighup) = {
        use tokio::signal::unix::{signal, SignalKind};
        (
            signal(SignalKind::terminate()).context("Cannot listen for SIGTERM")?,
            signal(SignalKind::hangup()).context("Cannot listen for SIGHUP")?,
        )
    };

    let engine_stop = stop.clone();
    tokio::spawn(async move {
        loop {
            #[cfg(unix)]
            {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                    _ = sighup.recv() => {}
                }
            }

            #[cfg(not(unix))]
            {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("Cannot listen for Ctrl+C: {}", e);
                    return;
                }
            }

            match Interrupt::after(received.fetch_add(1, Ordering::SeqCst)) {
                Interrupt::FinishRecording => {
                    tracing::info!(
                        "Stopping after the current recording; downloaded events will be saved \
                         to the ledger. Interrupt again to quit immediately."
                    );
                    engine_stop.cancel();
                }
                Interrupt::Abandon => {
                    tracing::warn!("Quitting without updating the ledger");
                    std::process::exit(FORCE_EXIT_CODE);
                }
            }
        }
    });

    Ok(stop)
}
