//! Signal handling for a sync run.
//!
//! The first SIGINT, SIGTERM or SIGHUP cancels the returned token; the sync
//! loop stops before the next member and skips the download phase. A second
//! signal exits immediately.

use tokio_util::sync::CancellationToken;

/// Exit status when a repeated signal forces the process down.
const FORCED_EXIT_CODE: i32 = 130;

#[cfg(unix)]
struct Signals {
    term: tokio::signal::unix::Signal,
    hup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            term: signal(SignalKind::terminate())?,
            hup: signal(SignalKind::hangup())?,
        })
    }

    /// Wait for the next shutdown signal and return its name.
    async fn next(&mut self) -> std::io::Result<&'static str> {
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|()| "SIGINT"),
            _ = self.term.recv() => Ok("SIGTERM"),
            _ = self.hup.recv() => Ok("SIGHUP"),
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn register() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn next(&mut self) -> std::io::Result<&'static str> {
        tokio::signal::ctrl_c().await.map(|()| "Ctrl+C")
    }
}

pub(crate) fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();

    tokio::spawn(async move {
        let mut signals = match Signals::register() {
            Ok(signals) => signals,
            Err(e) => {
                tracing::warn!(error = %e, "Signal handlers unavailable, graceful shutdown disabled");
                return;
            }
        };

        let mut received = 0u32;
        loop {
            let name = match signals.next().await {
                Ok(name) => name,
                Err(e) => {
                    tracing::warn!(error = %e, "Stopped listening for signals");
                    return;
                }
            };
            received += 1;
            if received == 1 {
                tracing::info!(
                    signal = name,
                    "Stopping after the current member; signal again to exit now"
                );
                cancel.cancel();
            } else {
                tracing::warn!(signal = name, "Exiting without waiting");
                std::process::exit(FORCED_EXIT_CODE);
            }
        }
    });

    token
}
