//! Graceful-shutdown signal handling, referenced as
//! `strim_common::shutdown::shutdown_signal()` by the teacher's own
//! `operator/src/strims/reconcile.rs`. Resolves on the first `SIGINT` or
//! `SIGTERM`, matching the original Go implementation's
//! `signals.SetupSignalHandler()` (`examples/original_source/main.go`),
//! which installs a handler for the first termination signal only.

use tokio::signal;

/// Resolves once the process receives `SIGINT` or `SIGTERM` (on Unix) or
/// Ctrl-C (elsewhere). Intended to be raced against server futures so that
/// a single signal triggers coordinated shutdown across every subsystem.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
