/*!
 * Signals Module
 * Termination and child-exit notifications as async events
 *
 * Handlers only record that a signal arrived (tokio's signal driver); all
 * reactions run later on ordinary tasks.
 */

use std::future::pending;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::warn;

/// Signal that ended the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Interrupt,
    Terminate,
}

impl Shutdown {
    pub fn name(&self) -> &'static str {
        match self {
            Shutdown::Interrupt => "SIGINT",
            Shutdown::Terminate => "SIGTERM",
        }
    }
}

/// SIGINT and SIGTERM streams
///
/// Registration replaces the default (terminating) action, so build this
/// before creating anything that needs teardown. Signals arriving before
/// `recv` is first polled are kept by the streams.
pub struct ShutdownSignals {
    interrupt: Option<Signal>,
    terminate: Option<Signal>,
}

impl ShutdownSignals {
    /// Install both handlers now
    ///
    /// A signal that can not be registered is logged and never fires.
    pub fn register() -> Self {
        Self {
            interrupt: register(SignalKind::interrupt()),
            terminate: register(SignalKind::terminate()),
        }
    }

    /// Resolve on the next SIGINT or SIGTERM
    pub async fn recv(&mut self) -> Shutdown {
        tokio::select! {
            _ = next(&mut self.interrupt) => Shutdown::Interrupt,
            _ = next(&mut self.terminate) => Shutdown::Terminate,
        }
    }
}

/// SIGCHLD stream used to wake the reaper early
pub fn child_exits() -> Option<Signal> {
    register(SignalKind::child())
}

/// Wait for the next SIGCHLD, or forever when unavailable
pub async fn next_child_exit(stream: &mut Option<Signal>) {
    next(stream).await
}

fn register(kind: SignalKind) -> Option<Signal> {
    match signal(kind) {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!(signal = kind.as_raw_value(), error = %e, "Failed to register signal handler");
            None
        }
    }
}

async fn next(stream: &mut Option<Signal>) {
    if let Some(signal) = stream.as_mut() {
        if signal.recv().await.is_some() {
            return;
        }
        *stream = None;
    }
    pending::<()>().await
}
