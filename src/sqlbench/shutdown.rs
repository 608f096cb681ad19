//! Signal handling and graceful shutdown supervision.
//!
//! Benchmarks run for unbounded or very long durations. A bare kill leaves
//! partially-applied transactions behind, while an unbounded graceful wait
//! can hang forever if a workload ignores cancellation. The supervisor here
//! implements a two-tier policy: the first signal cancels the run-wide
//! token exactly once and starts a bounded grace timer; a second signal or
//! the timer expiring forces the process to exit with a non-zero status.
//!
//! ## Signals handled
//!
//! | Signal | Trigger | Action |
//! |--------|---------|--------|
//! | SIGINT | Ctrl+C | Graceful shutdown |
//! | SIGTERM | kill, Kubernetes, Docker | Graceful shutdown |
//! | SIGHUP | Terminal hangup | Graceful shutdown |
//! | SIGQUIT | Ctrl+\ | Graceful shutdown |
//!
//! All four begin the same graceful shutdown; repeating any of them
//! escalates.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tokio::sync::oneshot;
//! use sqlbench::sqlbench::shutdown::{
//!     spawn_signal_listener, ShutdownController, DEFAULT_GRACE_PERIOD,
//! };
//!
//! # async fn example() {
//! let controller = ShutdownController::new(DEFAULT_GRACE_PERIOD);
//! let (done_tx, done_rx) = oneshot::channel();
//!
//! let supervisor = tokio::spawn(
//!     controller.clone().supervise_and_exit(spawn_signal_listener(), done_rx),
//! );
//!
//! // ... run the workload with controller.token() ...
//! let _ = done_tx.send(());
//! let _ = supervisor.await;
//! # }
//! ```

use std::fmt;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

use log::{error, info};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// How long a cancelled run gets to stop on its own before the process is
/// forced to exit.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// The type of shutdown signal received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT - User interrupt (Ctrl+C)
    Interrupt,
    /// SIGTERM - Termination request (kill, Kubernetes, Docker)
    Terminate,
    /// SIGHUP - Terminal hangup
    Hangup,
    /// SIGQUIT - Quit (Ctrl+\)
    Quit,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "SIGINT (Ctrl+C)"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Hangup => write!(f, "SIGHUP"),
            ShutdownSignal::Quit => write!(f, "SIGQUIT"),
        }
    }
}

/// Spawn a background task forwarding every delivered termination signal
/// into a channel. Repeated signals stay individually observable, which is
/// what lets the supervisor escalate on the second one.
#[cfg(unix)]
pub fn spawn_signal_listener() -> mpsc::Receiver<ShutdownSignal> {
    use tokio::signal::unix::{SignalKind, signal};

    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("Failed to install SIGINT handler");
        let mut sighup = signal(SignalKind::hangup()).expect("Failed to install SIGHUP handler");
        let mut sigquit = signal(SignalKind::quit()).expect("Failed to install SIGQUIT handler");

        loop {
            let received = tokio::select! {
                _ = sigterm.recv() => ShutdownSignal::Terminate,
                _ = sigint.recv() => ShutdownSignal::Interrupt,
                _ = sighup.recv() => ShutdownSignal::Hangup,
                _ = sigquit.recv() => ShutdownSignal::Quit,
            };
            if tx.send(received).await.is_err() {
                break;
            }
        }
    });
    rx
}

/// Windows-compatible signal listener (only handles Ctrl+C).
#[cfg(not(unix))]
pub fn spawn_signal_listener() -> mpsc::Receiver<ShutdownSignal> {
    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
            if tx.send(ShutdownSignal::Interrupt).await.is_err() {
                break;
            }
        }
    });
    rx
}

/// Lifecycle of the shutdown supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// No termination signal seen yet
    Running,
    /// First signal received, run-wide token cancelled, grace timer armed
    Cancelling,
    /// Escalated: the process is about to terminate abnormally
    ForcedExit,
}

/// Why the supervisor escalated to a forced exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedReason {
    /// A second signal arrived while the run was already cancelling
    RepeatedSignal(ShutdownSignal),
    /// The grace period elapsed before the run stopped
    GraceExpired,
}

/// How supervision ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The run finished without any termination signal
    Completed,
    /// A signal arrived and the run stopped within the grace period
    Graceful(ShutdownSignal),
    /// Escalation: the process must terminate with a non-zero status
    Forced(ForcedReason),
}

impl ShutdownOutcome {
    pub fn is_forced(&self) -> bool {
        matches!(self, ShutdownOutcome::Forced(_))
    }
}

const STATE_RUNNING: u8 = 0;
const STATE_CANCELLING: u8 = 1;
const STATE_FORCED_EXIT: u8 = 2;

/// Owns the run-wide cancellation token and the shutdown state machine.
///
/// Cancellation is monotonic and broadcast: once [`cancel_once`] has run,
/// every clone of the token observes the cancelled state, and nothing ever
/// un-cancels it. Workloads must treat cancellation as cooperative-stop,
/// not as an error.
///
/// [`cancel_once`]: ShutdownController::cancel_once
#[derive(Clone)]
pub struct ShutdownController {
    cancel: CancellationToken,
    grace: Duration,
    state: Arc<AtomicU8>,
    cancelled_once: Arc<AtomicBool>,
}

impl ShutdownController {
    pub fn new(grace: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            grace,
            state: Arc::new(AtomicU8::new(STATE_RUNNING)),
            cancelled_once: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A clone of the run-wide cancellation token for handing to workloads.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> ShutdownState {
        match self.state.load(Ordering::SeqCst) {
            STATE_CANCELLING => ShutdownState::Cancelling,
            STATE_FORCED_EXIT => ShutdownState::ForcedExit,
            _ => ShutdownState::Running,
        }
    }

    /// Cancel the run-wide token. Returns `true` only for the call that
    /// actually performed the cancellation; any number of later calls are
    /// no-ops.
    pub fn cancel_once(&self) -> bool {
        if self.cancelled_once.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.state.store(STATE_CANCELLING, Ordering::SeqCst);
        self.cancel.cancel();
        true
    }

    /// Race the shutdown events to an outcome.
    ///
    /// Before any signal: completion wins and the run stays untouched. On
    /// the first signal the token is cancelled exactly once and three
    /// events race: a second signal and the grace timer both escalate to
    /// [`ShutdownOutcome::Forced`], while completion resolves to
    /// [`ShutdownOutcome::Graceful`].
    ///
    /// The method is pure with respect to the process: callers decide what
    /// a forced outcome means (the binary exits; tests assert).
    pub async fn supervise(
        &self,
        mut signals: mpsc::Receiver<ShutdownSignal>,
        mut completed: oneshot::Receiver<()>,
    ) -> ShutdownOutcome {
        let mut signals_open = true;

        let first = loop {
            tokio::select! {
                _ = &mut completed => return ShutdownOutcome::Completed,
                received = signals.recv(), if signals_open => match received {
                    Some(received) => break received,
                    // listener gone; only completion can end the run now
                    None => signals_open = false,
                },
            }
        };

        info!("got signal {first}, cancelling the run");
        self.cancel_once();

        let grace = tokio::time::sleep(self.grace);
        tokio::pin!(grace);

        loop {
            tokio::select! {
                _ = &mut completed => {
                    info!("run stopped within the grace period");
                    return ShutdownOutcome::Graceful(first);
                }
                _ = &mut grace => {
                    self.state.store(STATE_FORCED_EXIT, Ordering::SeqCst);
                    return ShutdownOutcome::Forced(ForcedReason::GraceExpired);
                }
                received = signals.recv(), if signals_open => match received {
                    Some(received) => {
                        self.state.store(STATE_FORCED_EXIT, Ordering::SeqCst);
                        return ShutdownOutcome::Forced(ForcedReason::RepeatedSignal(received));
                    }
                    None => signals_open = false,
                },
            }
        }
    }

    /// Run [`supervise`] and enforce the forced-exit policy: escalation
    /// terminates the process immediately with status 1, bypassing any
    /// further cleanup.
    ///
    /// [`supervise`]: ShutdownController::supervise
    pub async fn supervise_and_exit(
        self,
        signals: mpsc::Receiver<ShutdownSignal>,
        completed: oneshot::Receiver<()>,
    ) -> ShutdownOutcome {
        match self.supervise(signals, completed).await {
            ShutdownOutcome::Forced(ForcedReason::RepeatedSignal(signal)) => {
                error!("got signal {signal} again, forcing exit");
                process::exit(1);
            }
            ShutdownOutcome::Forced(ForcedReason::GraceExpired) => {
                error!(
                    "waited {:?} for the run to stop, forcing exit",
                    self.grace
                );
                process::exit(1);
            }
            outcome => outcome,
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_signal_display() {
        assert_eq!(format!("{}", ShutdownSignal::Interrupt), "SIGINT (Ctrl+C)");
        assert_eq!(format!("{}", ShutdownSignal::Terminate), "SIGTERM");
        assert_eq!(format!("{}", ShutdownSignal::Hangup), "SIGHUP");
        assert_eq!(format!("{}", ShutdownSignal::Quit), "SIGQUIT");
    }

    #[test]
    fn test_default_grace_period() {
        let controller = ShutdownController::default();
        assert_eq!(controller.grace, Duration::from_secs(10));
        assert_eq!(controller.state(), ShutdownState::Running);
    }

    #[test]
    fn test_cancel_once_is_exactly_once() {
        let controller = ShutdownController::default();
        let token = controller.token();
        assert!(!token.is_cancelled());

        assert!(controller.cancel_once());
        assert!(token.is_cancelled());
        assert_eq!(controller.state(), ShutdownState::Cancelling);

        // any number of repeats are no-ops
        assert!(!controller.cancel_once());
        assert!(!controller.cancel_once());
        assert_eq!(controller.state(), ShutdownState::Cancelling);
    }

    #[test]
    fn test_cancellation_is_broadcast() {
        let controller = ShutdownController::default();
        let before = controller.token();
        controller.cancel_once();
        let after = controller.token();
        assert!(before.is_cancelled());
        assert!(after.is_cancelled());
    }
}
