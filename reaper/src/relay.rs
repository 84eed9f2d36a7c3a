//! Termination signal relay with one-shot escalation.
//!
//! The first signal is forwarded as-is to every descendant. Any
//! later one sends SIGKILL to every descendant, repeated a few times to catch
//! processes forked mid-shutdown.
//!
//! Handlers only touch atomics and `sigaction`. Delivering to the tree needs
//! a process-table snapshot, so it happens in [`SignalRelay::dispatch`], which
//! the supervisor loop calls on every tick.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};

use nix::sys::signal::Signal;
use tracing::{info, warn};

use crate::classifier::TreeClassifier;
use crate::platform::Platform;

/// Passes over the tree once escalated.
pub const ESCALATION_PASSES: usize = 3;

/// Process-wide shutdown level. Only ever moves from `Normal` to `Escalated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShutdownState {
    Normal = 0,
    Escalated = 1,
}

impl ShutdownState {
    fn from_raw(raw: u8) -> Self {
        if raw == ShutdownState::Escalated as u8 {
            ShutdownState::Escalated
        } else {
            ShutdownState::Normal
        }
    }
}

/// What a received signal asks the relay to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayAction {
    /// One pass sending this signal to every descendant.
    Forward(Signal),
    /// [`ESCALATION_PASSES`] passes of SIGKILL.
    Kill,
}

pub struct SignalRelay {
    state: AtomicU8,
    pending_forward: AtomicI32,
    pending_kill: AtomicBool,
}

impl Default for SignalRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalRelay {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(ShutdownState::Normal as u8),
            pending_forward: AtomicI32::new(0),
            pending_kill: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ShutdownState {
        ShutdownState::from_raw(self.state.load(Ordering::SeqCst))
    }

    /// Record a received signal and return the action it maps to.
    ///
    /// Async-signal-safe: only atomic operations.
    pub fn on_signal(&self, signal: Signal) -> RelayAction {
        let previous = self
            .state
            .swap(ShutdownState::Escalated as u8, Ordering::SeqCst);

        let action = match ShutdownState::from_raw(previous) {
            ShutdownState::Normal => RelayAction::Forward(signal),
            ShutdownState::Escalated => RelayAction::Kill,
        };

        match action {
            RelayAction::Forward(signal) => {
                self.pending_forward.store(signal as i32, Ordering::SeqCst);
            }
            RelayAction::Kill => self.pending_kill.store(true, Ordering::SeqCst),
        }
        action
    }

    /// Whether signal work is waiting for [`dispatch`](Self::dispatch).
    #[cfg(test)]
    fn has_pending(&self) -> bool {
        self.pending_forward.load(Ordering::SeqCst) != 0 || self.pending_kill.load(Ordering::SeqCst)
    }

    /// Deliver any recorded signal work to the current tree. Returns the
    /// number of signals sent.
    pub fn dispatch<P, C>(&self, platform: &P, classifier: &C) -> usize
    where
        P: Platform + ?Sized,
        C: TreeClassifier + ?Sized,
    {
        let mut sent = 0;

        let forward = self.pending_forward.swap(0, Ordering::SeqCst);
        if forward != 0 {
            match Signal::try_from(forward) {
                Ok(signal) => {
                    info!(signal = %signal, "caught signal, passing it to descendants");
                    sent += deliver(platform, classifier, signal);
                }
                Err(e) => warn!(signal = forward, error = %e, "unknown pending signal"),
            }
        }

        if self.pending_kill.swap(false, Ordering::SeqCst) {
            info!("caught another signal, sending SIGKILL to descendants");
            for _ in 0..ESCALATION_PASSES {
                sent += deliver(platform, classifier, Signal::SIGKILL);
            }
        }

        sent
    }
}

fn deliver<P, C>(platform: &P, classifier: &C, signal: Signal) -> usize
where
    P: Platform + ?Sized,
    C: TreeClassifier + ?Sized,
{
    let mut sent = 0;
    for pid in classifier.children() {
        match platform.send_signal(pid, signal) {
            Ok(()) => sent += 1,
            Err(e) => warn!(pid = %pid, error = %e, "signal delivery failed"),
        }
    }
    sent
}

/// The relay wired to the process's real signal handlers.
static RELAY: SignalRelay = SignalRelay::new();

/// Install SIGINT/SIGTERM handlers feeding the process-wide relay.
pub fn install() -> &'static SignalRelay {
    set_handler(libc::SIGINT, handle_first_signal as *const () as libc::sighandler_t);
    set_handler(libc::SIGTERM, handle_first_signal as *const () as libc::sighandler_t);
    &RELAY
}

fn set_handler(sig: libc::c_int, handler: libc::sighandler_t) {
    // SAFETY: zeroed sigaction is valid; we fill sa_handler and sa_flags.
    let mut sa: libc::sigaction = unsafe { std::mem::zeroed() };
    sa.sa_sigaction = handler;
    sa.sa_flags = libc::SA_RESTART;
    // SAFETY: sa is properly initialized, sig is a valid signal number.
    unsafe {
        libc::sigaction(sig, &sa, std::ptr::null_mut());
    }
}

/// Re-arms both signals to the escalated handler before recording, so a
/// signal arriving while the first one is being handled takes the hard path.
extern "C" fn handle_first_signal(sig: libc::c_int) {
    set_handler(libc::SIGINT, handle_escalated_signal as *const () as libc::sighandler_t);
    set_handler(libc::SIGTERM, handle_escalated_signal as *const () as libc::sighandler_t);
    record(sig);
}

extern "C" fn handle_escalated_signal(sig: libc::c_int) {
    record(sig);
}

fn record(sig: libc::c_int) {
    if let Ok(signal) = Signal::try_from(sig) {
        RELAY.on_signal(signal);
    }
}

/// Pids signalled by a relay, in order. Test helper shared with the supervisor tests.
#[cfg(test)]
pub(crate) fn signalled(
    signals: &[(nix::unistd::Pid, Signal)],
    signal: Signal,
) -> Vec<nix::unistd::Pid> {
    signals
        .iter()
        .filter(|(_, s)| *s == signal)
        .map(|(pid, _)| *pid)
        .collect()
}

#[cfg(test)]
mod tests {
    use nix::unistd::Pid;

    use super::*;
    use crate::classifier::fake::FakeClassifier;
    use crate::platform::fake::FakePlatform;

    fn tree() -> Vec<Pid> {
        vec![Pid::from_raw(100), Pid::from_raw(101), Pid::from_raw(102)]
    }

    #[test]
    fn first_signal_forwards_and_escalates() {
        let relay = SignalRelay::new();
        assert_eq!(relay.state(), ShutdownState::Normal);

        let action = relay.on_signal(Signal::SIGTERM);
        assert_eq!(action, RelayAction::Forward(Signal::SIGTERM));
        assert_eq!(relay.state(), ShutdownState::Escalated);
    }

    #[test]
    fn later_signals_kill() {
        let relay = SignalRelay::new();
        relay.on_signal(Signal::SIGINT);
        assert_eq!(relay.on_signal(Signal::SIGINT), RelayAction::Kill);
        assert_eq!(relay.on_signal(Signal::SIGTERM), RelayAction::Kill);
        assert_eq!(relay.state(), ShutdownState::Escalated);
    }

    #[test]
    fn forceful_first_signal_is_forwarded_as_is() {
        let relay = SignalRelay::new();
        let platform = FakePlatform::new();
        let classifier = FakeClassifier::new([true], tree());

        assert_eq!(
            relay.on_signal(Signal::SIGKILL),
            RelayAction::Forward(Signal::SIGKILL)
        );
        assert_eq!(relay.dispatch(&platform, &classifier), tree().len());
    }

    #[test]
    fn dispatch_forwards_once_to_tree() {
        let relay = SignalRelay::new();
        let platform = FakePlatform::new();
        let classifier = FakeClassifier::new([true], tree());

        relay.on_signal(Signal::SIGTERM);
        assert!(relay.has_pending());
        assert_eq!(relay.dispatch(&platform, &classifier), 3);
        assert!(!relay.has_pending());

        let signals = platform.signals.borrow();
        assert_eq!(signalled(&signals, Signal::SIGTERM), tree());
        assert!(signalled(&signals, Signal::SIGKILL).is_empty());
    }

    #[test]
    fn dispatch_without_signal_sends_nothing() {
        let relay = SignalRelay::new();
        let platform = FakePlatform::new();
        let classifier = FakeClassifier::new([true], tree());

        assert_eq!(relay.dispatch(&platform, &classifier), 0);
        assert!(platform.signals.borrow().is_empty());
    }

    #[test]
    fn escalation_repeats_kill_passes() {
        let relay = SignalRelay::new();
        let platform = FakePlatform::new();
        let classifier = FakeClassifier::new([true], tree());

        relay.on_signal(Signal::SIGTERM);
        relay.dispatch(&platform, &classifier);
        relay.on_signal(Signal::SIGTERM);
        relay.on_signal(Signal::SIGINT);
        let sent = relay.dispatch(&platform, &classifier);

        assert_eq!(sent, ESCALATION_PASSES * tree().len());
        let signals = platform.signals.borrow();
        let killed = signalled(&signals, Signal::SIGKILL);
        assert_eq!(killed.len(), ESCALATION_PASSES * tree().len());
        assert!(tree().iter().all(|pid| killed.contains(pid)));
    }

    #[test]
    fn both_levels_pending_are_both_delivered() {
        // A second signal lands before the loop dispatched the first.
        let relay = SignalRelay::new();
        let platform = FakePlatform::new();
        let classifier = FakeClassifier::new([true], tree());

        relay.on_signal(Signal::SIGINT);
        relay.on_signal(Signal::SIGINT);
        relay.dispatch(&platform, &classifier);

        let signals = platform.signals.borrow();
        assert_eq!(signalled(&signals, Signal::SIGINT).len(), tree().len());
        assert_eq!(
            signalled(&signals, Signal::SIGKILL).len(),
            ESCALATION_PASSES * tree().len()
        );
    }

    #[test]
    fn state_never_returns_to_normal() {
        let relay = SignalRelay::new();
        let platform = FakePlatform::new();
        let classifier = FakeClassifier::new([true], Vec::new());

        relay.on_signal(Signal::SIGTERM);
        for _ in 0..5 {
            relay.dispatch(&platform, &classifier);
            assert_eq!(relay.state(), ShutdownState::Escalated);
            relay.on_signal(Signal::SIGINT);
        }
    }
}
