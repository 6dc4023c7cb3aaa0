//! `SIGINT` handling (§6 exit code 130): a process-wide flag the running
//! `Vm` polls once per tick, set from a real signal handler on unix via
//! `signal_hook` — the same `signal_hook::low_level::register` the teacher's
//! `diagnostics.rs` uses for its own `SIGQUIT` dump hook, just listening for
//! a different signal and setting a flag instead of printing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INSTALL: Once = Once::new();

/// Installs the handler once per process. The CLI calls this at startup;
/// library embedders and tests that never call it simply never observe a
/// real signal (`requested()` stays false until something else sets it).
pub fn install() {
    INSTALL.call_once(|| {
        #[cfg(unix)]
        unsafe {
            let _ = signal_hook::low_level::register(signal_hook::consts::SIGINT, || {
                INTERRUPTED.store(true, Ordering::SeqCst);
            });
        }
    });
}

/// Whether a `SIGINT` has arrived since the process started (or since the
/// last `reset`).
pub fn requested() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

pub fn reset() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unrequested_and_reset_clears_it() {
        reset();
        assert!(!requested());
        INTERRUPTED.store(true, Ordering::SeqCst);
        assert!(requested());
        reset();
        assert!(!requested());
    }
}
