use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(unix)]
use signal_hook::consts::TERM_SIGNALS;
#[cfg(unix)]
use signal_hook::flag;
#[cfg(unix)]
use signal_hook::low_level::unregister;
#[cfg(unix)]
use signal_hook::SigId;

/// Exit code used when a second termination signal cuts a drain short.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Termination-signal latch polled by the server loop. The first signal
/// requests a graceful stop; a second one while stopping exits at once.
pub struct ShutdownHooks {
    triggered: Arc<AtomicBool>,
    #[cfg(unix)]
    sig_ids: Vec<SigId>,
}

impl ShutdownHooks {
    pub fn install() -> io::Result<Self> {
        let triggered = Arc::new(AtomicBool::new(false));

        #[cfg(unix)]
        {
            let mut sig_ids = Vec::with_capacity(TERM_SIGNALS.len() * 2);
            for signal in TERM_SIGNALS {
                // Registered first so it only fires once the flag is already set.
                sig_ids.push(flag::register_conditional_shutdown(
                    *signal,
                    FORCED_EXIT_CODE,
                    Arc::clone(&triggered),
                )?);
                sig_ids.push(flag::register(*signal, Arc::clone(&triggered))?);
            }
            Ok(Self { triggered, sig_ids })
        }

        #[cfg(not(unix))]
        {
            Ok(Self { triggered })
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Requests shutdown as if a signal had arrived.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
    }
}

impl Drop for ShutdownHooks {
    fn drop(&mut self) {
        #[cfg(unix)]
        for id in self.sig_ids.drain(..) {
            unregister(id);
        }
    }
}
