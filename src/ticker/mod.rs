//! Background thread that periodically runs the task scheduler's wake
//! check.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};

pub const MIN_INTERVAL_MS: u64 = 10;
pub const MAX_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, PartialEq, Eq)]
pub enum TickerError {
    InvalidInterval { provided_ms: u64 },
    AlreadyRunning,
    JoinFailed,
}

impl fmt::Display for TickerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInterval { provided_ms } => write!(
                f,
                "ticker interval must be between {MIN_INTERVAL_MS}ms and {MAX_INTERVAL_MS}ms, got {provided_ms}ms"
            ),
            Self::AlreadyRunning => write!(f, "ticker is already running"),
            Self::JoinFailed => write!(f, "ticker worker thread join failed"),
        }
    }
}

impl std::error::Error for TickerError {}

pub struct Ticker {
    pub started_at: DateTime<Utc>,
    interval_ms: u64,
    on_tick: Option<Box<dyn FnMut() + Send>>,
    ticks: Arc<AtomicU64>,
    stop_signal: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn new(
        interval_ms: u64,
        on_tick: impl FnMut() + Send + 'static,
    ) -> Result<Self, TickerError> {
        if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&interval_ms) {
            return Err(TickerError::InvalidInterval {
                provided_ms: interval_ms,
            });
        }

        Ok(Self {
            started_at: Utc::now(),
            interval_ms,
            on_tick: Some(Box::new(on_tick)),
            ticks: Arc::new(AtomicU64::new(0)),
            stop_signal: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }

    pub fn start(&mut self) -> Result<(), TickerError> {
        let Some(mut on_tick) = self.on_tick.take() else {
            return Err(TickerError::AlreadyRunning);
        };

        self.started_at = Utc::now();
        let stop_signal = Arc::clone(&self.stop_signal);
        let ticks = Arc::clone(&self.ticks);
        let interval = Duration::from_millis(self.interval_ms);

        self.worker = Some(thread::spawn(move || {
            while !stop_signal.load(Ordering::SeqCst) {
                on_tick();
                ticks.fetch_add(1, Ordering::SeqCst);
                thread::sleep(interval);
            }
        }));

        Ok(())
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn stop(&mut self) -> Result<(), TickerError> {
        self.stop_signal.store(true, Ordering::SeqCst);

        if let Some(handle) = self.worker.take() {
            return handle.join().map_err(|_| TickerError::JoinFailed);
        }

        Ok(())
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
