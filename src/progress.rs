// Cooperative progress reporting and cancellation.
//
// Long running operations (index builds, subsampling) poll a listener at
// fixed points and stop with `Canceled` as soon as the listener asks them to.
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::info;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Canceled;

impl Display for Canceled {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "canceled")
    }
}

impl std::error::Error for Canceled {}

pub trait ProgressListener: Sync {
    /// Upper bound of the values passed to `set_progress`.
    fn set_maximum(&self, _max: u64) {}

    /// Record monotone progress and poll for cancellation.
    fn set_progress(&self, pos: u64) -> Result<(), Canceled>;

    fn check_for_cancel(&self) -> Result<(), Canceled>;
}

/******************************************************************************/
// NoProgress -- never reports, never cancels
/******************************************************************************/
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressListener for NoProgress {
    fn set_progress(&self, _pos: u64) -> Result<(), Canceled> {
        Ok(())
    }

    fn check_for_cancel(&self) -> Result<(), Canceled> {
        Ok(())
    }
}

/******************************************************************************/
// CancelFlag -- shared flag that any thread may raise
/******************************************************************************/
#[derive(Debug, Default)]
pub struct CancelFlag {
    canceled: AtomicBool,
    progress: AtomicU64,
    maximum: AtomicU64,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    pub fn progress(&self) -> u64 {
        self.progress.load(Ordering::Relaxed)
    }

    pub fn maximum(&self) -> u64 {
        self.maximum.load(Ordering::Relaxed)
    }
}

impl ProgressListener for CancelFlag {
    fn set_maximum(&self, max: u64) {
        self.maximum.store(max, Ordering::Relaxed);
    }

    fn set_progress(&self, pos: u64) -> Result<(), Canceled> {
        self.progress.fetch_max(pos, Ordering::Relaxed);
        self.check_for_cancel()
    }

    fn check_for_cancel(&self) -> Result<(), Canceled> {
        if self.is_canceled() {
            Err(Canceled)
        } else {
            Ok(())
        }
    }
}

/******************************************************************************/
// LogProgress -- logs every 10% step, never cancels
/******************************************************************************/
#[derive(Debug)]
pub struct LogProgress {
    task: String,
    maximum: AtomicU64,
    last_decile: AtomicU64,
}

impl LogProgress {
    pub fn new(task: &str) -> Self {
        Self {
            task: task.to_string(),
            maximum: AtomicU64::new(0),
            last_decile: AtomicU64::new(0),
        }
    }
}

impl ProgressListener for LogProgress {
    fn set_maximum(&self, max: u64) {
        self.maximum.store(max, Ordering::Relaxed);
        self.last_decile.store(0, Ordering::Relaxed);
    }

    fn set_progress(&self, pos: u64) -> Result<(), Canceled> {
        let max = self.maximum.load(Ordering::Relaxed);
        if max > 0 {
            let decile = (pos.min(max) * 10) / max;
            let prev = self.last_decile.fetch_max(decile, Ordering::Relaxed);
            if decile > prev {
                info!("{}: {}%", self.task, decile * 10);
            }
        }
        Ok(())
    }

    fn check_for_cancel(&self) -> Result<(), Canceled> {
        Ok(())
    }
}
