use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between a caller and an extraction.
///
/// Extractors poll it between chapters and pages and return what they have
/// produced so far once it fires.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    /// Polls left before the token fires on its own
    budget: Option<Arc<AtomicUsize>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that answers "not cancelled" to the first `checks` polls and
    /// fires on the next one. Bounds how many chapters or pages a call reads.
    pub fn with_check_budget(checks: usize) -> Self {
        Self {
            cancelled: Arc::default(),
            budget: Some(Arc::new(AtomicUsize::new(checks))),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            return true;
        }
        if let Some(budget) = &self.budget {
            let spent = budget
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
                .is_err();
            if spent {
                self.cancel();
                return true;
            }
        }
        false
    }
}
