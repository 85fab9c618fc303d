use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The cancellation signal shared by every worker and delivery task. Once
/// cancelled it stays cancelled; every task checks it at each channel
/// interaction and returns promptly after it trips.
#[derive(Clone, Debug, Default)]
pub struct Signal(Arc<AtomicBool>);

impl Signal {
    /// Create a new, uncancelled signal
    pub fn new() -> Self {
        Signal::default()
    }

    /// Trip the signal. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the signal has been tripped
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
