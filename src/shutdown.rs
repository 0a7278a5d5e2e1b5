//! Shared cancellation signal for the controller's background loops.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{self, Either, Shared};
use parking_lot::Mutex;

use crate::runtime;

/// A cloneable, runtime-agnostic cancellation signal.
///
/// Every clone observes the same signal. Once [`Shutdown::cancel`] has been
/// called, [`Shutdown::cancelled`] resolves immediately for every clone,
/// including clones made afterwards.
#[derive(Clone)]
pub struct Shutdown {
    fired: Arc<AtomicBool>,
    trigger: Arc<Mutex<Option<oneshot::Sender<()>>>>,
    signal: Shared<oneshot::Receiver<()>>,
}

impl std::fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shutdown")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Shutdown {
            fired: Arc::new(AtomicBool::new(false)),
            trigger: Arc::new(Mutex::new(Some(tx))),
            signal: rx.shared(),
        }
    }

    /// Fire the signal. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.fired.store(true, Ordering::SeqCst);
        // Dropping the sender resolves every clone of the receiver.
        self.trigger.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Resolves once [`Shutdown::cancel`] has been called.
    pub fn cancelled(&self) -> impl Future<Output = ()> + Send + Unpin + 'static {
        self.signal.clone().map(|_| ())
    }

    /// Sleep for `duration` unless cancelled first. Returns `false` if the
    /// signal fired.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let tick = runtime::sleep(duration);
        futures::pin_mut!(tick);
        matches!(future::select(tick, self.cancelled()).await, Either::Left(_))
    }
}
