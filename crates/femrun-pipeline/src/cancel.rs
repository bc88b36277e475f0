//! Cancellation token shared between the machine and the process supervisor.
//!
//! Anything that can be interrupted registers a termination handler while it
//! blocks. `cancel()` flips the flag and runs every registered handler once;
//! a handler registered after cancellation runs immediately.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

type Handler = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    handlers: Mutex<Vec<(u64, Handler)>>,
}

#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Requests cancellation. Only the first call runs the handlers.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let handlers = std::mem::take(&mut *self.inner.handlers.lock());
        for (_, handler) in handlers {
            handler();
        }
    }

    /// Registers `handler` until the returned guard is dropped.
    pub fn register(&self, handler: impl Fn() + Send + Sync + 'static) -> Registration {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        if self.is_cancelled() {
            handler();
        } else {
            self.inner.handlers.lock().push((id, Box::new(handler)));
            // cancel() may have drained the list between the check and the push
            if self.is_cancelled() {
                let late = {
                    let mut handlers = self.inner.handlers.lock();
                    handlers
                        .iter()
                        .position(|(h, _)| *h == id)
                        .map(|pos| handlers.remove(pos))
                };
                if let Some((_, handler)) = late {
                    handler();
                }
            }
        }
        Registration {
            token: self.clone(),
            id,
        }
    }

    pub fn registered_count(&self) -> usize {
        self.inner.handlers.lock().len()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("handlers", &self.registered_count())
            .finish()
    }
}

/// Unregisters its handler on drop.
#[must_use = "dropping the registration unregisters the handler immediately"]
pub struct Registration {
    token: CancellationToken,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.token
            .inner
            .handlers
            .lock()
            .retain(|(id, _)| *id != self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn cancel_runs_registered_handlers_once() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _registration = token.register(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(token.registered_count(), 1);

        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_registration_is_not_called() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registration = token.register(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(registration);
        assert_eq!(token.registered_count(), 0);

        token.cancel();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn registering_after_cancel_runs_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _registration = token.register(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(token.registered_count(), 0);
    }

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
    }
}
