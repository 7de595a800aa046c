// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cooperative cancellation.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// A cloneable, cheaply-shareable token used to signal cancellation.
///
/// All clones share the same underlying state. The runner hands a clone to
/// the stream consumer and keeps one for the supervisor, so either side can
/// abort the other; the container loop watches the same token to decide
/// when to start the kill-grace countdown.
#[derive(Clone)]
pub struct CancellationToken {
    shared: Arc<Shared>,
}

struct Shared {
    flag: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                flag: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Signal cancellation. Idempotent; later calls are no-ops.
    pub fn cancel(&self) {
        if !self.shared.flag.swap(true, Ordering::Release) {
            self.shared.notify.notify_waiters();
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.flag.load(Ordering::Acquire)
    }

    /// Completes once the token is cancelled.
    ///
    /// Interest is registered before the flag is re-checked, so a `cancel`
    /// racing with this call can never be missed. Resolves immediately when
    /// the token is already cancelled.
    pub async fn cancelled(&self) {
        let mut waiter = pin!(self.shared.notify.notified());
        loop {
            waiter.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            waiter.as_mut().await;
            waiter.set(self.shared.notify.notified());
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
