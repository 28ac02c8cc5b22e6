//! Listener dispatch strategies.
//!
//! The registry decides *which* listeners see a notification; an invoker decides
//! *how* they are called. Listener panics are contained here so a faulty
//! listener never unwinds into the connector thread that fired the event.

use super::{Notification, SharedListener};
use gantry_core::InvokerKind;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// Calls a snapshot of listeners with one notification
pub trait NotificationInvoker: Send + Sync {
    /// Deliver `notification` to every listener; returns once all calls are done
    fn invoke(&self, listeners: &[SharedListener], notification: &Notification);
}

/// Calls listeners one after another on the firing thread, in registration order
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialInvoker;

impl NotificationInvoker for SequentialInvoker {
    fn invoke(&self, listeners: &[SharedListener], notification: &Notification) {
        for listener in listeners {
            deliver(listener, notification);
        }
    }
}

/// Splits listeners across at most `parallelism` scoped worker threads
#[derive(Debug, Clone, Copy)]
pub struct ParallelInvoker {
    parallelism: NonZeroUsize,
}

impl ParallelInvoker {
    /// Invoker using up to `parallelism` threads; zero is treated as one
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: NonZeroUsize::new(parallelism).unwrap_or(NonZeroUsize::MIN),
        }
    }

    /// Maximum number of worker threads per fire
    pub fn parallelism(&self) -> usize {
        self.parallelism.get()
    }
}

impl NotificationInvoker for ParallelInvoker {
    fn invoke(&self, listeners: &[SharedListener], notification: &Notification) {
        if listeners.len() < 2 || self.parallelism.get() == 1 {
            SequentialInvoker.invoke(listeners, notification);
            return;
        }

        let chunk = listeners.len().div_ceil(self.parallelism.get());
        std::thread::scope(|scope| {
            for group in listeners.chunks(chunk) {
                scope.spawn(move || {
                    for listener in group {
                        deliver(listener, notification);
                    }
                });
            }
        });
    }
}

/// Invoker selected by runtime settings
pub fn invoker_for(kind: InvokerKind, parallelism: usize) -> Arc<dyn NotificationInvoker> {
    match kind {
        InvokerKind::Sequential => Arc::new(SequentialInvoker),
        InvokerKind::Parallel => Arc::new(ParallelInvoker::new(parallelism)),
    }
}

fn deliver(listener: &SharedListener, notification: &Notification) {
    if panic::catch_unwind(AssertUnwindSafe(|| listener.handle(notification))).is_err() {
        warn!(
            list_id = %notification.list_id,
            category = %notification.category,
            sequence = notification.sequence,
            "Notification listener panicked"
        );
    }
}
