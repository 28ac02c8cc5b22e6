//! Notification lists, listeners and dispatch.
//!
//! A connector activates a notification category under a subscription-list id;
//! listeners attach to the list, not to the category. Listeners may also be
//! registered *delayed*, before any list exists, and are attached to the first
//! list enabled afterwards.
//!
//! The registry holds a strong reference to every listener until it is
//! unsubscribed. Callers own that lifetime: a listener that is never
//! unsubscribed keeps receiving events for as long as the registry lives.

mod descriptor;
mod invoker;
mod notification;
mod registry;

pub use descriptor::NotificationDescriptor;
pub use invoker::{invoker_for, NotificationInvoker, ParallelInvoker, SequentialInvoker};
pub use notification::Notification;
pub use registry::NotificationRegistry;

use crate::error::ConnectorResult;
use crate::feature::FeatureOptions;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Receives notifications
pub trait NotificationListener: Send + Sync {
    /// Handle one notification. Must not add or remove listeners on the firing list.
    fn handle(&self, notification: &Notification);
}

impl<F> NotificationListener for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn handle(&self, notification: &Notification) {
        self(notification)
    }
}

/// Shared listener handle
pub type SharedListener = Arc<dyn NotificationListener>;

/// Opaque handle a connector returns from [`NotificationSupport::attach`] and
/// receives back in [`NotificationSupport::detach`]
#[derive(Clone, Default)]
pub struct SubscriptionToken(Option<Arc<dyn Any + Send + Sync>>);

impl SubscriptionToken {
    /// Token carrying connector state
    pub fn new<T: Any + Send + Sync>(state: T) -> Self {
        Self(Some(Arc::new(state)))
    }

    /// Token carrying nothing
    pub fn empty() -> Self {
        Self(None)
    }

    /// Connector state, if it has type `T`
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|state| state.downcast_ref::<T>())
    }

    /// Whether the token carries no state
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Debug for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SubscriptionToken")
            .field(&if self.is_empty() { "empty" } else { "state" })
            .finish()
    }
}

/// Notification half of the connector-module SPI.
///
/// Calls are synchronous: connectors fire notifications from their own threads
/// and activation is cheap bookkeeping on the connector side.
pub trait NotificationSupport: Send + Sync {
    /// Activate `category`. `Ok(None)` means the resource does not emit it.
    fn activate(&self, category: &str, options: &FeatureOptions) -> ConnectorResult<Option<NotificationDescriptor>>;

    /// Stop emitting for a list about to be disabled
    fn deactivate(&self, _descriptor: &NotificationDescriptor) -> ConnectorResult<()> {
        Ok(())
    }

    /// Prepare connector-side state for a new listener
    fn attach(&self, _listener: &SharedListener) -> ConnectorResult<SubscriptionToken> {
        Ok(SubscriptionToken::empty())
    }

    /// Drop connector-side state of a listener being unsubscribed
    fn detach(&self, _listener: &SharedListener, _token: &SubscriptionToken) {}
}
