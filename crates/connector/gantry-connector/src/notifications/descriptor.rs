//! Enabled notification list

use super::invoker::{NotificationInvoker, SequentialInvoker};
use super::{Notification, SharedListener, SubscriptionToken};
use crate::entity::EntityValue;
use crate::feature::{FeatureOptions, DESCRIPTION_OPTION};
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct ListenerEntry {
    id: String,
    listener: SharedListener,
    token: SubscriptionToken,
}

/// One notification category enabled under a subscription-list id.
///
/// Listener ids are unique within a descriptor. Options are append-only: a key,
/// once set, keeps its first value.
pub struct NotificationDescriptor {
    list_id: String,
    category: String,
    description: String,
    source: String,
    options: RwLock<FeatureOptions>,
    listeners: RwLock<Vec<ListenerEntry>>,
    sequence: AtomicU64,
    invoker: Option<Arc<dyn NotificationInvoker>>,
    extension: Option<Arc<dyn Any + Send + Sync>>,
}

impl NotificationDescriptor {
    /// Descriptor for `category`, as returned by a connector's `activate`
    pub fn new(category: impl Into<String>, options: FeatureOptions) -> Self {
        let description = options.get(DESCRIPTION_OPTION).unwrap_or_default().to_string();
        Self {
            list_id: String::new(),
            category: category.into(),
            description,
            source: String::new(),
            options: RwLock::new(options),
            listeners: RwLock::new(Vec::new()),
            sequence: AtomicU64::new(0),
            invoker: None,
            extension: None,
        }
    }

    /// Override the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach a connector-specific payload
    #[must_use]
    pub fn with_extension<T: Any + Send + Sync>(mut self, extension: T) -> Self {
        self.extension = Some(Arc::new(extension));
        self
    }

    pub(crate) fn bind(mut self, list_id: &str, source: &str, invoker: Arc<dyn NotificationInvoker>) -> Self {
        self.list_id = list_id.to_string();
        self.source = source.to_string();
        self.invoker = Some(invoker);
        self
    }

    /// Subscription-list id
    pub fn list_id(&self) -> &str {
        &self.list_id
    }

    /// Category name
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Resource name stamped at enable time
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Snapshot of the option bag
    pub fn options(&self) -> FeatureOptions {
        self.options.read().clone()
    }

    /// Add an option; returns `false` when the key is already set
    pub fn set_option(&self, key: impl Into<String>, value: impl Into<String>) -> bool {
        self.options.write().insert_if_absent(key, value)
    }

    /// Connector-specific payload
    pub fn extension<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.extension.as_deref().and_then(|ext| ext.downcast_ref::<T>())
    }

    /// Register a listener. Rejects empty and duplicate ids.
    pub fn add_listener(&self, id: &str, listener: SharedListener, token: SubscriptionToken) -> bool {
        if id.is_empty() {
            return false;
        }
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|entry| entry.id == id) {
            return false;
        }
        listeners.push(ListenerEntry {
            id: id.to_string(),
            listener,
            token,
        });
        true
    }

    /// Remove a listener, handing back what was registered
    pub fn remove_listener(&self, id: &str) -> Option<(SharedListener, SubscriptionToken)> {
        if id.is_empty() {
            return None;
        }
        let mut listeners = self.listeners.write();
        let position = listeners.iter().position(|entry| entry.id == id)?;
        let entry = listeners.remove(position);
        Some((entry.listener, entry.token))
    }

    /// Whether `id` is registered
    pub fn has_listener(&self, id: &str) -> bool {
        self.listeners.read().iter().any(|entry| entry.id == id)
    }

    /// Registered listener ids, in registration order
    pub fn listener_ids(&self) -> Vec<String> {
        self.listeners.read().iter().map(|entry| entry.id.clone()).collect()
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Drop every listener; returns how many there were
    pub fn clear_listeners(&self) -> usize {
        let mut listeners = self.listeners.write();
        let count = listeners.len();
        listeners.clear();
        count
    }

    /// Hand the current listeners and `notification` to `invoker`.
    ///
    /// The listener lock is held for the whole call, so the set a fire sees is
    /// stable until every listener has returned.
    pub fn fire(&self, notification: &Notification, invoker: &dyn NotificationInvoker) -> usize {
        let listeners = self.listeners.read();
        let snapshot: Vec<SharedListener> = listeners.iter().map(|entry| entry.listener.clone()).collect();
        invoker.invoke(&snapshot, notification);
        snapshot.len()
    }

    /// Build the next notification of this list and fire it through the bound invoker
    pub fn emit(&self, message: impl Into<String>, user_data: Option<EntityValue>) -> Notification {
        let notification = Notification {
            list_id: self.list_id.clone(),
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            user_data,
            ..Notification::new(self.category.clone(), self.source.clone(), message)
        };
        match &self.invoker {
            Some(invoker) => self.fire(&notification, invoker.as_ref()),
            None => self.fire(&notification, &SequentialInvoker),
        };
        notification
    }
}

impl fmt::Debug for NotificationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationDescriptor")
            .field("list_id", &self.list_id)
            .field("category", &self.category)
            .field("source", &self.source)
            .field("listeners", &self.listener_ids())
            .finish_non_exhaustive()
    }
}
