//! Thread-safe registry of enabled notification lists and pending listeners

use super::invoker::NotificationInvoker;
use super::{Notification, NotificationDescriptor, NotificationSupport, SharedListener};
use crate::entity::EntityValue;
use crate::error::{ConnectorError, ConnectorResult};
use crate::feature::FeatureOptions;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Enabled notification lists plus listeners waiting for one.
///
/// `connected` and `delayed` are locked independently and never nested, so
/// enabling a list (which drains `delayed`) cannot deadlock against a subscriber
/// walking `connected`.
pub struct NotificationRegistry {
    resource_name: String,
    support: Arc<dyn NotificationSupport>,
    invoker: Arc<dyn NotificationInvoker>,
    connected: RwLock<HashMap<String, Arc<NotificationDescriptor>>>,
    delayed: RwLock<HashMap<String, SharedListener>>,
}

impl NotificationRegistry {
    /// Empty registry dispatching through `invoker`
    pub fn new(
        resource_name: impl Into<String>,
        support: Arc<dyn NotificationSupport>,
        invoker: Arc<dyn NotificationInvoker>,
    ) -> Self {
        Self {
            resource_name: resource_name.into(),
            support,
            invoker,
            connected: RwLock::new(HashMap::new()),
            delayed: RwLock::new(HashMap::new()),
        }
    }

    /// Enable `category` under `list_id`.
    ///
    /// Idempotent per list id. On first creation the new list receives every
    /// pending delayed listener.
    pub fn enable(
        &self,
        list_id: &str,
        category: &str,
        options: FeatureOptions,
    ) -> ConnectorResult<Option<Arc<NotificationDescriptor>>> {
        if list_id.is_empty() {
            return Err(ConnectorError::InvalidInput("subscription list id must not be empty".into()));
        }

        let descriptor = {
            let mut connected = self.connected.write();
            if let Some(existing) = connected.get(list_id) {
                debug!(resource = %self.resource_name, list_id = %list_id, "Notification list already enabled");
                return Ok(Some(existing.clone()));
            }
            let Some(descriptor) = self.support.activate(category, &options)? else {
                debug!(resource = %self.resource_name, category = %category, "Notification category not available");
                return Ok(None);
            };
            let descriptor = Arc::new(descriptor.bind(list_id, &self.resource_name, self.invoker.clone()));
            connected.insert(list_id.to_string(), descriptor.clone());
            descriptor
        };
        info!(resource = %self.resource_name, list_id = %list_id, category = %category, "Notifications enabled");

        self.drain_delayed(&descriptor);
        Ok(Some(descriptor))
    }

    fn drain_delayed(&self, descriptor: &NotificationDescriptor) {
        let pending: Vec<(String, SharedListener)> = self.delayed.write().drain().collect();
        let mut retry = Vec::new();

        for (id, listener) in pending {
            match self.support.attach(&listener) {
                Ok(token) => {
                    if descriptor.add_listener(&id, listener.clone(), token.clone()) {
                        debug!(list_id = %descriptor.list_id(), listener = %id, "Delayed listener attached");
                    } else {
                        self.support.detach(&listener, &token);
                    }
                }
                Err(err) => {
                    warn!(list_id = %descriptor.list_id(), listener = %id, error = %err, "Delayed listener could not attach");
                    retry.push((id, listener));
                }
            }
        }

        if !retry.is_empty() {
            let mut delayed = self.delayed.write();
            for (id, listener) in retry {
                delayed.entry(id).or_insert(listener);
            }
        }
    }

    /// Disable `list_id`. Its listeners are cleared before it is removed.
    ///
    /// `Ok(false)` for an unknown list. A failing `deactivate` leaves the list enabled.
    pub fn disable(&self, list_id: &str) -> ConnectorResult<bool> {
        let mut connected = self.connected.write();
        let Some(descriptor) = connected.get(list_id).cloned() else {
            return Ok(false);
        };
        self.support.deactivate(&descriptor)?;
        descriptor.clear_listeners();
        connected.remove(list_id);
        info!(resource = %self.resource_name, list_id = %list_id, "Notifications disabled");
        Ok(true)
    }

    /// Subscribe a listener.
    ///
    /// With `delayed` the listener is parked until the next list is enabled;
    /// `false` means the id was already parked. Otherwise it is attached once and
    /// added to every enabled list; `false` means no list took it.
    pub fn subscribe(&self, listener_id: &str, listener: SharedListener, delayed: bool) -> ConnectorResult<bool> {
        if listener_id.is_empty() {
            return Ok(false);
        }

        if delayed {
            let mut parked = self.delayed.write();
            if parked.contains_key(listener_id) {
                return Ok(false);
            }
            parked.insert(listener_id.to_string(), listener);
            debug!(resource = %self.resource_name, listener = %listener_id, "Listener parked");
            return Ok(true);
        }

        let descriptors = self.snapshot();
        if descriptors.is_empty() {
            return Ok(false);
        }

        let token = self.support.attach(&listener)?;
        let mut accepted = false;
        for descriptor in &descriptors {
            accepted |= descriptor.add_listener(listener_id, listener.clone(), token.clone());
        }
        if accepted {
            debug!(resource = %self.resource_name, listener = %listener_id, lists = descriptors.len(), "Listener subscribed");
        } else {
            self.support.detach(&listener, &token);
        }
        Ok(accepted)
    }

    /// Remove a listener from every enabled list, or from the delayed set
    pub fn unsubscribe(&self, listener_id: &str) -> bool {
        let mut removed = None;
        for descriptor in self.snapshot() {
            if let Some(entry) = descriptor.remove_listener(listener_id) {
                removed.get_or_insert(entry);
            }
        }

        if let Some((listener, token)) = removed {
            self.support.detach(&listener, &token);
            debug!(resource = %self.resource_name, listener = %listener_id, "Listener unsubscribed");
            return true;
        }
        self.delayed.write().remove(listener_id).is_some()
    }

    /// Fire `notification` on `list_id` through the registry's invoker
    pub fn fire(&self, list_id: &str, notification: &Notification) -> bool {
        match self.get(list_id) {
            Some(descriptor) => {
                descriptor.fire(notification, self.invoker.as_ref());
                true
            }
            None => false,
        }
    }

    /// Build and fire the next notification of `list_id`
    pub fn emit(&self, list_id: &str, message: impl Into<String>, user_data: Option<EntityValue>) -> Option<Notification> {
        self.get(list_id).map(|descriptor| descriptor.emit(message, user_data))
    }

    /// Descriptor of `list_id`, if enabled
    pub fn get(&self, list_id: &str) -> Option<Arc<NotificationDescriptor>> {
        self.connected.read().get(list_id).cloned()
    }

    /// Snapshot of enabled list ids
    pub fn list(&self) -> BTreeSet<String> {
        self.connected.read().keys().cloned().collect()
    }

    /// Ids of listeners still waiting for a list
    pub fn delayed_listeners(&self) -> BTreeSet<String> {
        self.delayed.read().keys().cloned().collect()
    }

    /// Disable every list not in `keep`. Returns the removed ids.
    pub fn retain(&self, keep: &HashSet<String>) -> Vec<String> {
        let stale: Vec<String> = self.list().into_iter().filter(|id| !keep.contains(id)).collect();
        stale
            .into_iter()
            .filter(|id| match self.disable(id) {
                Ok(removed) => removed,
                Err(err) => {
                    warn!(resource = %self.resource_name, list_id = %id, error = %err, "Could not disable notification list");
                    false
                }
            })
            .collect()
    }

    /// Disable everything and drop parked listeners. Deactivation failures are logged only.
    pub fn clear(&self) -> usize {
        let drained: Vec<(String, Arc<NotificationDescriptor>)> = self.connected.write().drain().collect();
        for (list_id, descriptor) in &drained {
            if let Err(err) = self.support.deactivate(descriptor) {
                warn!(resource = %self.resource_name, list_id = %list_id, error = %err, "Deactivation failed during clear");
            }
            descriptor.clear_listeners();
        }
        self.delayed.write().clear();
        drained.len()
    }

    fn snapshot(&self) -> Vec<Arc<NotificationDescriptor>> {
        self.connected.read().values().cloned().collect()
    }
}

impl std::fmt::Debug for NotificationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationRegistry")
            .field("resource_name", &self.resource_name)
            .field("connected", &self.list())
            .field("delayed", &self.delayed_listeners())
            .finish()
    }
}
