//! Shared helpers for gantry-connector integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use gantry_connector::prelude::*;
use gantry_core::RuntimeSettings;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory resource exposing attributes, notification categories and a `reset` operation
#[derive(Default)]
pub struct MemoryConnector {
    pub values: Mutex<HashMap<String, Value>>,
    pub failing: HashSet<String>,
    pub slow: HashMap<String, Duration>,
    pub categories: HashSet<String>,
    pub resolves: AtomicUsize,
    pub attaches: AtomicUsize,
    pub detaches: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, name: &str, value: impl Into<Value>) -> Self {
        self.values.lock().insert(name.to_string(), value.into());
        self
    }

    pub fn with_failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Answer for `name` only after `delay`, whatever budget the call was given
    pub fn with_slow(mut self, name: &str, delay: Duration) -> Self {
        self.slow.insert(name.to_string(), delay);
        self
    }

    async fn stall(&self, name: &str) {
        if let Some(delay) = self.slow.get(name) {
            tokio::time::sleep(*delay).await;
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.categories.insert(category.to_string());
        self
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        self.values.lock().get(name).cloned()
    }
}

#[async_trait]
impl AttributeSupport for MemoryConnector {
    async fn resolve(&self, name: &str, options: &FeatureOptions) -> ConnectorResult<Option<AttributeDescriptor>> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        let known = self.values.lock().contains_key(name) || self.failing.contains(name);
        Ok(known.then(|| AttributeDescriptor::builder(name).options(options.clone()).class("memory").build()))
    }

    async fn fetch(&self, descriptor: &AttributeDescriptor, timeout: Duration) -> ConnectorResult<Option<Value>> {
        self.stall(descriptor.name()).await;
        if self.failing.contains(descriptor.name()) {
            return Err(ConnectorError::timeout(format!(
                "'{}' did not answer within {}ms",
                descriptor.name(),
                timeout.as_millis()
            )));
        }
        Ok(self.value(descriptor.name()))
    }

    async fn push(&self, descriptor: &AttributeDescriptor, _timeout: Duration, value: &EntityValue) -> ConnectorResult<()> {
        self.stall(descriptor.name()).await;
        if self.failing.contains(descriptor.name()) {
            return Err(ConnectorError::failure("resource rejected the write"));
        }
        match value.raw() {
            Some(raw) => {
                self.values.lock().insert(descriptor.name().to_string(), raw.clone());
                Ok(())
            }
            None => Err(ConnectorError::invalid_value("null write")),
        }
    }
}

impl NotificationSupport for MemoryConnector {
    fn activate(&self, category: &str, options: &FeatureOptions) -> ConnectorResult<Option<NotificationDescriptor>> {
        Ok(self
            .categories
            .contains(category)
            .then(|| NotificationDescriptor::new(category, options.clone())))
    }

    fn attach(&self, _listener: &SharedListener) -> ConnectorResult<SubscriptionToken> {
        Ok(SubscriptionToken::new(self.attaches.fetch_add(1, Ordering::SeqCst)))
    }

    fn detach(&self, _listener: &SharedListener, _token: &SubscriptionToken) {
        self.detaches.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl OperationSupport for MemoryConnector {
    async fn resolve(&self, name: &str, options: &FeatureOptions) -> ConnectorResult<Option<OperationDescriptor>> {
        Ok((name == "reset").then(|| {
            OperationDescriptor::new(name, options.clone())
                .with_impact(OperationImpact::Action)
                .with_return_type(ScalarType::Integer)
        }))
    }

    async fn invoke(
        &self,
        _descriptor: &OperationDescriptor,
        _arguments: &[EntityValue],
        _timeout: Duration,
    ) -> ConnectorResult<Option<EntityValue>> {
        let mut values = self.values.lock();
        let cleared = values.len() as i64;
        values.clear();
        let types = TypeProjectionRegistry::new("memory");
        Ok(Some(EntityValue::of(cleared, types.scalar(ScalarType::Integer))))
    }
}

/// Instance over `connector` with every registry enabled
pub fn memory_instance(resource: &str, connector: Arc<MemoryConnector>) -> ConnectorInstance {
    ConnectorInstance::builder(
        resource,
        "memory",
        ConnectionParameters::new(format!("memory://{resource}")),
        connector.clone(),
    )
    .notifications(connector.clone())
    .operations(connector)
    .build()
}

/// Like [`memory_instance`], configured from runtime settings
pub fn configured_instance(resource: &str, connector: Arc<MemoryConnector>, settings: &RuntimeSettings) -> ConnectorInstance {
    ConnectorInstance::builder(
        resource,
        "memory",
        ConnectionParameters::new(format!("memory://{resource}")),
        connector.clone(),
    )
    .notifications(connector.clone())
    .operations(connector)
    .settings(settings)
    .build()
}

/// Listener counting the notifications it receives
pub fn counting_listener() -> (SharedListener, Arc<AtomicUsize>) {
    let counter = Arc::new(AtomicUsize::new(0));
    let sink = counter.clone();
    let listener: SharedListener = Arc::new(move |_: &Notification| {
        sink.fetch_add(1, Ordering::SeqCst);
    });
    (listener, counter)
}
