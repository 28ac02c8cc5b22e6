//! Shared helpers for gantry-runtime integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use gantry_connector::prelude::*;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Connector resolving every feature whose name does not start with `missing`
#[derive(Default)]
pub struct ScriptedConnector;

fn known(name: &str) -> bool {
    !name.starts_with("missing")
}

#[async_trait]
impl AttributeSupport for ScriptedConnector {
    async fn resolve(&self, name: &str, options: &FeatureOptions) -> ConnectorResult<Option<AttributeDescriptor>> {
        Ok(known(name).then(|| AttributeDescriptor::builder(name).options(options.clone()).build()))
    }

    async fn fetch(&self, _descriptor: &AttributeDescriptor, _timeout: Duration) -> ConnectorResult<Option<Value>> {
        Ok(Some(Value::Integer(1)))
    }

    async fn push(&self, _descriptor: &AttributeDescriptor, _timeout: Duration, _value: &EntityValue) -> ConnectorResult<()> {
        Ok(())
    }
}

impl NotificationSupport for ScriptedConnector {
    fn activate(&self, category: &str, options: &FeatureOptions) -> ConnectorResult<Option<NotificationDescriptor>> {
        Ok(known(category).then(|| NotificationDescriptor::new(category, options.clone())))
    }
}

#[async_trait]
impl OperationSupport for ScriptedConnector {
    async fn resolve(&self, name: &str, options: &FeatureOptions) -> ConnectorResult<Option<OperationDescriptor>> {
        Ok(known(name).then(|| OperationDescriptor::new(name, options.clone())))
    }

    async fn invoke(
        &self,
        _descriptor: &OperationDescriptor,
        _arguments: &[EntityValue],
        _timeout: Duration,
    ) -> ConnectorResult<Option<EntityValue>> {
        Ok(None)
    }
}

/// Build an instance with every registry over a [`ScriptedConnector`]
pub fn scripted_instance(
    resource: &str,
    connector_type: &str,
    parameters: ConnectionParameters,
    settings: &RuntimeSettings,
) -> ConnectorInstance {
    let connector = Arc::new(ScriptedConnector);
    ConnectorInstance::builder(resource, connector_type, parameters, connector.clone())
        .notifications(connector.clone())
        .operations(connector)
        .settings(settings)
        .build()
}

/// How [`ScriptedFactory::update`] answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    InPlace,
    Recreate,
    Fail,
}

/// Factory counting its lifecycle calls
pub struct ScriptedFactory {
    connector_type: String,
    pub mode: Mutex<UpdateMode>,
    pub failing_creates: Mutex<HashSet<String>>,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
    pub releases: AtomicUsize,
}

impl ScriptedFactory {
    pub fn new(connector_type: &str, mode: UpdateMode) -> Arc<Self> {
        Arc::new(Self {
            connector_type: connector_type.to_string(),
            mode: Mutex::new(mode),
            failing_creates: Mutex::new(HashSet::new()),
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        })
    }

    pub fn fail_create(&self, resource: &str) {
        self.failing_creates.lock().insert(resource.to_string());
    }

    pub fn set_mode(&self, mode: UpdateMode) {
        *self.mode.lock() = mode;
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.creates.load(Ordering::SeqCst),
            self.updates.load(Ordering::SeqCst),
            self.releases.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl ConnectorFactory for ScriptedFactory {
    fn connector_type(&self) -> &str {
        &self.connector_type
    }

    async fn create(
        &self,
        resource_name: &str,
        parameters: ConnectionParameters,
        settings: &RuntimeSettings,
    ) -> ConnectorResult<ConnectorInstance> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.failing_creates.lock().contains(resource_name) {
            return Err(ConnectorError::failure(format!("cannot reach {}", parameters.connection_string)));
        }
        Ok(scripted_instance(resource_name, &self.connector_type, parameters, settings))
    }

    async fn update(
        &self,
        instance: Arc<ConnectorInstance>,
        parameters: ConnectionParameters,
    ) -> ConnectorResult<UpdateOutcome> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mode = *self.mode.lock();
        match mode {
            UpdateMode::InPlace => {
                instance.update_parameters(parameters)?;
                Ok(UpdateOutcome::Updated(instance))
            }
            UpdateMode::Recreate => Ok(UpdateOutcome::Recreate),
            UpdateMode::Fail => Err(ConnectorError::failure("update rejected")),
        }
    }

    async fn release(&self, instance: Arc<ConnectorInstance>) -> ConnectorResult<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        instance.close().await;
        Ok(())
    }
}
