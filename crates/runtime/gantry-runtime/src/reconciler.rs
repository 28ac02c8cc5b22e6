//! Brings one resource's connector instance in line with its latest record

use crate::error::RuntimeResult;
use crate::hash::ConfigurationHash;
use crate::record::ConfigurationRecord;
use gantry_connector::{ConnectorFactory, ConnectorInstance, ConnectorResult, UpdateOutcome};
use gantry_core::RuntimeSettings;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A published instance together with the fingerprint it was configured from
#[derive(Debug, Clone)]
pub struct Published {
    /// The live instance
    pub instance: Arc<ConnectorInstance>,
    /// Fingerprint of its connection settings
    pub hash: ConfigurationHash,
}

/// What reconciliation did to the connector instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileAction {
    /// No prior instance; a new one was created
    Created,
    /// The prior instance accepted the new settings in place
    Updated,
    /// The prior instance was released and replaced
    Recreated,
    /// Settings were unchanged; the prior instance was reused
    Unchanged,
}

/// Kind of declared feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    /// Attribute
    Attribute,
    /// Notification list
    Event,
    /// Operation
    Operation,
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Attribute => "attribute",
            Self::Event => "event",
            Self::Operation => "operation",
        })
    }
}

/// One feature that could not be applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureFailure {
    /// Feature kind
    pub kind: FeatureKind,
    /// Feature id
    pub id: String,
    /// Why it failed
    pub reason: String,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Resource name
    pub resource_name: String,
    /// Lifecycle action taken
    pub action: ReconcileAction,
    /// Features applied (or re-applied) this pass
    pub applied: Vec<(FeatureKind, String)>,
    /// Features that failed; the rest of the pass went on
    pub failed: Vec<FeatureFailure>,
    /// Features removed because they are no longer declared
    pub removed: Vec<(FeatureKind, String)>,
}

impl ReconcileReport {
    fn new(resource_name: &str, action: ReconcileAction) -> Self {
        Self {
            resource_name: resource_name.to_string(),
            action,
            applied: Vec::new(),
            failed: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Whether every declared feature was applied
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, kind: FeatureKind, id: &str, outcome: ConnectorResult<bool>) {
        match outcome {
            Ok(true) => self.applied.push((kind, id.to_string())),
            Ok(false) => {
                warn!(resource = %self.resource_name, feature = %kind, id = %id, "Feature not available on connector");
                self.failed.push(FeatureFailure {
                    kind,
                    id: id.to_string(),
                    reason: "not resolved by connector".to_string(),
                });
            }
            Err(err) => {
                warn!(resource = %self.resource_name, feature = %kind, id = %id, error = %err, "Feature could not be applied");
                self.failed.push(FeatureFailure {
                    kind,
                    id: id.to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }
}

/// Create, update or reuse decisions for resources of one connector type
pub struct ConnectorReconciler {
    factory: Arc<dyn ConnectorFactory>,
    settings: Arc<RuntimeSettings>,
}

impl ConnectorReconciler {
    /// Reconciler driving `factory` with default runtime settings
    pub fn new(factory: Arc<dyn ConnectorFactory>) -> Self {
        Self {
            factory,
            settings: Arc::new(RuntimeSettings::default()),
        }
    }

    /// Settings handed to the factory for every instance it creates
    #[must_use]
    pub fn with_settings(mut self, settings: Arc<RuntimeSettings>) -> Self {
        self.settings = settings;
        self
    }

    /// Settings instances are created with
    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Connector type served
    pub fn connector_type(&self) -> &str {
        self.factory.connector_type()
    }

    /// Reconcile `record` against the previously published state.
    ///
    /// Create and update failures are returned and nothing new is published;
    /// a failed recreate has already released `previous`. Feature application
    /// is best-effort and runs on every successful pass, whatever the action.
    pub async fn reconcile(
        &self,
        previous: Option<&Published>,
        record: &ConfigurationRecord,
    ) -> RuntimeResult<(Published, ReconcileReport)> {
        let name = record.resource_name.as_str();
        let hash = record.hash();
        let previous = previous.filter(|published| !published.instance.is_closed());

        let (instance, action) = match previous {
            None => {
                let instance = self
                    .factory
                    .create(name, record.connection_parameters(), &self.settings)
                    .await?;
                (Arc::new(instance), ReconcileAction::Created)
            }
            Some(published) if published.hash == hash => {
                debug!(resource = %name, hash = %hash, "Connection settings unchanged");
                (published.instance.clone(), ReconcileAction::Unchanged)
            }
            Some(published) => {
                match self
                    .factory
                    .update(published.instance.clone(), record.connection_parameters())
                    .await?
                {
                    UpdateOutcome::Updated(instance) => (instance, ReconcileAction::Updated),
                    UpdateOutcome::Recreate => {
                        debug!(resource = %name, "Connector cannot update in place; recreating");
                        self.release(published.instance.clone()).await;
                        let instance = self
                            .factory
                            .create(name, record.connection_parameters(), &self.settings)
                            .await?;
                        (Arc::new(instance), ReconcileAction::Recreated)
                    }
                }
            }
        };

        if action != ReconcileAction::Unchanged {
            info!(resource = %name, action = ?action, hash = %hash, "Connector instance reconciled");
        }

        let mut report = ReconcileReport::new(name, action);
        apply_features(&instance, record, &mut report).await;
        Ok((Published { instance, hash }, report))
    }

    /// Release a published instance that is leaving the registry
    pub async fn teardown(&self, published: Published) {
        info!(resource = %published.instance.resource_name(), "Tearing down connector instance");
        self.release(published.instance).await;
    }

    async fn release(&self, instance: Arc<ConnectorInstance>) {
        let name = instance.resource_name().to_string();
        if let Err(err) = self.factory.release(instance.clone()).await {
            warn!(resource = %name, error = %err, "Connector release failed; closing instance");
        }
        // Whatever the factory did, the instance must not serve calls afterwards.
        instance.close().await;
    }
}

impl fmt::Debug for ConnectorReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorReconciler")
            .field("connector_type", &self.connector_type())
            .finish()
    }
}

/// Re-apply every declared feature, then drop the undeclared ones
async fn apply_features(instance: &ConnectorInstance, record: &ConfigurationRecord, report: &mut ReconcileReport) {
    for (id, cfg) in &record.attributes {
        let outcome = instance
            .add_attribute(id, &cfg.name, cfg.parameters.clone())
            .await
            .map(|descriptor| descriptor.is_some());
        report.record(FeatureKind::Attribute, id, outcome);
    }

    for (id, cfg) in &record.events {
        let outcome = instance
            .enable_notifications(id, &cfg.category, cfg.parameters.clone())
            .map(|descriptor| descriptor.is_some());
        report.record(FeatureKind::Event, id, outcome);
    }

    for (id, cfg) in &record.operations {
        let outcome = instance
            .enable_operation(id, &cfg.name, cfg.parameters.clone())
            .await
            .map(|descriptor| descriptor.is_some());
        report.record(FeatureKind::Operation, id, outcome);
    }

    let retained = [
        (FeatureKind::Attribute, instance.retain_attributes(&record.attribute_ids()).await),
        (FeatureKind::Event, instance.retain_notifications(&record.event_ids())),
        (FeatureKind::Operation, instance.retain_operations(&record.operation_ids()).await),
    ];
    for (kind, outcome) in retained {
        match outcome {
            Ok(removed) => report.removed.extend(removed.into_iter().map(|id| (kind, id))),
            Err(err) => {
                warn!(resource = %report.resource_name, feature = %kind, error = %err, "Could not retain declared features");
            }
        }
    }
}
