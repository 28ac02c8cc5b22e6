//! Lifecycle half of the connector-module SPI

use crate::error::ConnectorResult;
use crate::instance::{ConnectionParameters, ConnectorInstance};
use async_trait::async_trait;
use gantry_core::RuntimeSettings;
use std::sync::Arc;

/// Result of asking a connector to apply new connection parameters in place
#[derive(Debug)]
pub enum UpdateOutcome {
    /// The instance now serves the new parameters
    Updated(Arc<ConnectorInstance>),
    /// The change cannot be applied in place; release and create afresh
    Recreate,
}

/// Creates, updates and releases instances of one connector type
#[async_trait]
pub trait ConnectorFactory: Send + Sync {
    /// Connector type tag this factory serves
    fn connector_type(&self) -> &str;

    /// Build a new instance for `resource_name`.
    ///
    /// `settings` are the process-wide runtime settings; pass them to
    /// [`ConnectorInstanceBuilder::settings`](crate::instance::ConnectorInstanceBuilder::settings)
    /// so the instance uses the configured timeout and dispatch strategy.
    async fn create(
        &self,
        resource_name: &str,
        parameters: ConnectionParameters,
        settings: &RuntimeSettings,
    ) -> ConnectorResult<ConnectorInstance>;

    /// Apply new parameters to a live instance.
    ///
    /// The default cannot update anything and asks for a recreate.
    async fn update(
        &self,
        _instance: Arc<ConnectorInstance>,
        _parameters: ConnectionParameters,
    ) -> ConnectorResult<UpdateOutcome> {
        Ok(UpdateOutcome::Recreate)
    }

    /// Release an instance that is being torn down
    async fn release(&self, instance: Arc<ConnectorInstance>) -> ConnectorResult<()> {
        instance.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ScalarType, TypeProjectionRegistry, Value};
    use crate::fields::{FieldAttributeSupport, FieldSpec};

    struct ProcessFactory;

    #[async_trait]
    impl ConnectorFactory for ProcessFactory {
        fn connector_type(&self) -> &str {
            "process"
        }

        async fn create(
            &self,
            resource_name: &str,
            parameters: ConnectionParameters,
            settings: &RuntimeSettings,
        ) -> ConnectorResult<ConnectorInstance> {
            let types = Arc::new(TypeProjectionRegistry::new("process"));
            let support = FieldAttributeSupport::builder(types.clone())
                .field(FieldSpec::read_only("pid", ScalarType::Integer, || Ok(Some(Value::Integer(1)))))
                .build();
            Ok(ConnectorInstance::builder(resource_name, "process", parameters, Arc::new(support))
                .types(types)
                .settings(settings)
                .build())
        }
    }

    #[test]
    fn test_default_update_asks_for_recreate() {
        let factory = ProcessFactory;
        let instance = Arc::new(tokio_test::block_on(factory.create("proc1", ConnectionParameters::new("local://"), &RuntimeSettings::default())).unwrap());

        let outcome = tokio_test::block_on(factory.update(instance.clone(), ConnectionParameters::new("local://other")));
        assert!(matches!(outcome, Ok(UpdateOutcome::Recreate)));
        assert_eq!(instance.identity().connection_string, "local://");
    }

    #[test]
    fn test_default_release_closes_instance() {
        let factory = ProcessFactory;
        let instance = Arc::new(tokio_test::block_on(factory.create("proc1", ConnectionParameters::new("local://"), &RuntimeSettings::default())).unwrap());

        tokio_test::block_on(factory.release(instance.clone())).unwrap();
        assert!(instance.is_closed());
    }
}
