//! Integration tests for the attribute registry through a connector instance

mod common;

use common::{configured_instance, memory_instance, MemoryConnector};
use gantry_connector::feature::TIMEOUT_OPTION;
use gantry_connector::prelude::*;
use gantry_core::RuntimeSettings;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

const TIMEOUT: Option<Duration> = Some(Duration::from_secs(1));

#[tokio::test]
async fn test_unknown_ids_fall_back() {
    let instance = memory_instance("db1", Arc::new(MemoryConnector::new()));
    let default = EntityValue::of("fallback", instance.types().scalar(ScalarType::Text));

    for id in ["a", "b", "missing"] {
        let value = instance.read_attribute(id, TIMEOUT, default.clone()).await.unwrap();
        assert_eq!(value, default);
        assert!(!instance.write_attribute(id, TIMEOUT, default.clone()).await.unwrap());
    }
}

#[tokio::test]
async fn test_connect_twice_returns_same_descriptor() {
    let connector = Arc::new(MemoryConnector::new().with_value("cpu", 0.25));
    let instance = memory_instance("db1", connector.clone());

    let first = instance
        .add_attribute("cpu", "cpu", FeatureOptions::new())
        .await
        .unwrap()
        .unwrap();
    let second = instance
        .add_attribute("cpu", "other", FeatureOptions::new().with("type", "string"))
        .await
        .unwrap()
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(connector.resolves.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_batch_read_leaves_failed_items_at_default() {
    let connector = Arc::new(MemoryConnector::new().with_value("a", 10_i64).with_failing("b"));
    let instance = memory_instance("db1", connector);
    instance.add_attribute("a", "a", FeatureOptions::new()).await.unwrap();
    instance.add_attribute("b", "b", FeatureOptions::new()).await.unwrap();

    let int = instance.types().scalar(ScalarType::Integer);
    let ok_default = EntityValue::of(0_i64, int.clone());
    let bad_default = EntityValue::of(-1_i64, int);
    let mut values = HashMap::from([
        ("a".to_string(), ok_default),
        ("b".to_string(), bad_default.clone()),
    ]);

    let succeeded = instance.read_attributes(&mut values, TIMEOUT).await.unwrap();

    assert_eq!(succeeded, HashSet::from(["a".to_string()]));
    assert_eq!(values["a"].raw(), Some(&Value::Integer(10)));
    assert_eq!(values["b"], bad_default);
}

#[tokio::test]
async fn test_single_read_timeout_is_typed() {
    let instance = memory_instance("db1", Arc::new(MemoryConnector::new().with_failing("slow")));
    instance.add_attribute("slow", "slow", FeatureOptions::new()).await.unwrap();

    let default = EntityValue::null(instance.types().scalar(ScalarType::Integer));
    let err = instance.read_attribute("slow", TIMEOUT, default).await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_batch_write_partial_success_is_kept() {
    let connector = Arc::new(
        MemoryConnector::new()
            .with_value("a", 1_i64)
            .with_value("c", 3_i64)
            .with_failing("b"),
    );
    let instance = memory_instance("db1", connector.clone());
    for id in ["a", "b", "c"] {
        instance.add_attribute(id, id, FeatureOptions::new()).await.unwrap();
    }

    let int = instance.types().scalar(ScalarType::Integer);
    let values: HashMap<String, EntityValue> = [("a", 100_i64), ("b", 200), ("c", 300)]
        .into_iter()
        .map(|(id, v)| (id.to_string(), EntityValue::of(v, int.clone())))
        .collect();

    assert!(!instance.write_attributes(&values, TIMEOUT).await.unwrap());
    assert_eq!(connector.value("a"), Some(Value::Integer(100)));
    assert_eq!(connector.value("c"), Some(Value::Integer(300)));
}

#[tokio::test]
async fn test_declared_type_drives_projection() {
    let connector = Arc::new(MemoryConnector::new().with_value("count", 7_i64));
    let instance = memory_instance("db1", connector);
    instance
        .add_attribute("count", "count", FeatureOptions::new().with("type", "int64"))
        .await
        .unwrap();

    let value = instance
        .read_attribute("count", TIMEOUT, EntityValue::null(instance.types().scalar(ScalarType::Integer)))
        .await
        .unwrap();
    let as_float = value.convert(Representation::Float).unwrap().unwrap();
    assert_eq!(as_float.into_owned(), Value::Float(7.0));
    assert!(matches!(
        value.convert(Representation::Table),
        Err(ConnectorError::UnsupportedProjection { .. })
    ));
}

#[tokio::test]
async fn test_concurrent_reads_share_the_registry() {
    let connector = Arc::new(MemoryConnector::new().with_value("a", 1_i64).with_value("b", 2_i64));
    let instance = Arc::new(memory_instance("db1", connector));
    instance.add_attribute("a", "a", FeatureOptions::new()).await.unwrap();
    instance.add_attribute("b", "b", FeatureOptions::new()).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let instance = instance.clone();
        handles.push(tokio::spawn(async move {
            let id = if i % 2 == 0 { "a" } else { "b" };
            let default = EntityValue::null(instance.types().scalar(ScalarType::Integer));
            instance.read_attribute(id, TIMEOUT, default).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().raw().is_some());
    }
}

#[tokio::test]
async fn test_slow_item_exhausts_batch_read_budget() {
    let connector = Arc::new(
        MemoryConnector::new()
            .with_value("a_slow", 1_i64)
            .with_value("b", 2_i64)
            .with_value("c", 3_i64)
            .with_slow("a_slow", Duration::from_secs(5)),
    );
    let instance = memory_instance("db1", connector);
    for id in ["a_slow", "b", "c"] {
        instance.add_attribute(id, id, FeatureOptions::new()).await.unwrap();
    }

    let int = instance.types().scalar(ScalarType::Integer);
    let default = EntityValue::of(-1_i64, int);
    let mut values: HashMap<String, EntityValue> = ["a_slow", "b", "c"]
        .into_iter()
        .map(|id| (id.to_string(), default.clone()))
        .collect();

    let started = Instant::now();
    let succeeded = instance
        .read_attributes(&mut values, Some(Duration::from_millis(100)))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(succeeded.is_empty());
    for id in ["a_slow", "b", "c"] {
        assert_eq!(values[id], default);
    }
}

#[tokio::test]
async fn test_slow_item_exhausts_batch_write_budget() {
    let connector = Arc::new(
        MemoryConnector::new()
            .with_value("a_slow", 1_i64)
            .with_value("b", 2_i64)
            .with_slow("a_slow", Duration::from_secs(5)),
    );
    let instance = memory_instance("db1", connector.clone());
    for id in ["a_slow", "b"] {
        instance.add_attribute(id, id, FeatureOptions::new()).await.unwrap();
    }

    let int = instance.types().scalar(ScalarType::Integer);
    let values: HashMap<String, EntityValue> = [("a_slow", 10_i64), ("b", 20)]
        .into_iter()
        .map(|(id, v)| (id.to_string(), EntityValue::of(v, int.clone())))
        .collect();

    let started = Instant::now();
    assert!(!instance
        .write_attributes(&values, Some(Duration::from_millis(100)))
        .await
        .unwrap());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(connector.value("b"), Some(Value::Integer(2)));
}

#[tokio::test]
async fn test_feature_timeout_option_bounds_reads() {
    let connector = Arc::new(MemoryConnector::new().with_value("cpu", 1_i64).with_slow("cpu", Duration::from_secs(5)));
    let instance = memory_instance("db1", connector);
    instance
        .add_attribute("cpu", "cpu", FeatureOptions::new().with(TIMEOUT_OPTION, "50"))
        .await
        .unwrap();

    let started = Instant::now();
    let default = EntityValue::null(instance.types().scalar(ScalarType::Integer));
    let err = instance
        .read_attribute("cpu", Some(Duration::from_secs(30)), default)
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_settings_supply_default_timeout() {
    let settings = RuntimeSettings {
        default_timeout_ms: 50,
        ..RuntimeSettings::default()
    };
    let connector = Arc::new(MemoryConnector::new().with_value("cpu", 1_i64).with_slow("cpu", Duration::from_secs(5)));
    let instance = configured_instance("db1", connector, &settings);
    assert_eq!(instance.default_timeout(), Duration::from_millis(50));
    instance.add_attribute("cpu", "cpu", FeatureOptions::new()).await.unwrap();

    let started = Instant::now();
    let default = EntityValue::null(instance.types().scalar(ScalarType::Integer));
    let err = instance.read_attribute("cpu", None, default).await.unwrap_err();
    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_secs(2));
}
