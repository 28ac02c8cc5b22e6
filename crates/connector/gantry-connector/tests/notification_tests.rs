//! Integration tests for notification lists and delayed listeners

mod common;

use common::{counting_listener, memory_instance, MemoryConnector};
use gantry_connector::notifications::{invoker_for, NotificationRegistry};
use gantry_connector::prelude::*;
use gantry_core::InvokerKind;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[test]
fn test_delayed_listener_receives_events_after_enable() {
    let connector = Arc::new(MemoryConnector::new().with_category("alarm"));
    let instance = memory_instance("db1", connector);
    let (listener, counter) = counting_listener();

    assert!(instance.subscribe("ops", listener, true).unwrap());
    instance.enable_notifications("alarms", "alarm", FeatureOptions::new()).unwrap();
    instance.enable_notifications("alarms", "alarm", FeatureOptions::new()).unwrap();

    let descriptor = instance.notification("alarms").unwrap();
    assert_eq!(descriptor.listener_ids(), vec!["ops".to_string()]);

    let fired = descriptor.emit("disk full", None);
    assert_eq!(fired.sequence, 1);
    assert_eq!(fired.source, "db1");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_disable_then_lookup_is_absent() {
    let connector = Arc::new(MemoryConnector::new().with_category("alarm"));
    let instance = memory_instance("db1", connector);
    instance.enable_notifications("alarms", "alarm", FeatureOptions::new()).unwrap();

    assert!(instance.disable_notifications("alarms").unwrap());
    assert!(instance.notification("alarms").is_none());
    assert!(!instance.disable_notifications("alarms").unwrap());
}

#[test]
fn test_unknown_category_is_not_enabled() {
    let instance = memory_instance("db1", Arc::new(MemoryConnector::new()));
    assert!(instance
        .enable_notifications("x", "nonexistent", FeatureOptions::new())
        .unwrap()
        .is_none());
    assert!(instance.notification_lists().is_empty());
}

#[test]
fn test_fan_out_and_unsubscribe_detach_once() {
    let connector = Arc::new(MemoryConnector::new().with_category("alarm").with_category("audit"));
    let registry = NotificationRegistry::new("db1", connector.clone(), invoker_for(InvokerKind::Parallel, 4));
    registry.enable("alarms", "alarm", FeatureOptions::new()).unwrap();
    registry.enable("audits", "audit", FeatureOptions::new()).unwrap();

    let (listener, counter) = counting_listener();
    assert!(registry.subscribe("ops", listener, false).unwrap());
    assert_eq!(connector.attaches.load(Ordering::SeqCst), 1);

    registry.emit("alarms", "hot", None);
    registry.emit("audits", "login", None);
    assert_eq!(counter.load(Ordering::SeqCst), 2);

    assert!(registry.unsubscribe("ops"));
    assert_eq!(connector.detaches.load(Ordering::SeqCst), 1);

    registry.emit("alarms", "hotter", None);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn test_concurrent_enable_and_subscribe() {
    let connector = Arc::new(MemoryConnector::new().with_category("alarm"));
    let registry = Arc::new(NotificationRegistry::new("db1", connector, invoker_for(InvokerKind::Sequential, 1)));

    std::thread::scope(|scope| {
        for i in 0..8 {
            let registry = registry.clone();
            scope.spawn(move || {
                let (listener, _) = counting_listener();
                registry.subscribe(&format!("l{i}"), listener, true).unwrap();
                registry
                    .enable(&format!("list{}", i % 2), "alarm", FeatureOptions::new())
                    .unwrap();
            });
        }
    });

    let attached: usize = registry
        .list()
        .iter()
        .filter_map(|id| registry.get(id))
        .map(|descriptor| descriptor.listener_count())
        .sum();
    // Each delayed listener lands on exactly one list or is still parked.
    assert_eq!(attached + registry.delayed_listeners().len(), 8);
}
