use std::sync::{Arc, Mutex};
use std::time::Duration;

use confsync_sync::{BroadcastTransport, ChangeNotifier, ChangeTransport};
use confsync_types::{ConfigChange, Subscription};
use pretty_assertions::assert_eq;
use serde_json::json;

fn recorder() -> (Arc<Mutex<Vec<ConfigChange>>>, impl Fn(&ConfigChange) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |change: &ConfigChange| sink.lock().unwrap().push(change.clone()))
}

// ── ChangeNotifier ──────────────────────────────────────────────

#[test]
fn publish_reaches_every_subscriber() {
    let notifier = ChangeNotifier::new();
    let (first, record_first) = recorder();
    let (second, record_second) = recorder();
    let _a = notifier.subscribe(Arc::new(record_first));
    let _b = notifier.subscribe(Arc::new(record_second));

    notifier.notify("theme", json!({"primary": "#002776"}));

    assert_eq!(first.lock().unwrap().len(), 1);
    assert_eq!(second.lock().unwrap()[0].value, json!({"primary": "#002776"}));
}

#[test]
fn on_change_filters_by_key() {
    let notifier = ChangeNotifier::new();
    let (seen, record) = recorder();
    let _sub = notifier.on_change("theme", record);

    notifier.notify("sidebar_layout", json!([]));
    notifier.notify("theme", json!(1));
    notifier.notify("theme", json!(2));

    let values: Vec<_> = seen.lock().unwrap().iter().map(|c| c.value.clone()).collect();
    assert_eq!(values, vec![json!(1), json!(2)]);
}

#[test]
fn panicking_handler_does_not_block_others() {
    let notifier = ChangeNotifier::new();
    let _bad = notifier.subscribe(Arc::new(|_: &ConfigChange| panic!("consumer bug")));
    let (seen, record) = recorder();
    let _good = notifier.subscribe(Arc::new(record));

    notifier.notify("theme", json!(1));
    notifier.notify("theme", json!(2));

    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[test]
fn unsubscribe_stops_delivery_and_is_idempotent() {
    let notifier = ChangeNotifier::new();
    let (seen, record) = recorder();
    let sub = notifier.subscribe(Arc::new(record));
    assert_eq!(notifier.handler_count(), 1);

    sub.unsubscribe();
    sub.unsubscribe();
    assert!(sub.is_cancelled());
    assert_eq!(notifier.handler_count(), 0);

    notifier.notify("theme", json!(1));
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn handler_can_unsubscribe_itself() {
    let notifier = ChangeNotifier::new();
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let calls = Arc::new(Mutex::new(0));

    let handler_slot = slot.clone();
    let handler_calls = calls.clone();
    let sub = notifier.subscribe(Arc::new(move |_: &ConfigChange| {
        *handler_calls.lock().unwrap() += 1;
        if let Some(sub) = handler_slot.lock().unwrap().as_ref() {
            sub.unsubscribe();
        }
    }));
    *slot.lock().unwrap() = Some(sub);

    notifier.notify("theme", json!(1));
    notifier.notify("theme", json!(2));

    assert_eq!(*calls.lock().unwrap(), 1);
    assert_eq!(notifier.handler_count(), 0);
}

#[test]
fn dropping_handle_keeps_subscription() {
    let notifier = ChangeNotifier::new();
    let (seen, record) = recorder();
    drop(notifier.subscribe(Arc::new(record)));

    notifier.notify("theme", json!(1));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn clones_share_subscribers() {
    let notifier = ChangeNotifier::new();
    let (seen, record) = recorder();
    let _sub = notifier.subscribe(Arc::new(record));

    notifier.clone().notify("theme", json!("x"));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn per_key_order_is_preserved() {
    let notifier = ChangeNotifier::new();
    let (seen, record) = recorder();
    let _sub = notifier.on_change("feature_flags", record);

    for i in 0..20 {
        notifier.notify("feature_flags", json!(i));
    }

    let values: Vec<_> = seen.lock().unwrap().iter().map(|c| c.value.clone()).collect();
    assert_eq!(values, (0..20).map(|i| json!(i)).collect::<Vec<_>>());
}

// ── BroadcastTransport ──────────────────────────────────────────

#[tokio::test]
async fn attached_broadcast_receives_publishes() {
    let notifier = ChangeNotifier::new();
    let transport = BroadcastTransport::new(16);
    notifier.attach(Arc::new(transport.clone()));

    let mut receiver = transport.receiver();
    notifier.notify("theme", json!({"primary": "#fff"}));

    let change = tokio::time::timeout(Duration::from_secs(1), receiver.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(change, ConfigChange::new("theme", json!({"primary": "#fff"})));
}

#[tokio::test]
async fn broadcast_subscription_bridges_two_notifiers() {
    let window_a = ChangeNotifier::new();
    let window_b = ChangeNotifier::new();
    let transport = BroadcastTransport::default();
    window_a.attach(Arc::new(transport.clone()));

    let forward_to_b = window_b.clone();
    let bridge = transport.subscribe(Arc::new(move |change: &ConfigChange| {
        forward_to_b.publish(change);
    }));

    let (seen, record) = recorder();
    let _sub = window_b.on_change("sidebar_layout", record);

    window_a.notify("sidebar_layout", json!({"collapsed": true}));

    for _ in 0..100 {
        if !seen.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(seen.lock().unwrap()[0].value, json!({"collapsed": true}));

    bridge.unsubscribe();
}

#[tokio::test]
async fn broadcast_unsubscribe_stops_task() {
    let transport = BroadcastTransport::new(4);
    let (seen, record) = recorder();
    let sub = transport.subscribe(Arc::new(record));

    sub.unsubscribe();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(transport.receiver_count(), 0);

    transport.publish(&ConfigChange::new("theme", json!(1)));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn broadcast_subscribe_without_runtime_is_noop() {
    let transport = BroadcastTransport::new(4);
    let sub = transport.subscribe(Arc::new(|_: &ConfigChange| {}));
    assert!(sub.is_cancelled());
}

#[test]
fn broadcast_publish_without_receivers_is_fine() {
    let transport = BroadcastTransport::new(4);
    transport.publish(&ConfigChange::new("theme", json!(1)));
    assert_eq!(transport.name(), "broadcast");
}
