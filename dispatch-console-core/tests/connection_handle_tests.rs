//! Integration tests for the router connection handle
//!
//! Runs the connection supervisor against the scripted transport and checks
//! that connect and disconnect actions behave as one-shot registrations.

mod common;

use common::{eventually, Script, ScriptedTransport};
use dispatch_console_core::error::ConnectionError;
use dispatch_console_core::router::reconnection::ReconnectionPolicy;
use dispatch_console_core::router::{ConnectionHandle, ConnectionOptions, ConnectionState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
    let hits = Arc::new(AtomicUsize::new(0));
    let read = Arc::clone(&hits);
    (hits, move || read.load(Ordering::SeqCst))
}

#[tokio::test]
async fn test_connect_fires_connect_actions_once() {
    let transport = ScriptedTransport::new();
    let connection = ConnectionHandle::new(transport.clone(), ReconnectionPolicy::default());
    let (hits, count) = counter();

    connection.add_connect_action(move || {
        hits.fetch_add(1, Ordering::SeqCst);
    });
    connection.connect(ConnectionOptions::new("localhost", 5673));

    eventually(|| connection.is_connected()).await;
    assert_eq!(count(), 1);
    assert_eq!(transport.opens().len(), 1);

    // A second connect while up is ignored and fires nothing
    connection.connect(ConnectionOptions::new("localhost", 5673));
    tokio::task::yield_now().await;
    assert_eq!(transport.opens().len(), 1);
    assert_eq!(count(), 1);
}

#[tokio::test]
async fn test_disconnect_fires_disconnect_actions_once() {
    let transport = ScriptedTransport::new();
    let connection = ConnectionHandle::new(transport.clone(), ReconnectionPolicy::default());
    connection.connect(ConnectionOptions::new("localhost", 5673));
    eventually(|| connection.is_connected()).await;

    let (hits, count) = counter();
    connection.add_disconnect_action(move || {
        hits.fetch_add(1, Ordering::SeqCst);
    });

    connection.disconnect().await;
    assert_eq!(count(), 1);
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    assert!(transport.last_link().unwrap().is_closed());

    connection.disconnect().await;
    assert_eq!(count(), 1);
}

#[tokio::test]
async fn test_disconnect_before_connect_fires_nothing() {
    let connection = ConnectionHandle::new(ScriptedTransport::new(), ReconnectionPolicy::default());
    let (hits, count) = counter();
    connection.add_disconnect_action(move || {
        hits.fetch_add(1, Ordering::SeqCst);
    });

    connection.disconnect().await;
    assert_eq!(count(), 0);
    assert!(matches!(connection.link(), Err(ConnectionError::NotConnected)));
}

#[tokio::test]
async fn test_link_loss_without_reconnect_stays_down() {
    let transport = ScriptedTransport::new();
    let connection = ConnectionHandle::new(transport.clone(), ReconnectionPolicy::default());
    connection.connect(ConnectionOptions::new("localhost", 5673));
    eventually(|| connection.is_connected()).await;

    let (tx, rx) = oneshot::channel();
    connection.add_disconnect_action(move || {
        let _ = tx.send(());
    });
    transport.drop_link();

    rx.await.expect("disconnect action should fire");
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    assert_eq!(transport.opens().len(), 1);
}

#[tokio::test]
async fn test_link_loss_with_reconnect_redials() {
    let transport = ScriptedTransport::new();
    let connection = ConnectionHandle::new(transport.clone(), ReconnectionPolicy::default());
    connection.connect(ConnectionOptions::new("localhost", 5673).with_reconnect());
    eventually(|| connection.is_connected()).await;

    let (tx, rx) = oneshot::channel();
    connection.add_connect_action(move || {
        let _ = tx.send(());
    });
    transport.drop_link();

    // Default policy waits one second before the first re-dial
    rx.await.expect("connect action should fire after re-dial");
    assert!(connection.is_connected());
    let opens = transport.opens();
    assert_eq!(opens.len(), 2);
    assert!(opens.iter().all(|options| options.reconnect));
}

#[tokio::test]
async fn test_connect_while_redialing_switches_endpoint() {
    let transport = ScriptedTransport::new();
    let connection = ConnectionHandle::new(transport.clone(), ReconnectionPolicy::default());
    connection.connect(ConnectionOptions::new("localhost", 5673).with_reconnect());
    eventually(|| connection.is_connected()).await;

    transport.drop_link();
    eventually(|| connection.state() == ConnectionState::Connecting).await;

    connection.connect(ConnectionOptions::new("other.example.com", 20009).with_reconnect());
    eventually(|| connection.is_connected()).await;

    // Outlive the old backoff; the replaced dial must never come back
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let endpoints: Vec<String> = transport.opens().iter().map(|o| o.endpoint()).collect();
    assert_eq!(endpoints, vec!["localhost:5673", "other.example.com:20009"]);
    assert_eq!(
        connection.options().map(|o| o.endpoint()),
        Some("other.example.com:20009".to_string())
    );
}

#[tokio::test]
async fn test_open_failure_without_reconnect_fails() {
    let transport = ScriptedTransport::with_script(Script {
        open_error: Some("connection refused".to_string()),
        ..Script::default()
    });
    let connection = ConnectionHandle::new(transport, ReconnectionPolicy::default());

    let (tx, rx) = oneshot::channel::<()>();
    connection.add_connect_action(move || {
        let _ = tx.send(());
    });
    connection.connect(ConnectionOptions::new("localhost", 5673));

    // Pending connect actions are dropped, never run
    assert!(rx.await.is_err());
    assert!(matches!(connection.state(), ConnectionState::Failed(_)));
}

#[tokio::test]
async fn test_test_connect_reports_unreachable_router() {
    let transport = ScriptedTransport::with_script(Script {
        probe_error: Some("connection refused".to_string()),
        ..Script::default()
    });
    let connection = ConnectionHandle::new(transport.clone(), ReconnectionPolicy::default());

    let result = connection
        .test_connect(&ConnectionOptions::new("localhost", 5673))
        .await;
    assert!(result.is_error());
    assert_eq!(transport.probe_count(), 1);
    assert!(transport.opens().is_empty());
}
