//! Client reconnect, deduplication and reconciliation against a live server.

mod common;

use std::time::Duration;

use common::{eventually, TestApp};
use orderwire_sdk::ws::{LinkState, OrderFeedClient, WsConfig};
use orderwire_sdk::{Channel, OrderEvent, OrderSnapshot, OrderStatus};
use tokio::net::TcpListener;
use tokio::sync::watch;

const WAIT: Duration = Duration::from_secs(5);

fn fast_config(url: String) -> WsConfig {
    WsConfig::new(url)
        .with_reconnect_delay(Duration::from_millis(200))
        .with_max_reconnect_delay(Duration::from_secs(2))
        .with_connect_timeout(Duration::from_secs(2))
}

async fn wait_for_state(
    states: &mut watch::Receiver<LinkState>,
    predicate: impl FnMut(&LinkState) -> bool,
) -> LinkState {
    let state = tokio::time::timeout(WAIT, states.wait_for(predicate))
        .await
        .expect("state reached in time")
        .expect("link task alive");
    *state
}

#[tokio::test]
async fn test_reconnects_after_server_side_drop() {
    let app = TestApp::spawn().await;
    let client = OrderFeedClient::new(fast_config(app.ws_base())).expect("client");
    client.connect("7", None).await.expect("connect");
    let mut states = client.state_changes().await.expect("link");

    wait_for_state(&mut states, LinkState::is_connected).await;
    app.wait_for_connections(1).await;
    assert!(client.is_connected().await);

    // Evict the server side of the socket.
    let table = Channel::parse("7").expect("channel");
    for conn in app.state.registry.snapshot(&table).await {
        conn.close();
    }

    let dropped = wait_for_state(&mut states, |s| !s.is_connected()).await;
    assert!(matches!(
        dropped,
        LinkState::Backoff { attempt: 0 } | LinkState::Connecting
    ));

    // An update published while the link is down is not replayed.
    let missed = OrderSnapshot::new("42")
        .with_table("7")
        .with_status(OrderStatus::Ready);
    app.state
        .dispatcher
        .emit("kitchen", &OrderEvent::updated(missed.clone()))
        .await;

    wait_for_state(&mut states, LinkState::is_connected).await;
    app.wait_for_connections(1).await;
    assert!(client.try_next_event().await.is_none());

    // The external fetch fills the gap.
    assert_eq!(client.reconcile(vec![missed.clone()]).await, 1);
    assert_eq!(client.order("42").await, Some(missed));

    client.close().await;
    wait_for_state(&mut states, |s| *s == LinkState::Idle).await;
}

#[tokio::test]
async fn test_backoff_attempts_grow_until_exhausted() {
    // Reserve a port, then free it so every attempt is refused.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let config = WsConfig::new(format!("ws://{addr}/ws"))
        .with_reconnect_delay(Duration::from_millis(40))
        .with_backoff_growth(1.5)
        .with_max_reconnect_attempts(3);
    let client = OrderFeedClient::new(config).expect("client");
    client.connect("kitchen", None).await.expect("connect");
    let mut states = client.state_changes().await.expect("link");

    for expected in 0..3 {
        wait_for_state(&mut states, |s| *s == LinkState::Backoff { attempt: expected }).await;
    }
    wait_for_state(&mut states, |s| *s == LinkState::Idle).await;
    assert!(!client.is_connected().await);
}

#[tokio::test]
async fn test_events_flow_and_duplicates_suppressed() {
    let app = TestApp::spawn().await;
    let client = OrderFeedClient::new(fast_config(app.ws_base())).expect("client");
    client
        .connect("7", Some("restaurant-3"))
        .await
        .expect("connect");
    app.wait_for_connections(2).await;

    let event = OrderEvent::created(
        OrderSnapshot::new("42")
            .with_table("7")
            .with_restaurant("3"),
    );
    // Reaches the client on both its table and restaurant links.
    assert_eq!(app.state.dispatcher.emit("7", &event).await, 2);

    let received = tokio::time::timeout(WAIT, client.next_event())
        .await
        .expect("event in time")
        .expect("event");
    assert_eq!(received, event);

    let client_ref = &client;
    eventually(move || async move { client_ref.duplicates_suppressed().await == 1 }).await;
    assert!(client.try_next_event().await.is_none());
    assert_eq!(client.last_message(), Some(event.clone()));
    assert_eq!(client.order("42").await, Some(event.into_order()));
}

#[tokio::test]
async fn test_stale_update_does_not_regress_state() {
    let app = TestApp::spawn().await;
    let client = OrderFeedClient::new(fast_config(app.ws_base())).expect("client");
    client.connect("kitchen", None).await.expect("connect");
    app.wait_for_connections(1).await;

    let newer = OrderSnapshot::new("9").with_status(OrderStatus::Ready);
    let older = newer
        .clone()
        .with_status(OrderStatus::Preparing)
        .with_timestamp(newer.timestamp - chrono::Duration::seconds(30));

    app.state
        .dispatcher
        .emit("kitchen", &OrderEvent::updated(newer.clone()))
        .await;
    app.state
        .dispatcher
        .emit("kitchen", &OrderEvent::updated(older))
        .await;

    for _ in 0..2 {
        tokio::time::timeout(WAIT, client.next_event())
            .await
            .expect("event in time")
            .expect("event");
    }
    assert_eq!(client.order("9").await, Some(newer));
}

#[tokio::test]
async fn test_retarget_moves_registration() {
    let app = TestApp::spawn().await;
    let client = OrderFeedClient::new(fast_config(app.ws_base())).expect("client");
    client.connect("7", None).await.expect("connect");
    app.wait_for_connections(1).await;

    client.connect("8", None).await.expect("retarget");

    let registry = &app.state.registry;
    let eight = Channel::parse("8").expect("channel");
    eventually(move || {
        let eight = eight.clone();
        async move {
            registry.connection_count().await == 1 && registry.subscriber_count(&eight).await == 1
        }
    })
    .await;
    assert_eq!(client.target().await, Some(Channel::parse("8").expect("channel")));
}
