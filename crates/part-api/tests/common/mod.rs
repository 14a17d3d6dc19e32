#![allow(dead_code)]

use part_api::{ClientEvent, PartApiConfig, PartClient, listener};
use std::sync::Once;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use wiremock::MockServer;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub async fn start() -> (MockServer, PartClient) {
    init_tracing();
    let server = MockServer::start().await;
    let client = PartClient::new(PartApiConfig::new().base_endpoint(server.uri()))
        .expect("client build");
    (server, client)
}

/// Every `Authenticated` notification, in order.
pub fn auth_events(client: &PartClient) -> mpsc::UnboundedReceiver<bool> {
    let (tx, rx) = mpsc::unbounded_channel();
    client.subscribe(
        ClientEvent::Authenticated,
        listener(move |value: bool| {
            let _ = tx.send(value);
        }),
    );
    rx
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<bool>) -> bool {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event timeout")
        .expect("event channel closed")
}

/// Assert nothing is published for a short while.
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<bool>) {
    let outcome = timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(outcome.is_err(), "unexpected event: {outcome:?}");
}
