//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use orderwire_api::{AppState, Server, ServerConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// A server running on an ephemeral port.
pub struct TestApp {
    pub addr: SocketAddr,
    pub state: AppState,
    pub shutdown: CancellationToken,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(ServerConfig::new("127.0.0.1", 0)).await
    }

    pub async fn spawn_with(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let state = AppState::new(config.clone());
        let shutdown = CancellationToken::new();

        tokio::spawn(Server::new(config, state.clone()).serve(listener, shutdown.clone()));

        Self {
            addr,
            state,
            shutdown,
        }
    }

    pub fn ws_base(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn ws_url(&self, target: &str) -> String {
        format!("ws://{}/ws?target={}", self.addr, target)
    }

    /// Waits until the registry holds exactly `n` registrations.
    pub async fn wait_for_connections(&self, n: usize) {
        let registry = &self.state.registry;
        eventually(move || async move { registry.connection_count().await == n }).await;
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Polls `check` until it returns true, panicking after five seconds.
pub async fn eventually<F, Fut>(check: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
