// Linkauth — HTTP server
//
// Binds a TCP listener and serves the gateway router until the shutdown
// future resolves. In-flight requests finish before `run` returns; closing
// the manager is left to the caller that owns it.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use super::routes::{router, GatewayState};
use crate::store::CredentialManager;

pub struct GatewayServer {
    bind: SocketAddr,
    state: GatewayState,
}

impl GatewayServer {
    pub fn new(manager: Arc<CredentialManager>, bind: SocketAddr, realm: &str) -> Self {
        Self {
            bind,
            state: GatewayState::new(manager, realm),
        }
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.bind).await?;
        tracing::info!(addr = %listener.local_addr()?, "Linkauth gateway listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}
