//! Broker TCP server
//!
//! One listener, one spawned task per accepted connection. Each worker
//! loops read-frame → route → write-frame until the peer closes or a
//! malformed request arrives. No state lives in the socket: consumer
//! group assignments persist in the registry across reconnects.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use sentra_common::config::BrokerConfig;
use sentra_common::error::Result;
use sentra_protocol::framing::{read_frame_async, write_frame_async};

use crate::registry::Registry;
use crate::router;

/// The broker server: registry plus bound listener
pub struct BrokerServer {
    registry: Arc<Registry>,
    listener: TcpListener,
}

impl BrokerServer {
    /// Open the data directory, create any seed topics and bind the
    /// listener. Binding is split from serving so callers (and tests, via
    /// port 0) can learn the bound address first.
    pub async fn bind(config: &BrokerConfig) -> Result<Self> {
        let registry = Arc::new(Registry::new(config.data_dir.clone()));
        for seed in &config.topics {
            registry.create_topic(&seed.name, seed.partitions)?;
        }

        let listener = TcpListener::bind(config.address()).await?;
        info!(address = %config.address(), "broker listening");

        Ok(Self { registry, listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Accept connections until the task is cancelled
    pub async fn serve(self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((socket, addr)) => {
                    let registry = self.registry.clone();
                    tokio::spawn(async move {
                        handle_connection(registry, socket, addr).await;
                    });
                }
                Err(e) => {
                    error!("failed to accept connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(registry: Arc<Registry>, mut socket: TcpStream, addr: SocketAddr) {
    debug!(%addr, "client connected");

    loop {
        // Peer close (or a short read mid-frame) ends the connection; the
        // server keeps running.
        let frame = match read_frame_async(&mut socket).await {
            Ok(frame) => frame,
            Err(_) => break,
        };

        let response = match router::handle_request(&registry, frame) {
            Ok(response) => response,
            Err(e) => {
                warn!(%addr, "dropping connection on malformed request: {}", e);
                break;
            }
        };

        if let Err(e) = write_frame_async(&mut socket, &response).await {
            warn!(%addr, "failed to write response: {}", e);
            break;
        }
    }

    debug!(%addr, "client disconnected");
}
