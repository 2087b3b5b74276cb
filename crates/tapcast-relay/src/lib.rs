//! Tapcast signaling relay.
//!
//! Devices that want a remote-control session do not know each other's
//! network address, so they register here under short device ids and
//! exchange connect requests, session descriptions, and ICE candidates
//! through this relay until a direct peer-to-peer path is up. The relay
//! keeps no request state: it is a registry of live connections plus a
//! stateless message router.

#![forbid(unsafe_code)]

pub mod registry;
pub mod router;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use registry::DeviceRegistry;
use tapcast_common::Result;

/// A bound relay instance.
pub struct Relay {
    listener: TcpListener,
    registry: DeviceRegistry,
}

impl Relay {
    /// Bind the relay to the given address.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("relay listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            registry: DeviceRegistry::new(),
        })
    }

    /// The address the relay actually bound to (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept relay connections until the listener fails.
    ///
    /// Each connection runs in its own task; a failure on one connection
    /// never affects the others.
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let registry = self.registry.clone();
            tokio::spawn(router::handle_connection(stream, addr, registry));
        }
    }
}
