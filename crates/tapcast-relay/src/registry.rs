//! Device registry: live relay connections keyed by device id.
//!
//! The registry is the only shared mutable state in the relay. It knows
//! nothing about request semantics; forwarding is the router's job.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::warn;

use tapcast_common::protocol::RelayFrame;

/// Outbox handle for one relay connection.
///
/// Sends go through the connection's single-writer task, so a forward can
/// never race with the connection's own teardown: a cloned handle whose
/// receiver is gone simply fails to enqueue.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    /// Identity of the owning connection, used to guard removal.
    pub conn_id: u64,
    outbox: mpsc::Sender<RelayFrame>,
}

impl DeviceHandle {
    pub fn new(conn_id: u64, outbox: mpsc::Sender<RelayFrame>) -> Self {
        Self { conn_id, outbox }
    }

    /// Queue a frame for delivery without blocking.
    ///
    /// Returns false if the connection is gone or its outbox is full.
    pub fn try_send(&self, frame: RelayFrame) -> bool {
        self.outbox.try_send(frame).is_ok()
    }
}

/// Map of currently registered devices.
///
/// A device id is unique among live registrations; re-registering an id
/// silently replaces the prior mapping (last write wins, intentional).
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Arc<RwLock<HashMap<String, DeviceHandle>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the mapping for `id`. The prior holder, if any,
    /// is not notified. Returns true when an entry was replaced.
    pub async fn register(&self, id: &str, handle: DeviceHandle) -> bool {
        let replaced = self
            .devices
            .write()
            .await
            .insert(id.to_string(), handle)
            .is_some();
        if replaced {
            warn!("device id {} re-registered, replacing prior connection", id);
        }
        replaced
    }

    /// Look up the live handle for `id`, if any.
    pub async fn lookup(&self, id: &str) -> Option<DeviceHandle> {
        self.devices.read().await.get(id).cloned()
    }

    /// Remove the mapping for `id`, but only while it still belongs to
    /// `conn_id`. A connection that was replaced by a newer registration
    /// must not evict its replacement during late cleanup.
    pub async fn remove(&self, id: &str, conn_id: u64) -> bool {
        let mut devices = self.devices.write().await;
        match devices.get(id) {
            Some(handle) if handle.conn_id == conn_id => {
                devices.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Number of currently registered devices.
    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }
}
