//! Per-connection message routing.
//!
//! Each relay connection gets a reader loop (frames processed strictly in
//! arrival order for that connection) and a single-writer task fed by an
//! mpsc outbox. All sends to a device go through its outbox, so forwarding
//! never races with the target connection's own teardown.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tapcast_common::helpers::is_valid_device_id;
use tapcast_common::protocol::{from_line, to_line, ClientFrame, RelayFrame};

const OUTBOX_CAPACITY: usize = 64;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

use crate::registry::{DeviceHandle, DeviceRegistry};

/// Serve one relay connection until the peer disconnects.
pub async fn handle_connection(stream: TcpStream, addr: SocketAddr, registry: DeviceRegistry) {
    let conn_id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
    info!("connection accepted from {} (conn {})", addr, conn_id);

    let (read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<RelayFrame>(OUTBOX_CAPACITY);

    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(line) = to_line(&frame) else { continue };
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if write_half.write_all(b"\n").await.is_err() {
                break;
            }
        }
    });

    let mut registered: Option<String> = None;
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                debug!("read error from {}: {}", addr, err);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        // Malformed frames are logged and dropped; the connection stays open.
        let frame: ClientFrame = match from_line(&line) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("invalid frame from {}: {}", addr, err);
                continue;
            }
        };

        route_frame(frame, &mut registered, conn_id, &tx, &registry).await;
    }

    if let Some(id) = registered {
        if registry.remove(&id, conn_id).await {
            info!("device disconnected: {}", id);
        }
    }
    debug!("connection closed: {} (conn {})", addr, conn_id);
}

/// Apply one inbound frame: mutate the registry or forward to the target.
async fn route_frame(
    frame: ClientFrame,
    registered: &mut Option<String>,
    conn_id: u64,
    tx: &mpsc::Sender<RelayFrame>,
    registry: &DeviceRegistry,
) {
    match frame {
        ClientFrame::RegisterDevice { device_id } => {
            if !is_valid_device_id(&device_id) {
                reply_error(tx, format!("Invalid device id {device_id}")).await;
                return;
            }
            // One id per connection: re-registering drops the old binding.
            if let Some(old) = registered.take() {
                if old != device_id {
                    registry.remove(&old, conn_id).await;
                }
            }
            registry
                .register(&device_id, DeviceHandle::new(conn_id, tx.clone()))
                .await;
            info!("registered device: {}", device_id);
            *registered = Some(device_id);
        }

        ClientFrame::ConnectRequest {
            device_id,
            target_id,
        } => {
            // The requester names itself in the frame; that id becomes `from`.
            let delivered = forward(
                registry,
                &target_id,
                RelayFrame::IncomingRequest {
                    from: device_id.clone(),
                },
            )
            .await;
            if delivered {
                info!("forwarding CONNECT_REQUEST from {} to {}", device_id, target_id);
            } else {
                reply_error(tx, format!("Device {target_id} not found")).await;
            }
        }

        ClientFrame::ConnectAccept { target_id } => {
            let Some(from) = sender_id(registered, tx).await else {
                return;
            };
            let delivered =
                forward(registry, &target_id, RelayFrame::ConnectAccepted { from: from.clone() })
                    .await;
            if delivered {
                info!("forwarding CONNECT_ACCEPT from {} to {}", from, target_id);
            } else {
                reply_error(tx, format!("Device {target_id} not found")).await;
            }
        }

        ClientFrame::ConnectReject { target_id } => {
            let Some(from) = sender_id(registered, tx).await else {
                return;
            };
            let delivered =
                forward(registry, &target_id, RelayFrame::ConnectRejected { from: from.clone() })
                    .await;
            if delivered {
                info!("forwarding CONNECT_REJECT from {} to {}", from, target_id);
            } else {
                reply_error(tx, format!("Device {target_id} not found")).await;
            }
        }

        ClientFrame::Offer { target_id, offer } => {
            let Some(from) = sender_id(registered, tx).await else {
                return;
            };
            let delivered = forward(
                registry,
                &target_id,
                RelayFrame::Offer {
                    from: from.clone(),
                    offer,
                },
            )
            .await;
            if delivered {
                info!("forwarding OFFER from {} to {}", from, target_id);
            } else {
                reply_error(tx, format!("Device {target_id} not found")).await;
            }
        }

        ClientFrame::Answer { target_id, answer } => {
            let Some(from) = sender_id(registered, tx).await else {
                return;
            };
            let delivered = forward(
                registry,
                &target_id,
                RelayFrame::Answer {
                    from: from.clone(),
                    answer,
                },
            )
            .await;
            if delivered {
                info!("forwarding ANSWER from {} to {}", from, target_id);
            } else {
                reply_error(tx, format!("Device {target_id} not found")).await;
            }
        }

        ClientFrame::IceCandidate {
            target_id,
            candidate,
        } => {
            // High-frequency and non-fatal: an absent target is dropped
            // silently, and an unregistered sender gets no reply either.
            let Some(from) = registered.clone() else {
                debug!("dropping ICE_CANDIDATE from unregistered connection");
                return;
            };
            let delivered = forward(
                registry,
                &target_id,
                RelayFrame::IceCandidate { from, candidate },
            )
            .await;
            if !delivered {
                debug!("dropping ICE_CANDIDATE for absent target {}", target_id);
            }
        }
    }
}

/// Resolve the sender's registered id, replying with an error when the
/// connection never registered.
async fn sender_id(registered: &Option<String>, tx: &mpsc::Sender<RelayFrame>) -> Option<String> {
    match registered {
        Some(id) => Some(id.clone()),
        None => {
            reply_error(tx, "Register before signaling".to_string()).await;
            None
        }
    }
}

/// Look up the target and queue the frame on its outbox.
///
/// Returns false when the target is not registered. A registered target
/// whose outbox is full or torn down counts as delivered-to; the frame is
/// dropped with a warning, mirroring the no-peer-notification policy.
async fn forward(registry: &DeviceRegistry, target_id: &str, frame: RelayFrame) -> bool {
    match registry.lookup(target_id).await {
        Some(handle) => {
            if !handle.try_send(frame) {
                warn!("failed to queue frame for {}", target_id);
            }
            true
        }
        None => false,
    }
}

async fn reply_error(tx: &mpsc::Sender<RelayFrame>, message: String) {
    let _ = tx.send(RelayFrame::Error { message }).await;
}
