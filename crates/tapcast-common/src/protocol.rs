//! Signaling wire protocol.
//!
//! Frames travel as line-delimited JSON over a persistent TCP connection,
//! one frame per line. Every frame is tagged by `type`; session descriptions
//! and ICE candidates are opaque JSON blobs forwarded verbatim by the relay.
//!
//! The schema is split by direction: [`ClientFrame`] is what a device sends
//! to the relay, [`RelayFrame`] is what the relay delivers to a device.
//! Unknown or malformed frames fail to parse and are discarded by the
//! receiver without terminating the connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Frames sent by a device to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    /// Bind this connection to a device id. Last write wins across connections.
    RegisterDevice { device_id: String },

    /// Ask `target_id` for a remote-control session. `device_id` identifies
    /// the requester and becomes the `from` of the forwarded request.
    ConnectRequest { device_id: String, target_id: String },

    /// Accept a pending request from `target_id`.
    ConnectAccept { target_id: String },

    /// Reject a pending request from `target_id`.
    ConnectReject { target_id: String },

    /// Session description offer (opaque blob).
    Offer { target_id: String, offer: Value },

    /// Session description answer (opaque blob).
    Answer { target_id: String, answer: Value },

    /// Trickled ICE candidate (opaque blob).
    IceCandidate { target_id: String, candidate: Value },
}

/// Frames delivered by the relay to a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum RelayFrame {
    /// Another device asked to control this one.
    IncomingRequest { from: String },

    /// The target accepted our connect request.
    ConnectAccepted { from: String },

    /// The target rejected our connect request.
    ConnectRejected { from: String },

    /// Session description offer from the peer.
    Offer { from: String, offer: Value },

    /// Session description answer from the peer.
    Answer { from: String, answer: Value },

    /// Trickled ICE candidate from the peer.
    IceCandidate { from: String, candidate: Value },

    /// Routing failure reported back to the sender.
    Error { message: String },
}

/// Commands carried over the peer-to-peer control channel once a session is
/// connected. Fire-and-forget: no acknowledgment, no ordering guarantee
/// beyond per-channel FIFO delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlCommand {
    /// A tap at coordinates normalized to the sender's rendered surface,
    /// both in `[0, 1]`.
    #[serde(rename = "TOUCH")]
    Touch { x: f64, y: f64 },
}

/// Serialize a frame to a single JSON line (without the trailing newline).
pub fn to_line<T: Serialize>(frame: &T) -> Result<String> {
    serde_json::to_string(frame).map_err(Error::serialization)
}

/// Parse a single JSON line into a frame.
pub fn from_line<'a, T: Deserialize<'a>>(line: &'a str) -> Result<T> {
    serde_json::from_str(line).map_err(Error::serialization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roundtrip_client(frame: ClientFrame) -> ClientFrame {
        from_line(&to_line(&frame).unwrap()).unwrap()
    }

    #[test]
    fn test_register_device_wire_format() {
        let line = to_line(&ClientFrame::RegisterDevice {
            device_id: "AB12CD".into(),
        })
        .unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(
            value,
            json!({"type": "REGISTER_DEVICE", "deviceId": "AB12CD"})
        );
    }

    #[test]
    fn test_connect_request_wire_format() {
        let line = to_line(&ClientFrame::ConnectRequest {
            device_id: "v1".into(),
            target_id: "h1".into(),
        })
        .unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(
            value,
            json!({"type": "CONNECT_REQUEST", "deviceId": "v1", "targetId": "h1"})
        );
    }

    #[test]
    fn test_incoming_request_parses_from_field() {
        let frame: RelayFrame = from_line(r#"{"type":"INCOMING_REQUEST","from":"v1"}"#).unwrap();
        assert_eq!(frame, RelayFrame::IncomingRequest { from: "v1".into() });
    }

    #[test]
    fn test_offer_blob_is_preserved_verbatim() {
        let offer = json!({"type": "offer", "sdp": "v=0\r\no=- 42 2 IN IP4 0.0.0.0"});
        let frame = roundtrip_client(ClientFrame::Offer {
            target_id: "h1".into(),
            offer: offer.clone(),
        });
        match frame {
            ClientFrame::Offer { offer: blob, .. } => assert_eq!(blob, offer),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_ice_candidate_wire_format() {
        let line = to_line(&RelayFrame::IceCandidate {
            from: "h1".into(),
            candidate: json!({"candidate": "candidate:0 1 udp 1 10.0.0.1 5000 typ host"}),
        })
        .unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "ICE_CANDIDATE");
        assert_eq!(value["from"], "h1");
        assert!(value["candidate"].is_object());
    }

    #[test]
    fn test_accept_reject_wire_format() {
        let accept = to_line(&ClientFrame::ConnectAccept {
            target_id: "v1".into(),
        })
        .unwrap();
        let value: Value = serde_json::from_str(&accept).unwrap();
        assert_eq!(value, json!({"type": "CONNECT_ACCEPT", "targetId": "v1"}));

        let rejected: RelayFrame =
            from_line(r#"{"type":"CONNECT_REJECTED","from":"h1"}"#).unwrap();
        assert_eq!(rejected, RelayFrame::ConnectRejected { from: "h1".into() });
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(from_line::<ClientFrame>(r#"{"type":"SELF_DESTRUCT"}"#).is_err());
        assert!(from_line::<RelayFrame>(r#"{"type":"BANANA","from":"x"}"#).is_err());
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        assert!(from_line::<ClientFrame>(r#"{"type":"CONNECT_REQUEST","deviceId":"v1"}"#).is_err());
        assert!(from_line::<ClientFrame>("not json at all").is_err());
    }

    #[test]
    fn test_touch_command_wire_format() {
        let line = to_line(&ControlCommand::Touch { x: 0.5, y: 0.25 }).unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value, json!({"type": "TOUCH", "x": 0.5, "y": 0.25}));

        let parsed: ControlCommand = from_line(&line).unwrap();
        assert_eq!(parsed, ControlCommand::Touch { x: 0.5, y: 0.25 });
    }
}
