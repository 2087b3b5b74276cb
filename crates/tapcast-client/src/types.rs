//! Shared client-side types.

/// Configuration for one device-side session engine.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Relay address, `host:port`.
    pub relay_addr: String,
    /// Short device id shown to peers.
    pub device_id: String,
    /// Host screen resolution taps are injected into.
    pub screen: (u32, u32),
    /// Viewer render-surface size taps are normalized against.
    pub surface: (f64, f64),
}

/// Session happenings surfaced to the composing layer.
///
/// Every user-visible failure arrives here explicitly; the only deliberate
/// silence in the protocol is an ICE candidate routed to an absent target.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Another device asked to control this one.
    IncomingRequest { from: String },
    /// Our connect request was rejected by the target's operator.
    Rejected { by: String },
    /// Negotiation finished; the peer-to-peer path is up.
    Connected { peer: String },
    /// The session was torn down.
    Disconnected,
    /// The relay reported a routing failure (typically "peer not found").
    RelayError { message: String },
    /// Negotiation or a local capability failed; the session returned to idle.
    SessionFailed { reason: String },
}
