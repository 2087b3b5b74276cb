//! Media capability seam.
//!
//! The platform's WebRTC-equivalent stack (capture, description generation,
//! candidate application, the data channel) sits behind [`MediaBackend`].
//! Asynchronous happenings (locally discovered candidates, channel status,
//! inbound control commands) flow back as tagged [`PeerEvent`]s through an
//! mpsc channel handed to the backend at construction, so a single consumer
//! can own all dispatch.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use tapcast_common::error::{Error, Result};
use tapcast_common::protocol::ControlCommand;

/// Status of the peer-to-peer control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Connecting,
    Open,
    Closed,
}

/// Events originating from the media stack.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// A locally discovered ICE candidate, ready to trickle to the peer.
    LocalCandidate(Value),
    /// The control channel became usable.
    ControlOpen,
    /// The control channel (or the whole peer path) went away.
    ControlClosed,
    /// A control command received from the peer.
    Control(ControlCommand),
}

/// Platform media stack, out of scope beyond this seam.
///
/// All operations may be slow and may fail; descriptions and candidates are
/// opaque blobs produced and consumed only by the backend itself.
#[async_trait]
pub trait MediaBackend: Send {
    /// Acquire the local capture source (host side, before offering).
    async fn acquire_media(&mut self) -> Result<()>;

    /// Produce a session description offer.
    async fn create_offer(&mut self) -> Result<Value>;

    /// Produce a session description answer to the applied remote offer.
    async fn create_answer(&mut self) -> Result<Value>;

    /// Apply the peer's session description.
    async fn set_remote_description(&mut self, description: Value) -> Result<()>;

    /// Apply a remote ICE candidate. Callers must have applied the remote
    /// description first.
    async fn add_ice_candidate(&mut self, candidate: Value) -> Result<()>;

    /// Send a control command over the data channel.
    async fn send_control(&mut self, command: &ControlCommand) -> Result<()>;

    /// Current control channel status.
    fn control_state(&self) -> ChannelState;

    /// Tear down capture and the peer path. Idempotent.
    async fn close(&mut self);
}

/// Inspectable state of [`MockMediaBackend`].
#[derive(Debug, Default)]
pub struct MockMediaState {
    pub media_acquired: bool,
    pub local_description: Option<Value>,
    pub remote_description: Option<Value>,
    pub applied_candidates: Vec<Value>,
    pub sent_commands: Vec<ControlCommand>,
    pub control_state: ChannelState,
    pub closed: bool,

    // Failure injection for exercising abort paths.
    pub fail_acquire: bool,
    pub fail_offer: bool,
    pub fail_answer: bool,
    pub fail_remote_description: bool,
    pub fail_candidate: bool,
}

/// Shared handle onto a mock backend's state.
pub type MockMediaHandle = Arc<Mutex<MockMediaState>>;

/// Deterministic in-process media stack.
///
/// Produces fake description blobs, trickles one candidate per local
/// description, and reports the control channel open once both descriptions
/// are applied. Used by the demo binary and the test suite; real capture
/// and transport live outside this repository.
pub struct MockMediaBackend {
    state: MockMediaHandle,
    events: mpsc::Sender<PeerEvent>,
    candidate_seq: u32,
}

impl MockMediaBackend {
    pub fn new(events: mpsc::Sender<PeerEvent>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockMediaState::default())),
            events,
            candidate_seq: 0,
        }
    }

    /// Clone the shared state handle for later inspection.
    pub fn handle(&self) -> MockMediaHandle {
        self.state.clone()
    }

    fn trickle_candidate(&mut self) {
        self.candidate_seq += 1;
        let candidate = json!({ "candidate": format!("mock:{}", self.candidate_seq) });
        let _ = self.events.try_send(PeerEvent::LocalCandidate(candidate));
    }

    fn maybe_open(&self) {
        let mut state = self.state.lock().unwrap();
        if state.local_description.is_some()
            && state.remote_description.is_some()
            && state.control_state == ChannelState::Connecting
        {
            state.control_state = ChannelState::Open;
            let _ = self.events.try_send(PeerEvent::ControlOpen);
        }
    }
}

#[async_trait]
impl MediaBackend for MockMediaBackend {
    async fn acquire_media(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_acquire {
            return Err(Error::capability("screen capture unavailable"));
        }
        state.media_acquired = true;
        Ok(())
    }

    async fn create_offer(&mut self) -> Result<Value> {
        {
            let mut state = self.state.lock().unwrap();
            if state.fail_offer {
                return Err(Error::negotiation("offer generation failed"));
            }
            let offer = json!({"type": "offer", "sdp": "mock-offer"});
            state.local_description = Some(offer);
        }
        self.trickle_candidate();
        self.maybe_open();
        let state = self.state.lock().unwrap();
        Ok(state.local_description.clone().unwrap_or(Value::Null))
    }

    async fn create_answer(&mut self) -> Result<Value> {
        {
            let mut state = self.state.lock().unwrap();
            if state.fail_answer {
                return Err(Error::negotiation("answer generation failed"));
            }
            if state.remote_description.is_none() {
                return Err(Error::negotiation("answer requested before remote offer"));
            }
            let answer = json!({"type": "answer", "sdp": "mock-answer"});
            state.local_description = Some(answer);
        }
        self.trickle_candidate();
        self.maybe_open();
        let state = self.state.lock().unwrap();
        Ok(state.local_description.clone().unwrap_or(Value::Null))
    }

    async fn set_remote_description(&mut self, description: Value) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if state.fail_remote_description {
                return Err(Error::negotiation("remote description rejected"));
            }
            state.remote_description = Some(description);
        }
        self.maybe_open();
        Ok(())
    }

    async fn add_ice_candidate(&mut self, candidate: Value) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_candidate {
            return Err(Error::negotiation("candidate rejected"));
        }
        if state.remote_description.is_none() {
            return Err(Error::negotiation("candidate applied before remote description"));
        }
        state.applied_candidates.push(candidate);
        Ok(())
    }

    async fn send_control(&mut self, command: &ControlCommand) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.control_state != ChannelState::Open {
            return Err(Error::channel_closed("control channel not open"));
        }
        state.sent_commands.push(command.clone());
        Ok(())
    }

    fn control_state(&self) -> ChannelState {
        self.state.lock().unwrap().control_state
    }

    async fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.control_state = ChannelState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_opens_after_both_descriptions() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut backend = MockMediaBackend::new(tx);

        backend
            .set_remote_description(json!({"type": "offer", "sdp": "x"}))
            .await
            .unwrap();
        assert_eq!(backend.control_state(), ChannelState::Connecting);

        backend.create_answer().await.unwrap();
        assert_eq!(backend.control_state(), ChannelState::Open);

        // One trickled candidate, then the open notification.
        assert!(matches!(rx.try_recv().unwrap(), PeerEvent::LocalCandidate(_)));
        assert!(matches!(rx.try_recv().unwrap(), PeerEvent::ControlOpen));
    }

    #[tokio::test]
    async fn test_candidate_requires_remote_description() {
        let (tx, _rx) = mpsc::channel(8);
        let mut backend = MockMediaBackend::new(tx);

        let err = backend
            .add_ice_candidate(json!({"candidate": "c"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Negotiation(_)));
    }

    #[tokio::test]
    async fn test_control_send_requires_open_channel() {
        let (tx, _rx) = mpsc::channel(8);
        let mut backend = MockMediaBackend::new(tx);

        let err = backend
            .send_control(&ControlCommand::Touch { x: 0.5, y: 0.5 })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ChannelClosed(_)));
    }
}
