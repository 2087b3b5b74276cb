//! Negotiation engine: description exchange and candidate ordering.
//!
//! Wraps the media capability and enforces the one ordering rule the
//! signaling protocol cannot: a remote candidate is never applied before
//! the remote description is set. Early arrivals are buffered and flushed
//! in arrival order the moment the description lands.

use std::collections::VecDeque;

use serde_json::Value;
use tracing::debug;

use tapcast_common::protocol::ControlCommand;
use tapcast_common::Result;

use crate::media::{ChannelState, MediaBackend};

/// Which side of the description exchange this device is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Offerer,
    Answerer,
}

pub struct Negotiator {
    backend: Box<dyn MediaBackend>,
    role: Option<Role>,
    remote_description_set: bool,
    pending_remote: VecDeque<Value>,
}

impl Negotiator {
    pub fn new(backend: Box<dyn MediaBackend>) -> Self {
        Self {
            backend,
            role: None,
            remote_description_set: false,
            pending_remote: VecDeque::new(),
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Number of remote candidates waiting for the remote description.
    pub fn pending_candidates(&self) -> usize {
        self.pending_remote.len()
    }

    /// Acquire the local capture source (host side).
    pub async fn acquire_media(&mut self) -> Result<()> {
        self.backend.acquire_media().await
    }

    /// Take the offerer role and produce the local description.
    pub async fn make_offer(&mut self) -> Result<Value> {
        self.role = Some(Role::Offerer);
        self.backend.create_offer().await
    }

    /// Take the answerer role: apply the remote offer, release any buffered
    /// candidates, and produce the answer.
    pub async fn accept_offer(&mut self, offer: Value) -> Result<Value> {
        self.role = Some(Role::Answerer);
        self.backend.set_remote_description(offer).await?;
        self.remote_description_set = true;
        self.flush_pending().await?;
        self.backend.create_answer().await
    }

    /// Offerer side: apply the remote answer and release buffered candidates.
    pub async fn accept_answer(&mut self, answer: Value) -> Result<()> {
        self.backend.set_remote_description(answer).await?;
        self.remote_description_set = true;
        self.flush_pending().await
    }

    /// Apply a remote candidate now, or buffer it until the remote
    /// description is set.
    pub async fn handle_remote_candidate(&mut self, candidate: Value) -> Result<()> {
        if self.remote_description_set {
            self.backend.add_ice_candidate(candidate).await
        } else {
            debug!("buffering remote candidate until description is set");
            self.pending_remote.push_back(candidate);
            Ok(())
        }
    }

    async fn flush_pending(&mut self) -> Result<()> {
        while let Some(candidate) = self.pending_remote.pop_front() {
            self.backend.add_ice_candidate(candidate).await?;
        }
        Ok(())
    }

    pub async fn send_control(&mut self, command: &ControlCommand) -> Result<()> {
        self.backend.send_control(command).await
    }

    pub fn control_state(&self) -> ChannelState {
        self.backend.control_state()
    }

    /// Tear down the peer path and forget negotiation state. Idempotent.
    pub async fn close(&mut self) {
        self.backend.close().await;
        self.pending_remote.clear();
        self.remote_description_set = false;
        self.role = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MockMediaBackend, MockMediaHandle, PeerEvent};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn negotiator() -> (Negotiator, MockMediaHandle, mpsc::Receiver<PeerEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let backend = MockMediaBackend::new(tx);
        let handle = backend.handle();
        (Negotiator::new(Box::new(backend)), handle, rx)
    }

    fn candidate(n: u32) -> Value {
        json!({ "candidate": format!("candidate:{n}") })
    }

    #[tokio::test]
    async fn test_early_candidates_flush_in_arrival_order() {
        let (mut neg, media, _rx) = negotiator();

        for n in 1..=3 {
            neg.handle_remote_candidate(candidate(n)).await.unwrap();
        }
        assert_eq!(neg.pending_candidates(), 3);
        assert!(media.lock().unwrap().applied_candidates.is_empty());

        neg.accept_offer(json!({"type": "offer", "sdp": "x"}))
            .await
            .unwrap();

        let applied = media.lock().unwrap().applied_candidates.clone();
        assert_eq!(applied, vec![candidate(1), candidate(2), candidate(3)]);
        assert_eq!(neg.pending_candidates(), 0);
    }

    #[tokio::test]
    async fn test_candidates_after_description_apply_immediately() {
        let (mut neg, media, _rx) = negotiator();

        neg.accept_offer(json!({"type": "offer", "sdp": "x"}))
            .await
            .unwrap();
        neg.handle_remote_candidate(candidate(7)).await.unwrap();

        let applied = media.lock().unwrap().applied_candidates.clone();
        assert_eq!(applied, vec![candidate(7)]);
        assert_eq!(neg.pending_candidates(), 0);
    }

    #[tokio::test]
    async fn test_no_candidate_is_dropped_or_duplicated() {
        let (mut neg, media, _rx) = negotiator();

        neg.handle_remote_candidate(candidate(1)).await.unwrap();
        neg.handle_remote_candidate(candidate(2)).await.unwrap();
        neg.accept_offer(json!({"type": "offer", "sdp": "x"}))
            .await
            .unwrap();
        neg.handle_remote_candidate(candidate(3)).await.unwrap();

        let applied = media.lock().unwrap().applied_candidates.clone();
        assert_eq!(applied, vec![candidate(1), candidate(2), candidate(3)]);
    }

    #[tokio::test]
    async fn test_roles_follow_description_direction() {
        let (mut neg, _media, _rx) = negotiator();
        assert_eq!(neg.role(), None);
        neg.make_offer().await.unwrap();
        assert_eq!(neg.role(), Some(Role::Offerer));

        let (mut neg, _media, _rx) = negotiator();
        neg.accept_offer(json!({"type": "offer", "sdp": "x"}))
            .await
            .unwrap();
        assert_eq!(neg.role(), Some(Role::Answerer));
    }

    #[tokio::test]
    async fn test_close_discards_buffered_candidates() {
        let (mut neg, media, _rx) = negotiator();

        neg.handle_remote_candidate(candidate(1)).await.unwrap();
        neg.handle_remote_candidate(candidate(2)).await.unwrap();
        neg.close().await;

        assert_eq!(neg.pending_candidates(), 0);
        assert_eq!(neg.role(), None);
        assert!(media.lock().unwrap().closed);
        assert!(media.lock().unwrap().applied_candidates.is_empty());

        // Closing twice has no additional effect.
        neg.close().await;
        assert_eq!(neg.pending_candidates(), 0);
    }

    #[tokio::test]
    async fn test_failed_description_surfaces_error() {
        let (mut neg, media, _rx) = negotiator();
        media.lock().unwrap().fail_remote_description = true;

        let err = neg
            .accept_offer(json!({"type": "offer", "sdp": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, tapcast_common::Error::Negotiation(_)));
    }
}
