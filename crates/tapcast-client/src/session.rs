//! Session state machine.
//!
//! One `Session` per device, driving a single negotiation at a time.
//! Inputs arrive as tagged values from the composing loop: relay frames,
//! media-stack events, and local operator commands. Outbound signaling
//! goes through an mpsc outbox drained by the connection's writer task;
//! session happenings surface through an explicit notification channel.
//!
//! State only ever moves forward within a negotiation; teardown returns to
//! `Idle` from any state and is idempotent. There are no automatic retries
//! and no protocol-level timeouts: aborting a stuck `Connecting` or
//! `Negotiating` session is the operator's `disconnect()`.

use tracing::{debug, info, warn};

use tapcast_common::error::{Error, Result};
use tapcast_common::protocol::{ClientFrame, ControlCommand, RelayFrame};
use tokio::sync::mpsc;

use crate::control::touch_to_screen;
use crate::input::InputInjector;
use crate::media::{ChannelState, PeerEvent};
use crate::negotiation::Negotiator;
use crate::types::Notification;

/// Lifecycle of a single negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Viewer side: request sent, awaiting accept/reject and then the offer.
    Connecting { target: String },
    /// Host side: a request arrived and awaits the operator's decision.
    AwaitingLocalAccept { from: String },
    /// Host side: offer sent, awaiting the answer.
    Negotiating { peer: String },
    Connected { peer: String },
}

pub struct Session {
    device_id: String,
    state: SessionState,
    negotiator: Negotiator,
    injector: Box<dyn InputInjector>,
    outbox: mpsc::Sender<ClientFrame>,
    notifications: mpsc::Sender<Notification>,
}

impl Session {
    pub fn new(
        device_id: impl Into<String>,
        negotiator: Negotiator,
        injector: Box<dyn InputInjector>,
        outbox: mpsc::Sender<ClientFrame>,
        notifications: mpsc::Sender<Notification>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            state: SessionState::Idle,
            negotiator,
            injector,
            outbox,
            notifications,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The peer this session is currently bound to, in any non-idle state
    /// that has one.
    fn current_peer(&self) -> Option<&str> {
        match &self.state {
            SessionState::Connecting { target } => Some(target),
            SessionState::Negotiating { peer } | SessionState::Connected { peer } => Some(peer),
            SessionState::Idle | SessionState::AwaitingLocalAccept { .. } => None,
        }
    }

    /// Viewer: ask `target` for a remote-control session.
    pub async fn connect(&mut self, target: &str) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(Error::protocol("a session is already in progress"));
        }
        self.send_frame(ClientFrame::ConnectRequest {
            device_id: self.device_id.clone(),
            target_id: target.to_string(),
        })
        .await?;
        info!("connect request sent to {}", target);
        self.state = SessionState::Connecting {
            target: target.to_string(),
        };
        Ok(())
    }

    /// Host: accept the pending request, acquire media, and send the offer.
    pub async fn accept(&mut self) -> Result<()> {
        let SessionState::AwaitingLocalAccept { from } = &self.state else {
            return Err(Error::protocol("no pending request to accept"));
        };
        let peer = from.clone();

        self.send_frame(ClientFrame::ConnectAccept {
            target_id: peer.clone(),
        })
        .await?;

        // Capture failure stays local: the requester observes silence.
        if let Err(err) = self.negotiator.acquire_media().await {
            self.teardown().await;
            return Err(err);
        }

        let offer = match self.negotiator.make_offer().await {
            Ok(offer) => offer,
            Err(err) => {
                self.teardown().await;
                return Err(err);
            }
        };
        self.send_frame(ClientFrame::Offer {
            target_id: peer.clone(),
            offer,
        })
        .await?;
        info!("offer sent to {}", peer);
        self.state = SessionState::Negotiating { peer };
        Ok(())
    }

    /// Host: reject the pending request.
    pub async fn reject(&mut self) -> Result<()> {
        let SessionState::AwaitingLocalAccept { from } = &self.state else {
            return Err(Error::protocol("no pending request to reject"));
        };
        let peer = from.clone();
        self.send_frame(ClientFrame::ConnectReject { target_id: peer }).await?;
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Apply one frame delivered by the relay.
    pub async fn handle_frame(&mut self, frame: RelayFrame) -> Result<()> {
        match frame {
            RelayFrame::IncomingRequest { from } => {
                if self.state == SessionState::Idle {
                    info!("incoming request from {}", from);
                    self.state = SessionState::AwaitingLocalAccept { from: from.clone() };
                    self.notify(Notification::IncomingRequest { from }).await;
                } else {
                    // Single-session device: a second requester is turned
                    // away without disturbing the active negotiation.
                    debug!("busy, auto-rejecting request from {}", from);
                    self.send_frame(ClientFrame::ConnectReject { target_id: from })
                        .await?;
                }
            }

            RelayFrame::ConnectAccepted { from } => match &self.state {
                SessionState::Connecting { target } if *target == from => {
                    info!("request accepted by {}, awaiting offer", from);
                }
                _ => debug!("ignoring CONNECT_ACCEPTED from {}", from),
            },

            RelayFrame::ConnectRejected { from } => match &self.state {
                SessionState::Connecting { target } if *target == from => {
                    info!("request rejected by {}", from);
                    self.teardown().await;
                    self.notify(Notification::Rejected { by: from }).await;
                }
                _ => debug!("ignoring CONNECT_REJECTED from {}", from),
            },

            RelayFrame::Offer { from, offer } => match &self.state {
                SessionState::Connecting { target } if *target == from => {
                    match self.negotiator.accept_offer(offer).await {
                        Ok(answer) => {
                            self.send_frame(ClientFrame::Answer {
                                target_id: from.clone(),
                                answer,
                            })
                            .await?;
                            info!("answer sent, session with {} connected", from);
                            self.state = SessionState::Connected { peer: from.clone() };
                            self.notify(Notification::Connected { peer: from }).await;
                        }
                        Err(err) => self.fail(format!("offer handling failed: {err}")).await,
                    }
                }
                _ => warn!("ignoring unsolicited OFFER from {}", from),
            },

            RelayFrame::Answer { from, answer } => match &self.state {
                SessionState::Negotiating { peer } if *peer == from => {
                    match self.negotiator.accept_answer(answer).await {
                        Ok(()) => {
                            info!("answer applied, session with {} connected", from);
                            self.state = SessionState::Connected { peer: from.clone() };
                            self.notify(Notification::Connected { peer: from }).await;
                        }
                        Err(err) => self.fail(format!("answer handling failed: {err}")).await,
                    }
                }
                _ => warn!("ignoring unsolicited ANSWER from {}", from),
            },

            RelayFrame::IceCandidate { from, candidate } => {
                if self.current_peer() == Some(from.as_str()) {
                    if let Err(err) = self.negotiator.handle_remote_candidate(candidate).await {
                        self.fail(format!("candidate rejected: {err}")).await;
                    }
                } else {
                    debug!("dropping candidate from non-peer {}", from);
                }
            }

            RelayFrame::Error { message } => {
                warn!("relay error: {}", message);
                // A routing failure mid-handshake strands the session; the
                // caller decides whether to retry with a fresh connect.
                if matches!(
                    self.state,
                    SessionState::Connecting { .. } | SessionState::Negotiating { .. }
                ) {
                    self.teardown().await;
                }
                self.notify(Notification::RelayError { message }).await;
            }
        }
        Ok(())
    }

    /// Apply one event from the media stack.
    pub async fn handle_peer_event(&mut self, event: PeerEvent) -> Result<()> {
        match event {
            PeerEvent::LocalCandidate(candidate) => match self.current_peer() {
                Some(peer) => {
                    self.send_frame(ClientFrame::IceCandidate {
                        target_id: peer.to_string(),
                        candidate,
                    })
                    .await?;
                }
                None => debug!("dropping local candidate: no active peer"),
            },

            PeerEvent::ControlOpen => info!("control channel open"),

            PeerEvent::ControlClosed => {
                if matches!(self.state, SessionState::Connected { .. }) {
                    info!("control channel closed, tearing down session");
                    self.teardown().await;
                    self.notify(Notification::Disconnected).await;
                }
            }

            PeerEvent::Control(command) => {
                // Host side: only honored while the channel reports open.
                if matches!(self.state, SessionState::Connected { .. })
                    && self.negotiator.control_state() == ChannelState::Open
                {
                    let (width, height) = self.injector.screen_size();
                    let (x, y) = touch_to_screen(&command, width, height);
                    if let Err(err) = self.injector.tap(x, y) {
                        // Injection failure is local-only and non-fatal.
                        warn!("input injection failed: {}", err);
                    }
                } else {
                    warn!("dropping control command: channel not open");
                }
            }
        }
        Ok(())
    }

    /// Viewer: send a TOUCH command, fire-and-forget.
    ///
    /// Dropped locally (with a log line) unless the session is connected
    /// and the control channel reports open; never queued.
    pub async fn send_touch(&mut self, command: ControlCommand) -> Result<()> {
        if !matches!(self.state, SessionState::Connected { .. })
            || self.negotiator.control_state() != ChannelState::Open
        {
            warn!("dropping TOUCH: control channel not open");
            return Ok(());
        }
        if let Err(err) = self.negotiator.send_control(&command).await {
            warn!("control send failed: {}", err);
        }
        Ok(())
    }

    /// Tear the session down and return to idle. Safe to call repeatedly.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.state == SessionState::Idle {
            return Ok(());
        }
        info!("disconnecting session");
        self.teardown().await;
        self.notify(Notification::Disconnected).await;
        Ok(())
    }

    async fn teardown(&mut self) {
        self.negotiator.close().await;
        self.state = SessionState::Idle;
    }

    async fn fail(&mut self, reason: String) {
        warn!("session failed: {}", reason);
        self.teardown().await;
        self.notify(Notification::SessionFailed { reason }).await;
    }

    async fn send_frame(&self, frame: ClientFrame) -> Result<()> {
        self.outbox
            .send(frame)
            .await
            .map_err(|_| Error::channel_closed("signaling writer is gone"))
    }

    async fn notify(&self, notification: Notification) {
        let _ = self.notifications.send(notification).await;
    }
}
