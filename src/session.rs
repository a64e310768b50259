//! Per-connection negotiation.
//!
//! A [`NegotiationSession`] walks `Idle -> Offered -> AwaitingResponse`
//! and ends in `Verified` or `Disconnected`. It never does I/O itself: the
//! host hands it a [`Transport`] and feeds it [`PeerEvent`]s.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::NegotiationContext;
use crate::entry::ComponentSet;
use crate::errors::Result;
use crate::isolation::invoke_untrusted;
use crate::state::NegotiationState;
use crate::verify::{Perspective, Verdict};
use crate::wire::ComponentPayload;
use crate::{PROTOCOL_VERSION, SYNC_TASK_KEY};

/// Reason sent to a peer whose data could not be processed.
pub const INTERNAL_ERROR_REASON: &str = "internal verification error";

/// Reason recorded when the transport reports the connection gone.
pub const CONNECTION_CLOSED_REASON: &str = "connection closed";

/// Connection-side operations the session relies on. Owned by the host.
pub trait Transport {
    /// Whether the peer understands the negotiation channel.
    fn can_send_offer(&self) -> bool;
    fn send_offer(&mut self, frame: Vec<u8>) -> Result<()>;
    fn disconnect(&mut self, reason: &str);
    /// Tells the host's configuration pipeline the step named `key` is done.
    fn complete_task(&mut self, key: &str);
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn can_send_offer(&self) -> bool {
        (**self).can_send_offer()
    }

    fn send_offer(&mut self, frame: Vec<u8>) -> Result<()> {
        (**self).send_offer(frame)
    }

    fn disconnect(&mut self, reason: &str) {
        (**self).disconnect(reason)
    }

    fn complete_task(&mut self, key: &str) {
        (**self).complete_task(key)
    }
}

/// Who is on the other end, for logs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    pub name: String,
    pub address: String,
}

impl PeerInfo {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.address)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Offered,
    AwaitingResponse,
    Verified,
    Disconnected(String),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Verified | SessionState::Disconnected(_))
    }
}

/// Signals the transport delivers while a session waits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerEvent {
    Response(Vec<u8>),
    Terminated,
}

pub struct NegotiationSession {
    ctx: Arc<NegotiationContext>,
    peer: PeerInfo,
    local: Option<Arc<ComponentSet>>,
    state: SessionState,
}

impl fmt::Debug for NegotiationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiationSession")
            .field("peer", &self.peer)
            .field("state", &self.state)
            .finish()
    }
}

impl NegotiationSession {
    pub fn new(ctx: Arc<NegotiationContext>, peer: PeerInfo) -> Self {
        Self {
            ctx,
            peer,
            local: None,
            state: SessionState::Idle,
        }
    }

    pub fn peer(&self) -> &PeerInfo {
        &self.peer
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Start negotiating with a peer that just entered configuration.
    ///
    /// Sends the offer when the peer supports it. Otherwise decides right
    /// away from the early pass, which treats the peer's set as empty.
    pub fn begin<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> &SessionState {
        if self.state != SessionState::Idle {
            warn!("Negotiation with {} already started", self.peer);
            return &self.state;
        }

        let local = match self.ctx.local_components() {
            Ok(local) => local,
            Err(e) => {
                warn!("Could not assemble local component set: {}", e);
                self.disconnect(transport, INTERNAL_ERROR_REASON.to_owned());
                return &self.state;
            }
        };
        self.local = Some(local.clone());

        if !transport.can_send_offer() {
            self.reject_or_tolerate(transport, local);
            return &self.state;
        }

        self.state = SessionState::Offered;
        info!("Sending component list to {}", self.peer);
        let sent = ComponentPayload::new(&local)
            .encode()
            .and_then(|frame| transport.send_offer(frame));
        match sent {
            Ok(()) => self.state = SessionState::AwaitingResponse,
            Err(e) => {
                warn!("Failed to send component list to {}: {}", self.peer, e);
                self.disconnect(transport, INTERNAL_ERROR_REASON.to_owned());
            }
        }
        &self.state
    }

    pub fn handle<T: Transport + ?Sized>(
        &mut self,
        event: PeerEvent,
        transport: &mut T,
    ) -> &SessionState {
        match event {
            PeerEvent::Response(frame) => self.on_response(&frame, transport),
            PeerEvent::Terminated => self.on_terminated(),
        }
    }

    /// Verify the peer's declared set and settle the session.
    pub fn on_response<T: Transport + ?Sized>(
        &mut self,
        frame: &[u8],
        transport: &mut T,
    ) -> &SessionState {
        let local = match (&self.state, &self.local) {
            (SessionState::AwaitingResponse, Some(local)) => local.clone(),
            _ => {
                warn!(
                    "Ignoring component list from {} while {:?}",
                    self.peer, self.state
                );
                return &self.state;
            }
        };

        let ctx = &self.ctx;
        let peer = &self.peer;
        let label = format!("Received component list from {}", peer);
        let verdict = invoke_untrusted(&label, || {
            let payload = ComponentPayload::decode(frame)?;
            if !payload.is_current_protocol() {
                return Ok(Verdict::Incompatible(format!(
                    "peer speaks component negotiation protocol v{}, expected v{}",
                    payload.protocol_version, PROTOCOL_VERSION
                )));
            }
            let state = NegotiationState::new(
                ctx.role(),
                local,
                Arc::new(payload.into_set()),
            );
            info!(
                "Got component list from {}: {}",
                peer,
                state.peer().stringify()
            );
            Ok(ctx.verifier().verify(&state, Perspective::AsPeer))
        });

        match verdict {
            Ok(Verdict::Compatible) => self.verified(transport),
            Ok(Verdict::Incompatible(reason)) => {
                self.disconnect(transport, reason)
            }
            Err(_) => {
                self.disconnect(transport, INTERNAL_ERROR_REASON.to_owned())
            }
        }
        &self.state
    }

    /// The transport closed the connection; nothing is sent back.
    pub fn on_terminated(&mut self) -> &SessionState {
        if !self.is_finished() {
            debug!("Connection to {} closed during negotiation", self.peer);
            self.state =
                SessionState::Disconnected(CONNECTION_CLOSED_REASON.to_owned());
        }
        &self.state
    }

    fn reject_or_tolerate<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        local: Arc<ComponentSet>,
    ) {
        warn!(
            "{} does not appear to support component negotiation",
            self.peer
        );
        if self.ctx.config().allow_unrecognized_peers {
            warn!(
                "Connection to {} has been force permitted by configuration. \
                 Their installed components were not checked!",
                self.peer
            );
            self.verified(transport);
            return;
        }

        let state = NegotiationState::awaiting_peer(self.ctx.role(), local);
        match self.ctx.verifier().verify(&state, Perspective::AsPeer) {
            Verdict::Compatible => {
                warn!(
                    "Nothing is required of {}, allowing the connection",
                    self.peer
                );
                self.verified(transport);
            }
            Verdict::Incompatible(reason) => self.disconnect(
                transport,
                format!("peer does not support component negotiation: {}", reason),
            ),
        }
    }

    fn verified<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        info!("Negotiation with {} succeeded", self.peer);
        self.state = SessionState::Verified;
        transport.complete_task(SYNC_TASK_KEY);
    }

    fn disconnect<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        reason: String,
    ) {
        warn!("Disconnecting {}: {}", self.peer, reason);
        transport.disconnect(&reason);
        self.state = SessionState::Disconnected(reason);
    }
}

/// Entry point for a connection entering configuration.
///
/// Returns `None` when negotiation is disabled; the connection proceeds
/// without a session.
pub fn configure_connection<T: Transport + ?Sized>(
    ctx: &Arc<NegotiationContext>,
    peer: PeerInfo,
    transport: &mut T,
) -> Option<NegotiationSession> {
    if !ctx.is_enabled() {
        debug!("Component negotiation disabled, skipping {}", peer);
        return None;
    }
    let mut session = NegotiationSession::new(ctx.clone(), peer);
    session.begin(transport);
    Some(session)
}
