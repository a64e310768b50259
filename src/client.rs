use std::sync::Arc;

use tracing::info;

use crate::context::NegotiationContext;
use crate::entry::ComponentSet;
use crate::errors::Result;
use crate::isolation::invoke_untrusted;
use crate::state::NegotiationState;
use crate::verify::{Perspective, Verdict};
use crate::wire::ComponentPayload;
use crate::PROTOCOL_VERSION;

/// What the answering side does with an offer.
#[derive(Clone, Debug)]
pub struct ClientReply {
    /// Framed payload carrying this side's canonical set, to be sent back.
    pub response: Vec<u8>,
    /// This side's own judgement of the pairing, phrased for local display.
    pub verdict: Verdict,
    pub offered: ComponentSet,
}

/// Answer an offer received from the server.
///
/// The response is produced even when the verdict is incompatible so the
/// server can report the mismatch from its side too.
pub fn answer_offer(ctx: &NegotiationContext, offer: &[u8]) -> Result<ClientReply> {
    let local = ctx.local_components()?;
    let response = ComponentPayload::new(&local).encode()?;

    invoke_untrusted("Received component list from server", || {
        let payload = ComponentPayload::decode(offer)?;
        if !payload.is_current_protocol() {
            return Ok(ClientReply {
                response,
                verdict: Verdict::Incompatible(format!(
                    "server speaks component negotiation protocol v{}, expected v{}",
                    payload.protocol_version, PROTOCOL_VERSION
                )),
                offered: ComponentSet::new(),
            });
        }

        let offered = Arc::new(payload.into_set());
        info!("Got component list from server: {}", offered.stringify());
        let state = NegotiationState::new(ctx.role(), local, offered.clone());
        let verdict = ctx.verifier().verify(&state, Perspective::AsLocal);
        Ok(ClientReply {
            response,
            verdict,
            offered: (*offered).clone(),
        })
    })
}
