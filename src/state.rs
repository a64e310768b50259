use std::sync::Arc;

use crate::entry::ComponentSet;
use crate::requirement::Role;

/// Snapshot of the two declared sets compared by one verification.
///
/// Built once per negotiation attempt and never mutated. Sets are shared
/// behind `Arc` so the cached local set is not copied per connection.
#[derive(Clone, Debug)]
pub struct NegotiationState {
    local_role: Role,
    local: Arc<ComponentSet>,
    peer: Arc<ComponentSet>,
}

impl NegotiationState {
    pub fn new(
        local_role: Role,
        local: Arc<ComponentSet>,
        peer: Arc<ComponentSet>,
    ) -> Self {
        Self {
            local_role,
            local,
            peer,
        }
    }

    /// State used before the peer has declared anything: its side is
    /// treated as empty.
    pub fn awaiting_peer(local_role: Role, local: Arc<ComponentSet>) -> Self {
        Self::new(local_role, local, Arc::new(ComponentSet::new()))
    }

    pub fn local_role(&self) -> Role {
        self.local_role
    }

    pub fn peer_role(&self) -> Role {
        self.local_role.counterpart()
    }

    pub fn local(&self) -> &ComponentSet {
        &self.local
    }

    pub fn peer(&self) -> &ComponentSet {
        &self.peer
    }
}
