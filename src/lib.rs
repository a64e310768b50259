//! Component compatibility negotiation between a server and its clients.
//!
//! Before a connection is allowed to proceed the server offers the set of
//! components it declares, the client answers with its own, and each side
//! checks that everything the other marks as required is installed.
//!
//! Typical server flow:
//! 1. Build a [`NegotiationContext`] once at start-up from a
//!    [`NegotiationConfig`] and an [`Inventory`].
//! 2. For every connection entering configuration call
//!    [`configure_connection`] with a [`Transport`] for that connection.
//! 3. Feed the returned [`NegotiationSession`] the peer's response (or
//!    run it with [`driver::drive`]); it either completes the
//!    configuration task or disconnects the peer with a reason.
//!
//! ```
//! use std::sync::Arc;
//! use modsync::{
//!     merge_entries, ComponentEntry, CompatibilityVerifier, NegotiationState,
//!     Perspective, RequirementLevel, Role,
//! };
//!
//! let server = merge_entries(vec![
//!     ComponentEntry::new("fabric-api", "0.92.0", RequirementLevel::BothRequired)?,
//! ]);
//! let state = NegotiationState::awaiting_peer(Role::Server, Arc::new(server));
//! let verdict = CompatibilityVerifier::default().verify(&state, Perspective::AsPeer);
//! assert_eq!(
//!     verdict.reason(),
//!     Some("you are missing required component `fabric-api` (0.92.0)")
//! );
//! # Ok::<(), modsync::ModsyncError>(())
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod driver;
pub mod entry;
pub mod errors;
pub mod inventory;
pub mod isolation;
pub mod merge;
pub mod requirement;
pub mod session;
pub mod state;
pub mod verify;
pub mod wire;

pub use client::{answer_offer, ClientReply};
pub use config::NegotiationConfig;
pub use context::NegotiationContext;
pub use entry::{ComponentDecl, ComponentEntry, ComponentSet};
pub use errors::{ModsyncError, Result};
pub use inventory::{Inventory, Manifest, ManifestInventory, StaticInventory};
pub use merge::{merge, merge_entries};
pub use requirement::{RequirementLevel, Role};
pub use session::{
    configure_connection, NegotiationSession, PeerEvent, PeerInfo,
    SessionState, Transport,
};
pub use state::NegotiationState;
pub use verify::{
    CompatibilityVerifier, Mismatch, MismatchKind, Perspective, Side, Verdict,
    VersionPolicy, VersionPolicyKind,
};
pub use wire::ComponentPayload;

/// Version of the payload format exchanged during negotiation.
pub const PROTOCOL_VERSION: u32 = 1;

/// Channel the offer and response travel on.
pub const CHANNEL_ID: &str = "modsync:synchronize";

/// Key of the configuration task a session completes on success.
pub const SYNC_TASK_KEY: &str = CHANNEL_ID;
