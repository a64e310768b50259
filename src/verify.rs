//! Comparison of two declared component sets.
//!
//! Every entry one side declares as required on the other side must be
//! installed there, at a version the configured [`VersionPolicy`] accepts.
//! Detection is symmetric; the [`Perspective`] only decides who "you" is
//! in the resulting reason.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entry::{ComponentEntry, ComponentSet};
use crate::requirement::{RequirementLevel, Role};
use crate::state::NegotiationState;

/// Whose point of view the verdict's reason is phrased from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Perspective {
    AsLocal,
    AsPeer,
}

/// Outcome of a verification. Incompatibility is a value, not an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Compatible,
    Incompatible(String),
}

impl Verdict {
    pub fn is_compatible(&self) -> bool {
        matches!(self, Verdict::Compatible)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Compatible => None,
            Verdict::Incompatible(reason) => Some(reason),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Compatible => write!(f, "compatible"),
            Verdict::Incompatible(reason) => {
                write!(f, "incompatible: {}", reason)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    Local,
    Peer,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MismatchKind {
    Missing,
    Version { found: String },
}

/// A required component that is absent, or present at an unacceptable
/// version, on one side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mismatch {
    pub id: String,
    pub required_version: String,
    pub requirement: RequirementLevel,
    pub lacking: Side,
    pub kind: MismatchKind,
}

impl Mismatch {
    fn describe(&self, perspective: Perspective) -> String {
        let you = matches!(
            (self.lacking, perspective),
            (Side::Local, Perspective::AsLocal)
                | (Side::Peer, Perspective::AsPeer)
        );
        match &self.kind {
            MismatchKind::Missing => format!(
                "{} missing required component `{}` ({})",
                if you { "you are" } else { "the other side is" },
                self.id,
                self.required_version
            ),
            MismatchKind::Version { found } => format!(
                "{} component `{}` {} but {} is required",
                if you { "you have" } else { "the other side has" },
                self.id,
                found,
                self.required_version
            ),
        }
    }
}

/// Decides whether an installed version satisfies a declared one.
pub trait VersionPolicy: Send + Sync + fmt::Debug {
    fn accepts(
        &self,
        declared: &ComponentEntry,
        installed: &ComponentEntry,
    ) -> bool;
}

/// Any installed version is acceptable.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnyVersion;

impl VersionPolicy for AnyVersion {
    fn accepts(&self, _: &ComponentEntry, _: &ComponentEntry) -> bool {
        true
    }
}

/// Versions must match exactly.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExactVersion;

impl VersionPolicy for ExactVersion {
    fn accepts(
        &self,
        declared: &ComponentEntry,
        installed: &ComponentEntry,
    ) -> bool {
        declared.version() == installed.version()
    }
}

/// Configurable selector for the built-in policies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionPolicyKind {
    #[default]
    Any,
    Exact,
}

impl VersionPolicyKind {
    pub fn policy(self) -> Arc<dyn VersionPolicy> {
        match self {
            VersionPolicyKind::Any => Arc::new(AnyVersion),
            VersionPolicyKind::Exact => Arc::new(ExactVersion),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CompatibilityVerifier {
    policy: Arc<dyn VersionPolicy>,
}

impl Default for CompatibilityVerifier {
    fn default() -> Self {
        Self::new(Arc::new(AnyVersion))
    }
}

impl CompatibilityVerifier {
    pub fn new(policy: Arc<dyn VersionPolicy>) -> Self {
        Self { policy }
    }

    /// Every unmet requirement in `state`, ordered by the side lacking it
    /// and then by identity.
    pub fn mismatches(&self, state: &NegotiationState) -> Vec<Mismatch> {
        let mut found = Vec::new();
        self.collect(
            state.peer(),
            state.local(),
            state.local_role(),
            Side::Local,
            &mut found,
        );
        self.collect(
            state.local(),
            state.peer(),
            state.peer_role(),
            Side::Peer,
            &mut found,
        );
        found.sort_by(|a, b| (a.lacking, &a.id).cmp(&(b.lacking, &b.id)));
        found
    }

    pub fn verify(
        &self,
        state: &NegotiationState,
        perspective: Perspective,
    ) -> Verdict {
        let mismatches = self.mismatches(state);
        if mismatches.is_empty() {
            return Verdict::Compatible;
        }
        Verdict::Incompatible(
            mismatches
                .iter()
                .map(|m| m.describe(perspective))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    fn collect(
        &self,
        declared: &ComponentSet,
        installed: &ComponentSet,
        installed_role: Role,
        lacking: Side,
        out: &mut Vec<Mismatch>,
    ) {
        for wanted in declared
            .iter()
            .filter(|e| e.requirement().required_on(installed_role))
        {
            let kind = match installed.get(wanted.id()) {
                None => MismatchKind::Missing,
                Some(present) if !self.policy.accepts(wanted, present) => {
                    MismatchKind::Version {
                        found: present.version().to_owned(),
                    }
                }
                Some(_) => continue,
            };
            out.push(Mismatch {
                id: wanted.id().to_owned(),
                required_version: wanted.version().to_owned(),
                requirement: wanted.requirement(),
                lacking,
                kind,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge_entries;
    use crate::requirement::RequirementLevel::{self, *};
    use proptest::prelude::*;
    use rstest::rstest;

    fn set(entries: &[(&str, &str, RequirementLevel)]) -> Arc<ComponentSet> {
        Arc::new(merge_entries(
            entries
                .iter()
                .map(|(id, v, l)| ComponentEntry::new(*id, *v, *l).unwrap()),
        ))
    }

    fn server_state(
        local: &[(&str, &str, RequirementLevel)],
        peer: &[(&str, &str, RequirementLevel)],
    ) -> NegotiationState {
        NegotiationState::new(Role::Server, set(local), set(peer))
    }

    #[test]
    fn peer_component_required_on_either_must_exist_locally() {
        let state = server_state(
            &[("a", "1", BothRequired), ("b", "1", Optional)],
            &[("a", "1", Optional), ("c", "1", RequiredOnEither)],
        );
        let verdict = CompatibilityVerifier::default()
            .verify(&state, Perspective::AsLocal);

        let reason = verdict.reason().unwrap();
        assert!(reason.contains("`c`"));
        assert!(!reason.contains("`a`"));
        assert!(!reason.contains("`b`"));
    }

    #[rstest]
    #[case(BothRequired, false)]
    #[case(RequiredOnClient, false)]
    #[case(RequiredOnEither, false)]
    #[case(RequiredOnServer, true)]
    #[case(Optional, true)]
    fn server_requirement_against_client_without_it(
        #[case] level: RequirementLevel,
        #[case] compatible: bool,
    ) {
        let state = server_state(&[("lithium", "1", level)], &[]);
        let verdict = CompatibilityVerifier::default()
            .verify(&state, Perspective::AsPeer);
        assert_eq!(verdict.is_compatible(), compatible);
    }

    #[rstest]
    #[case(BothRequired, false)]
    #[case(RequiredOnServer, false)]
    #[case(RequiredOnEither, false)]
    #[case(RequiredOnClient, true)]
    #[case(Optional, true)]
    fn client_requirement_against_server_without_it(
        #[case] level: RequirementLevel,
        #[case] compatible: bool,
    ) {
        let state = server_state(&[], &[("lithium", "1", level)]);
        let verdict = CompatibilityVerifier::default()
            .verify(&state, Perspective::AsLocal);
        assert_eq!(verdict.is_compatible(), compatible);
    }

    #[test]
    fn reports_every_mismatch() {
        let state = server_state(
            &[("x", "1", BothRequired), ("y", "2", RequiredOnClient)],
            &[("z", "3", RequiredOnServer)],
        );
        let verifier = CompatibilityVerifier::default();
        let ids: Vec<_> = verifier
            .mismatches(&state)
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["z", "x", "y"]);

        assert_eq!(
            verifier.verify(&state, Perspective::AsPeer),
            Verdict::Incompatible(
                "the other side is missing required component `z` (3); \
                 you are missing required component `x` (1); \
                 you are missing required component `y` (2)"
                    .to_owned()
            )
        );
    }

    #[test]
    fn perspective_only_changes_phrasing() {
        let state = server_state(&[("x", "1", BothRequired)], &[]);
        let verifier = CompatibilityVerifier::default();

        let as_local = verifier.verify(&state, Perspective::AsLocal);
        let as_peer = verifier.verify(&state, Perspective::AsPeer);
        assert_eq!(
            as_local.reason(),
            Some("the other side is missing required component `x` (1)")
        );
        assert_eq!(
            as_peer.reason(),
            Some("you are missing required component `x` (1)")
        );
    }

    #[test]
    fn exact_policy_flags_version_drift() {
        let state = server_state(
            &[("create", "0.5.1", BothRequired)],
            &[("create", "0.5.0", Optional)],
        );

        assert!(CompatibilityVerifier::default()
            .verify(&state, Perspective::AsPeer)
            .is_compatible());

        let strict = CompatibilityVerifier::new(VersionPolicyKind::Exact.policy());
        let mismatches = strict.mismatches(&state);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(
            mismatches[0].kind,
            MismatchKind::Version {
                found: "0.5.0".to_owned()
            }
        );
        assert_eq!(
            strict.verify(&state, Perspective::AsPeer).reason(),
            Some("you have component `create` 0.5.0 but 0.5.1 is required")
        );
    }

    #[test]
    fn client_role_flips_requirement_sides() {
        // Seen from the client: the server requires `a` on clients.
        let state = NegotiationState::new(
            Role::Client,
            set(&[]),
            set(&[("a", "1", RequiredOnClient), ("b", "1", RequiredOnServer)]),
        );
        let verdict = CompatibilityVerifier::default()
            .verify(&state, Perspective::AsLocal);
        assert_eq!(
            verdict.reason(),
            Some("you are missing required component `a` (1)")
        );
    }

    #[test]
    fn verification_is_repeatable() {
        let state = server_state(&[("x", "1", BothRequired)], &[("y", "1", BothRequired)]);
        let verifier = CompatibilityVerifier::default();
        assert_eq!(
            verifier.verify(&state, Perspective::AsLocal),
            verifier.verify(&state, Perspective::AsLocal)
        );
    }

    fn arb_set() -> impl Strategy<Value = Arc<ComponentSet>> {
        let level = prop_oneof![
            Just(Optional),
            Just(RequiredOnEither),
            Just(RequiredOnClient),
            Just(RequiredOnServer),
            Just(BothRequired),
        ];
        prop::collection::vec(("[a-f]", "[1-2]", level), 0..8).prop_map(|v| {
            Arc::new(merge_entries(
                v.into_iter()
                    .map(|(id, ver, l)| ComponentEntry::new(id, ver, l).unwrap()),
            ))
        })
    }

    fn mentioned_ids(reason: Option<&str>) -> Vec<String> {
        let mut ids: Vec<String> = reason
            .unwrap_or_default()
            .split('`')
            .skip(1)
            .step_by(2)
            .map(str::to_owned)
            .collect();
        ids.sort();
        ids
    }

    /// Ids declared by `declared` as required on `role` that `installed`
    /// lacks or carries at another version.
    fn unmet(
        declared: &ComponentSet,
        installed: &ComponentSet,
        role: Role,
    ) -> Vec<String> {
        let mut ids = Vec::new();
        for e in declared {
            let needed = match e.requirement() {
                BothRequired | RequiredOnEither => true,
                RequiredOnServer => role == Role::Server,
                RequiredOnClient => role == Role::Client,
                Optional => false,
            };
            let satisfied = installed
                .get(e.id())
                .is_some_and(|have| have.version() == e.version());
            if needed && !satisfied {
                ids.push(e.id().to_owned());
            }
        }
        ids
    }

    fn arb_role() -> impl Strategy<Value = Role> {
        prop_oneof![Just(Role::Server), Just(Role::Client)]
    }

    proptest! {
        #[test]
        fn mismatch_detection_is_symmetric(
            role in arb_role(),
            local in arb_set(),
            peer in arb_set(),
        ) {
            let mut expected = unmet(&peer, &local, role);
            expected.extend(unmet(&local, &peer, role.counterpart()));
            expected.sort();

            let state = NegotiationState::new(role, local, peer);
            let verifier =
                CompatibilityVerifier::new(VersionPolicyKind::Exact.policy());

            let as_local = verifier.verify(&state, Perspective::AsLocal);
            let as_peer = verifier.verify(&state, Perspective::AsPeer);
            prop_assert_eq!(mentioned_ids(as_local.reason()), expected.clone());
            prop_assert_eq!(mentioned_ids(as_peer.reason()), expected.clone());
            prop_assert_eq!(as_local.is_compatible(), expected.is_empty());
            prop_assert_eq!(as_peer.is_compatible(), expected.is_empty());
        }
    }
}
