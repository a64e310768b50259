use std::fmt;

use serde::{Deserialize, Serialize};

/// One side of a negotiated connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Server,
    Client,
}

impl Role {
    pub fn counterpart(self) -> Self {
        match self {
            Role::Server => Role::Client,
            Role::Client => Role::Server,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Server => write!(f, "server"),
            Role::Client => write!(f, "client"),
        }
    }
}

/// How essential a component is to each side of a connection.
///
/// Variants are declared from lowest to highest precedence, so the derived
/// `Ord` is the precedence order used when merging duplicate declarations:
///
/// `BothRequired > RequiredOnServer > RequiredOnClient > RequiredOnEither > Optional`
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequirementLevel {
    Optional,
    RequiredOnEither,
    RequiredOnClient,
    RequiredOnServer,
    BothRequired,
}

impl RequirementLevel {
    /// True iff this level strictly outranks `other`.
    pub fn supersedes(self, other: RequirementLevel) -> bool {
        self > other
    }

    /// Whether a component declared with this level must be installed on
    /// the given side.
    pub fn required_on(self, role: Role) -> bool {
        match self {
            RequirementLevel::BothRequired
            | RequirementLevel::RequiredOnEither => true,
            RequirementLevel::RequiredOnServer => role == Role::Server,
            RequirementLevel::RequiredOnClient => role == Role::Client,
            RequirementLevel::Optional => false,
        }
    }

    pub fn is_optional(self) -> bool {
        self == RequirementLevel::Optional
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequirementLevel::Optional => "OPTIONAL",
            RequirementLevel::RequiredOnEither => "REQUIRED_ON_EITHER",
            RequirementLevel::RequiredOnClient => "REQUIRED_ON_CLIENT",
            RequirementLevel::RequiredOnServer => "REQUIRED_ON_SERVER",
            RequirementLevel::BothRequired => "BOTH_REQUIRED",
        }
    }
}

impl fmt::Display for RequirementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    use RequirementLevel::*;

    #[rstest]
    #[case(BothRequired, RequiredOnServer)]
    #[case(RequiredOnServer, RequiredOnClient)]
    #[case(RequiredOnClient, RequiredOnEither)]
    #[case(RequiredOnEither, Optional)]
    #[case(BothRequired, Optional)]
    fn higher_level_supersedes_lower(
        #[case] higher: RequirementLevel,
        #[case] lower: RequirementLevel,
    ) {
        assert!(higher.supersedes(lower));
        assert!(!lower.supersedes(higher));
    }

    #[test]
    fn level_never_supersedes_itself() {
        for level in [
            Optional,
            RequiredOnEither,
            RequiredOnClient,
            RequiredOnServer,
            BothRequired,
        ] {
            assert!(!level.supersedes(level));
        }
    }

    #[rstest]
    #[case(BothRequired, true, true)]
    #[case(RequiredOnServer, true, false)]
    #[case(RequiredOnClient, false, true)]
    #[case(RequiredOnEither, true, true)]
    #[case(Optional, false, false)]
    fn required_on_side(
        #[case] level: RequirementLevel,
        #[case] on_server: bool,
        #[case] on_client: bool,
    ) {
        assert_eq!(level.required_on(Role::Server), on_server);
        assert_eq!(level.required_on(Role::Client), on_client);
    }

    #[test]
    fn wire_names_match_display() {
        assert_eq!(
            serde_json::from_str::<RequirementLevel>("\"REQUIRED_ON_EITHER\"")
                .unwrap(),
            RequiredOnEither
        );
        assert_eq!(
            serde_json::to_string(&BothRequired).unwrap(),
            format!("\"{}\"", BothRequired)
        );
        assert!(serde_json::from_str::<RequirementLevel>("\"required_on_either\"")
            .is_err());
    }
}
