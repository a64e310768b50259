use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::config::NegotiationConfig;
use crate::entry::ComponentSet;
use crate::errors::Result;
use crate::inventory::Inventory;
use crate::merge::merge;
use crate::requirement::Role;
use crate::verify::CompatibilityVerifier;

/// Everything a negotiation needs that outlives a single connection.
///
/// Built once at start-up and shared by reference (usually behind an
/// `Arc`) with every session. The local canonical set is merged on first
/// use and cached for the lifetime of the context.
pub struct NegotiationContext {
    role: Role,
    config: NegotiationConfig,
    inventory: Arc<dyn Inventory>,
    verifier: CompatibilityVerifier,
    local: OnceCell<Arc<ComponentSet>>,
}

impl fmt::Debug for NegotiationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiationContext")
            .field("role", &self.role)
            .field("config", &self.config)
            .field("verifier", &self.verifier)
            .field("local", &self.local.get())
            .finish()
    }
}

impl NegotiationContext {
    pub fn new(
        role: Role,
        config: NegotiationConfig,
        inventory: Arc<dyn Inventory>,
    ) -> Self {
        let verifier = CompatibilityVerifier::new(config.version_policy.policy());
        Self::with_verifier(role, config, inventory, verifier)
    }

    pub fn with_verifier(
        role: Role,
        config: NegotiationConfig,
        inventory: Arc<dyn Inventory>,
        verifier: CompatibilityVerifier,
    ) -> Self {
        Self {
            role,
            config,
            inventory,
            verifier,
            local: OnceCell::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    pub fn verifier(&self) -> &CompatibilityVerifier {
        &self.verifier
    }

    pub fn is_enabled(&self) -> bool {
        self.config.protocol_enabled
    }

    /// The local canonical set: installed components merged with the
    /// configured extras. Computed once.
    pub fn local_components(&self) -> Result<Arc<ComponentSet>> {
        self.local
            .get_or_try_init(|| {
                let installed = self.inventory.installed()?;
                let extra = self.config.extra_required_components()?;
                let set = merge([installed, extra]);
                debug!(
                    "Local {} component set: [{}]",
                    self.role,
                    set.stringify()
                );
                Ok(Arc::new(set))
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{ComponentDecl, ComponentEntry};
    use crate::requirement::RequirementLevel;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingInventory {
        calls: AtomicUsize,
    }

    impl Inventory for CountingInventory {
        fn installed(&self) -> Result<Vec<ComponentEntry>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![ComponentEntry::new(
                "fabric-api",
                "0.92.0",
                RequirementLevel::Optional,
            )?])
        }
    }

    #[test]
    fn local_set_is_merged_once() {
        let inventory = Arc::new(CountingInventory {
            calls: AtomicUsize::new(0),
        });
        let config = NegotiationConfig {
            extra_required_components: vec![ComponentDecl {
                id: "fabric-api".to_owned(),
                version: "0.92.0".to_owned(),
                requirement: RequirementLevel::BothRequired,
            }],
            ..Default::default()
        };
        let ctx = NegotiationContext::new(Role::Server, config, inventory.clone());

        let first = ctx.local_components().unwrap();
        let second = ctx.local_components().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(inventory.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            first.get("fabric-api").unwrap().requirement(),
            RequirementLevel::BothRequired
        );
    }
}
