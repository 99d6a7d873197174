//! Registry mapping legacy (V1) network names to CAIP-2 identifiers.
//!
//! V1 messages carry human-readable names like `"base-sepolia"` while V2
//! uses CAIP-2 ids like `"eip155:84532"`. Chain crates export
//! [`NetworkInfo`] slices; applications assemble a [`NetworkRegistry`] from
//! them at startup.

use std::collections::HashMap;

/// A known network: legacy name plus CAIP-2 components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Legacy network name (e.g., `"base-sepolia"`).
    pub name: &'static str,
    /// CAIP-2 namespace (e.g., `"eip155"`).
    pub namespace: &'static str,
    /// Chain reference (e.g., `"84532"`).
    pub reference: &'static str,
}

impl NetworkInfo {
    /// Returns the CAIP-2 identifier, `namespace:reference`.
    #[must_use]
    pub fn caip2(&self) -> String {
        format!("{}:{}", self.namespace, self.reference)
    }
}

/// Bidirectional map between legacy names and CAIP-2 identifiers.
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    name_to_caip2: HashMap<&'static str, String>,
    caip2_to_name: HashMap<String, &'static str>,
}

impl NetworkRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated from a network slice.
    #[must_use]
    pub fn from_networks(networks: &[NetworkInfo]) -> Self {
        let mut registry = Self::new();
        registry.register(networks);
        registry
    }

    /// Registers additional networks.
    pub fn register(&mut self, networks: &[NetworkInfo]) {
        for info in networks {
            self.name_to_caip2.insert(info.name, info.caip2());
            self.caip2_to_name.insert(info.caip2(), info.name);
        }
    }

    /// Builder-style registration.
    #[must_use]
    pub fn with_networks(mut self, networks: &[NetworkInfo]) -> Self {
        self.register(networks);
        self
    }

    /// Looks up a CAIP-2 id by legacy name.
    #[must_use]
    pub fn caip2_by_name(&self, name: &str) -> Option<&str> {
        self.name_to_caip2.get(name).map(String::as_str)
    }

    /// Looks up a legacy name by CAIP-2 id.
    #[must_use]
    pub fn name_by_caip2(&self, caip2: &str) -> Option<&'static str> {
        self.caip2_to_name.get(caip2).copied()
    }

    /// Returns the number of registered networks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.name_to_caip2.len()
    }

    /// Returns `true` when no networks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name_to_caip2.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NETWORKS: &[NetworkInfo] = &[
        NetworkInfo {
            name: "base-sepolia",
            namespace: "eip155",
            reference: "84532",
        },
        NetworkInfo {
            name: "base",
            namespace: "eip155",
            reference: "8453",
        },
    ];

    #[test]
    fn lookups_work_both_ways() {
        let registry = NetworkRegistry::from_networks(NETWORKS);
        assert_eq!(registry.caip2_by_name("base"), Some("eip155:8453"));
        assert_eq!(registry.name_by_caip2("eip155:84532"), Some("base-sepolia"));
        assert_eq!(registry.caip2_by_name("unknown"), None);
        assert_eq!(registry.len(), 2);
    }
}
