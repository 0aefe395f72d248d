use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One entry of the `auths` list in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub id: String,
    #[serde(rename = "key-digest", default)]
    pub key_digest: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

/// Identities allowed through the gate, keyed by the `id` claim.
///
/// Built once at startup and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct AuthRegistry {
    entries: HashMap<String, Authorization>,
}

impl AuthRegistry {
    pub fn new(auths: impl IntoIterator<Item = Authorization>) -> Self {
        let entries = auths
            .into_iter()
            .map(|auth| (auth.id.clone(), auth))
            .collect();
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&Authorization> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_by_exact_id() {
        let registry = AuthRegistry::new(vec![Authorization {
            id: "user@example.com".to_string(),
            key_digest: String::new(),
            roles: BTreeSet::from(["editor".to_string()]),
        }]);

        assert_eq!(registry.len(), 1);
        assert!(registry.get("user@example.com").is_some());
        assert!(registry.get("USER@example.com").is_none());
        assert!(registry.get("").is_none());
    }
}
