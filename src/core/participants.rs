//! Deduplicated diagram participants

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Structural identity of a participant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantKey {
    /// Module path relative to the workspace root, '/' separated, no extension
    pub namespace: String,
    pub class_name: String,
    /// Variable or property the call goes through; empty for module calls
    pub object_name: String,
}

impl ParticipantKey {
    pub fn new(
        namespace: impl Into<String>,
        class_name: impl Into<String>,
        object_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            class_name: class_name.into(),
            object_name: object_name.into(),
        }
    }

    fn label(&self) -> String {
        if self.object_name.is_empty() || self.object_name == self.class_name {
            self.class_name.clone()
        } else {
            format!("{}: {}", self.object_name, self.class_name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub key: ParticipantKey,
    /// `p1`, `p2`, ... in registration order
    pub id: String,
    /// Namespace with the prefix shared by all participants removed
    pub display_namespace: String,
    /// Label line, then the shortened namespace on a second line
    pub display_name: String,
}

impl Participant {
    fn refresh_display(&mut self, namespace: String) {
        let label = self.key.label();
        self.display_name = if namespace.is_empty() {
            label
        } else {
            format!("{}\n{}", label, namespace)
        };
        self.display_namespace = namespace;
    }
}

/// Store of participants keyed by structure, preserving insertion order
#[derive(Debug, Default, Clone)]
pub struct ParticipantRegistry {
    participants: Vec<Participant>,
    index: HashMap<ParticipantKey, usize>,
    finalized: bool,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing participant for `key`, or a new one with the next id
    pub fn register(&mut self, key: ParticipantKey) -> &Participant {
        if let Some(&index) = self.index.get(&key) {
            return &self.participants[index];
        }

        let index = self.participants.len();
        let mut participant = Participant {
            key: key.clone(),
            id: format!("p{}", index + 1),
            display_namespace: String::new(),
            display_name: String::new(),
        };
        participant.refresh_display(key.namespace.clone());

        self.index.insert(key, index);
        self.participants.push(participant);
        self.finalized = false;
        &self.participants[index]
    }

    /// Strip the directory prefix every namespace shares. Module names are
    /// never stripped.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }

        let mut directories: Vec<Vec<&str>> = self
            .participants
            .iter()
            .map(|p| {
                let mut parts: Vec<&str> = p.key.namespace.split('/').collect();
                parts.pop();
                parts
            })
            .collect();

        let mut stripped = 0;
        while let Some(first) = directories.first().and_then(|dirs| dirs.first().copied()) {
            if !directories.iter().all(|dirs| dirs.first() == Some(&first)) {
                break;
            }
            for dirs in directories.iter_mut() {
                dirs.remove(0);
            }
            stripped += 1;
        }

        let shortened: Vec<String> = self
            .participants
            .iter()
            .map(|p| {
                p.key
                    .namespace
                    .split('/')
                    .skip(stripped)
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .collect();

        for (participant, namespace) in self.participants.iter_mut().zip(shortened) {
            participant.refresh_display(namespace);
        }
        self.finalized = true;
    }

    #[cfg(test)]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Participants in registration order
    pub fn all(&self) -> &[Participant] {
        &self.participants
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_same_participant() {
        let mut registry = ParticipantRegistry::new();
        let first = registry
            .register(ParticipantKey::new("app/orders", "OrderService", "orders"))
            .id
            .clone();
        let other = registry
            .register(ParticipantKey::new("app/billing", "Billing", "billing"))
            .id
            .clone();
        let again = registry
            .register(ParticipantKey::new("app/orders", "OrderService", "orders"))
            .id
            .clone();

        assert_eq!(first, "p1");
        assert_eq!(other, "p2");
        assert_eq!(again, "p1");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_object_name_distinguishes_participants() {
        let mut registry = ParticipantRegistry::new();
        registry.register(ParticipantKey::new("app/db", "Repo", "users"));
        registry.register(ParticipantKey::new("app/db", "Repo", "orders"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_finalize_strips_common_directories() {
        let mut registry = ParticipantRegistry::new();
        registry.register(ParticipantKey::new("src/shop/api/views", "View", "view"));
        registry.register(ParticipantKey::new("src/shop/core/orders", "Orders", "orders"));
        registry.register(ParticipantKey::new("src/shop/core/billing", "Billing", ""));
        registry.finalize();

        let namespaces: Vec<&str> = registry
            .all()
            .iter()
            .map(|p| p.display_namespace.as_str())
            .collect();
        assert_eq!(namespaces, vec!["api/views", "core/orders", "core/billing"]);
        assert_eq!(registry.all()[0].display_name, "view: View\napi/views");
        assert_eq!(registry.all()[2].display_name, "Billing\ncore/billing");
        // the key is untouched
        assert_eq!(registry.all()[0].key.namespace, "src/shop/api/views");
    }

    #[test]
    fn test_finalize_keeps_module_name() {
        let mut registry = ParticipantRegistry::new();
        registry.register(ParticipantKey::new("pkg/service", "A", "run"));
        registry.register(ParticipantKey::new("pkg/service", "B", "b"));
        registry.finalize();

        assert!(registry.all().iter().all(|p| p.display_namespace == "service"));
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut registry = ParticipantRegistry::new();
        registry.register(ParticipantKey::new("a/b/c/x", "X", ""));
        registry.register(ParticipantKey::new("a/b/d/y", "Y", ""));
        registry.finalize();
        let once = registry.all().to_vec();
        registry.finalize();
        assert_eq!(registry.all(), once.as_slice());
        assert!(registry.is_finalized());
    }

    #[test]
    fn test_registration_order_preserved() {
        let mut registry = ParticipantRegistry::new();
        for name in ["c", "a", "b", "a"] {
            registry.register(ParticipantKey::new("m", name.to_uppercase(), name));
        }
        let ids: Vec<(&str, &str)> = registry
            .all()
            .iter()
            .map(|p| (p.id.as_str(), p.key.object_name.as_str()))
            .collect();
        assert_eq!(ids, vec![("p1", "c"), ("p2", "a"), ("p3", "b")]);
    }
}
