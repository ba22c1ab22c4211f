//! Remote routing stores.
//!
//! A [RoutingStore] is wherever DestinationRules and VirtualServices actually
//! live. The manager never owns routing state, it reads and writes through a
//! store handle it was given.

use canary_api::{labels, DestinationRule, Labels, VirtualService};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

pub(crate) const DESTINATION_RULE: &str = "DestinationRule";
#[cfg(feature = "kube")]
pub(crate) const VIRTUAL_SERVICE: &str = "VirtualService";

/// An error from a [RoutingStore].
///
/// Stores classify their failures so the expected outcomes of a lifecycle
/// operation (an object that's already gone, or already there) can be told
/// apart from real failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {name:?} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} {name:?} already exists")]
    AlreadyExists { kind: &'static str, name: String },

    /// The object was modified since it was read.
    #[error("{kind} {name:?} was modified concurrently")]
    Conflict { kind: &'static str, name: String },

    /// Any other failure, including transport errors.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Read and write access to Istio routing objects.
///
/// Every operation is scoped to a single namespace. Stores do not retry, any
/// retry or timeout policy belongs to the store implementation itself.
pub trait RoutingStore: Send + Sync {
    /// List the DestinationRules in a namespace with labels matching
    /// `selector`.
    fn list_destination_rules(
        &self,
        namespace: &str,
        selector: &Labels,
    ) -> impl Future<Output = Result<Vec<DestinationRule>, StoreError>> + Send;

    /// Create a new DestinationRule, returning the object as stored.
    fn create_destination_rule(
        &self,
        rule: &DestinationRule,
    ) -> impl Future<Output = Result<DestinationRule, StoreError>> + Send;

    /// Replace an existing DestinationRule, returning the object as stored.
    ///
    /// If `rule` has a resource version and the stored object has changed
    /// since, the update fails with [StoreError::Conflict].
    fn update_destination_rule(
        &self,
        rule: &DestinationRule,
    ) -> impl Future<Output = Result<DestinationRule, StoreError>> + Send;

    /// Delete a DestinationRule.
    ///
    /// If `rule` has a resource version and the stored object has changed
    /// since, nothing is deleted and this fails with [StoreError::Conflict].
    fn delete_destination_rule(
        &self,
        rule: &DestinationRule,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// List the VirtualServices in a namespace with labels matching
    /// `selector`.
    fn list_virtual_services(
        &self,
        namespace: &str,
        selector: &Labels,
    ) -> impl Future<Output = Result<Vec<VirtualService>, StoreError>> + Send;
}

macro_rules! delegate_store {
    ($($t:tt)*) => {
        impl<S: RoutingStore> RoutingStore for $($t)* {
            fn list_destination_rules(
                &self,
                namespace: &str,
                selector: &Labels,
            ) -> impl Future<Output = Result<Vec<DestinationRule>, StoreError>> + Send {
                S::list_destination_rules(self, namespace, selector)
            }

            fn create_destination_rule(
                &self,
                rule: &DestinationRule,
            ) -> impl Future<Output = Result<DestinationRule, StoreError>> + Send {
                S::create_destination_rule(self, rule)
            }

            fn update_destination_rule(
                &self,
                rule: &DestinationRule,
            ) -> impl Future<Output = Result<DestinationRule, StoreError>> + Send {
                S::update_destination_rule(self, rule)
            }

            fn delete_destination_rule(
                &self,
                rule: &DestinationRule,
            ) -> impl Future<Output = Result<(), StoreError>> + Send {
                S::delete_destination_rule(self, rule)
            }

            fn list_virtual_services(
                &self,
                namespace: &str,
                selector: &Labels,
            ) -> impl Future<Output = Result<Vec<VirtualService>, StoreError>> + Send {
                S::list_virtual_services(self, namespace, selector)
            }
        }
    };
}

delegate_store!(&S);
delegate_store!(Arc<S>);

macro_rules! no_poison {
    ($guard:expr) => {
        $guard.expect("MemoryStore was poisoned: this is a bug in canary")
    };
}

/// An in-memory [RoutingStore].
///
/// Stores are cheaply cloneable, and clones share the same objects. Objects
/// are given a new resource version on every write and updates with a stale
/// resource version are rejected with a conflict, the same way a Kubernetes
/// API server would.
///
/// Operations on a `MemoryStore` never block.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

type ObjectKey = (String, String);

#[derive(Debug, Default)]
struct MemoryState {
    version: u64,
    destination_rules: BTreeMap<ObjectKey, DestinationRule>,
    virtual_services: BTreeMap<ObjectKey, VirtualService>,
}

impl MemoryState {
    fn next_version(&mut self) -> Option<String> {
        self.version += 1;
        Some(self.version.to_string())
    }
}

fn key(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_string(), name.to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a DestinationRule by namespace and name.
    pub fn destination_rule(&self, namespace: &str, name: &str) -> Option<DestinationRule> {
        let state = no_poison!(self.inner.lock());
        state.destination_rules.get(&key(namespace, name)).cloned()
    }

    /// All DestinationRules in the store, ordered by namespace and name.
    pub fn destination_rules(&self) -> Vec<DestinationRule> {
        let state = no_poison!(self.inner.lock());
        state.destination_rules.values().cloned().collect()
    }

    /// Add or replace a VirtualService.
    ///
    /// VirtualServices are managed outside of canary, so there's no way to
    /// write them through the [RoutingStore] interface.
    pub fn insert_virtual_service(&self, mut vs: VirtualService) -> VirtualService {
        let mut state = no_poison!(self.inner.lock());
        vs.resource_version = state.next_version();
        state
            .virtual_services
            .insert(key(&vs.namespace, &vs.name), vs.clone());
        vs
    }

    fn list_rules(&self, namespace: &str, selector: &Labels) -> Vec<DestinationRule> {
        let state = no_poison!(self.inner.lock());
        state
            .destination_rules
            .values()
            .filter(|r| r.namespace == namespace && labels::matches(selector, &r.labels))
            .cloned()
            .collect()
    }

    fn create_rule(&self, rule: &DestinationRule) -> Result<DestinationRule, StoreError> {
        let mut state = no_poison!(self.inner.lock());
        let key = key(&rule.namespace, &rule.name);

        if state.destination_rules.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: DESTINATION_RULE,
                name: rule.name.clone(),
            });
        }

        let mut rule = rule.clone();
        rule.resource_version = state.next_version();
        state.destination_rules.insert(key, rule.clone());
        Ok(rule)
    }

    fn update_rule(&self, rule: &DestinationRule) -> Result<DestinationRule, StoreError> {
        let mut state = no_poison!(self.inner.lock());
        let key = key(&rule.namespace, &rule.name);

        let Some(existing) = state.destination_rules.get(&key) else {
            return Err(StoreError::NotFound {
                kind: DESTINATION_RULE,
                name: rule.name.clone(),
            });
        };

        if rule.resource_version.is_some() && rule.resource_version != existing.resource_version {
            return Err(StoreError::Conflict {
                kind: DESTINATION_RULE,
                name: rule.name.clone(),
            });
        }

        let mut rule = rule.clone();
        rule.resource_version = state.next_version();
        state.destination_rules.insert(key, rule.clone());
        Ok(rule)
    }

    fn delete_rule(&self, rule: &DestinationRule) -> Result<(), StoreError> {
        let mut state = no_poison!(self.inner.lock());
        let key = key(&rule.namespace, &rule.name);

        let Some(existing) = state.destination_rules.get(&key) else {
            return Err(StoreError::NotFound {
                kind: DESTINATION_RULE,
                name: rule.name.clone(),
            });
        };

        if rule.resource_version.is_some() && rule.resource_version != existing.resource_version {
            return Err(StoreError::Conflict {
                kind: DESTINATION_RULE,
                name: rule.name.clone(),
            });
        }

        state.destination_rules.remove(&key);
        Ok(())
    }

    fn list_services(&self, namespace: &str, selector: &Labels) -> Vec<VirtualService> {
        let state = no_poison!(self.inner.lock());
        state
            .virtual_services
            .values()
            .filter(|vs| vs.namespace == namespace && labels::matches(selector, &vs.labels))
            .cloned()
            .collect()
    }
}

impl RoutingStore for MemoryStore {
    fn list_destination_rules(
        &self,
        namespace: &str,
        selector: &Labels,
    ) -> impl Future<Output = Result<Vec<DestinationRule>, StoreError>> + Send {
        std::future::ready(Ok(self.list_rules(namespace, selector)))
    }

    fn create_destination_rule(
        &self,
        rule: &DestinationRule,
    ) -> impl Future<Output = Result<DestinationRule, StoreError>> + Send {
        std::future::ready(self.create_rule(rule))
    }

    fn update_destination_rule(
        &self,
        rule: &DestinationRule,
    ) -> impl Future<Output = Result<DestinationRule, StoreError>> + Send {
        std::future::ready(self.update_rule(rule))
    }

    fn delete_destination_rule(
        &self,
        rule: &DestinationRule,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        std::future::ready(self.delete_rule(rule))
    }

    fn list_virtual_services(
        &self,
        namespace: &str,
        selector: &Labels,
    ) -> impl Future<Output = Result<Vec<VirtualService>, StoreError>> + Send {
        std::future::ready(Ok(self.list_services(namespace, selector)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::FutureExt;

    fn rule(namespace: &str, name: &str, app: &str) -> DestinationRule {
        DestinationRule {
            name: name.to_string(),
            namespace: namespace.to_string(),
            labels: [("app".to_string(), app.to_string())].into_iter().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_list() {
        let store = MemoryStore::new();

        let created = store
            .create_destination_rule(&rule("arrow", "api", "api"))
            .now_or_never()
            .unwrap()
            .unwrap();
        assert!(created.resource_version.is_some());

        store
            .create_destination_rule(&rule("arrow", "web", "web"))
            .now_or_never()
            .unwrap()
            .unwrap();
        store
            .create_destination_rule(&rule("other", "api", "api"))
            .now_or_never()
            .unwrap()
            .unwrap();

        let selector = [("app".to_string(), "api".to_string())].into_iter().collect();
        let listed = store
            .list_destination_rules("arrow", &selector)
            .now_or_never()
            .unwrap()
            .unwrap();
        assert_eq!(listed, vec![created]);

        let all = store
            .list_destination_rules("arrow", &Labels::new())
            .now_or_never()
            .unwrap()
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_create_already_exists() {
        let store = MemoryStore::new();
        store
            .create_destination_rule(&rule("arrow", "api", "api"))
            .now_or_never()
            .unwrap()
            .unwrap();

        let err = store
            .create_destination_rule(&rule("arrow", "api", "api"))
            .now_or_never()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }), "{err:?}");
    }

    #[test]
    fn test_update_stale_version() {
        let store = MemoryStore::new();
        let created = store
            .create_destination_rule(&rule("arrow", "api", "api"))
            .now_or_never()
            .unwrap()
            .unwrap();

        let updated = store
            .update_destination_rule(&created)
            .now_or_never()
            .unwrap()
            .unwrap();
        assert_ne!(updated.resource_version, created.resource_version);

        // writing the originally read object again is a lost update
        let err = store
            .update_destination_rule(&created)
            .now_or_never()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }), "{err:?}");
    }

    #[test]
    fn test_update_and_delete_missing() {
        let store = MemoryStore::new();

        let err = store
            .update_destination_rule(&rule("arrow", "api", "api"))
            .now_or_never()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }), "{err:?}");

        let err = store
            .delete_destination_rule(&rule("arrow", "api", "api"))
            .now_or_never()
            .unwrap()
            .unwrap_err();
        assert_eq!(err.to_string(), r#"DestinationRule "api" not found"#);
    }

    #[test]
    fn test_delete_stale_version() {
        let store = MemoryStore::new();
        let created = store
            .create_destination_rule(&rule("arrow", "api", "api"))
            .now_or_never()
            .unwrap()
            .unwrap();
        let updated = store
            .update_destination_rule(&created)
            .now_or_never()
            .unwrap()
            .unwrap();

        // deleting what was read before the update would lose the update
        let err = store
            .delete_destination_rule(&created)
            .now_or_never()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }), "{err:?}");
        assert!(store.destination_rule("arrow", "api").is_some());

        store
            .delete_destination_rule(&updated)
            .now_or_never()
            .unwrap()
            .unwrap();
        assert!(store.destination_rule("arrow", "api").is_none());
    }

    #[test]
    fn test_shared_handles() {
        let store = Arc::new(MemoryStore::new());
        let by_ref = &store;

        by_ref
            .create_destination_rule(&rule("arrow", "api", "api"))
            .now_or_never()
            .unwrap()
            .unwrap();

        assert!(store.destination_rule("arrow", "api").is_some());
    }
}
