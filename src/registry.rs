//! Subscription registry: the namespaces currently open and their filters
//!
//! Mutations are serialized through a single writer lock and publish a new
//! copy of the namespace map; readers take an `Arc` snapshot and iterate it
//! without holding any lock. A snapshot never observes a half-applied
//! registration.

use crate::error::{RealtimeError, Result};
use crate::types::Filters;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

type NamespaceMap = BTreeMap<String, Arc<Subscription>>;

/// A registered namespace and its filter set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    namespace_id: String,
    filters: Filters,
    generation: u64,
}

impl Subscription {
    pub fn namespace_id(&self) -> &str {
        &self.namespace_id
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Registration generation; increases with every `register` call
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Receipt returned by [`SubscriptionRegistry::register`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub namespace_id: String,
    pub generation: u64,
    /// Whether an existing registration was replaced
    pub replaced: bool,
}

/// Point-in-time view of the registry, ordered by namespace id
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    namespaces: Arc<NamespaceMap>,
}

impl Snapshot {
    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.namespaces.values().map(Arc::as_ref)
    }

    /// Shared handles to every subscription, for handing to spawned work
    pub fn subscriptions(&self) -> Vec<Arc<Subscription>> {
        self.namespaces.values().cloned().collect()
    }

    pub fn get(&self, namespace_id: &str) -> Option<&Subscription> {
        self.namespaces.get(namespace_id).map(Arc::as_ref)
    }

    pub fn contains(&self, namespace_id: &str) -> bool {
        self.namespaces.contains_key(namespace_id)
    }

    pub fn namespace_ids(&self) -> Vec<&str> {
        self.namespaces.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

/// Registry of open namespaces
///
/// Owned by the server and shared with dispatchers via `Arc`.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    current: RwLock<Arc<NamespaceMap>>,
    writer: Mutex<()>,
    generation: AtomicU64,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or atomically replace the subscription for `namespace_id`
    ///
    /// Fails with `InvalidFilter` when the namespace id is empty or an
    /// include-mode filter has no values; the registry is left unchanged.
    pub fn register(
        &self,
        namespace_id: impl Into<String>,
        filters: Filters,
    ) -> Result<SubscriptionHandle> {
        let namespace_id = namespace_id.into();
        if namespace_id.is_empty() {
            return Err(RealtimeError::invalid_filter(
                &namespace_id,
                "namespace id is empty",
            ));
        }
        filters.validate(&namespace_id)?;

        let (generation, replaced) = self.mutate(|map, generation| {
            let subscription = Arc::new(Subscription {
                namespace_id: namespace_id.clone(),
                filters,
                generation,
            });
            let replaced = map.insert(namespace_id.clone(), subscription).is_some();
            (generation, replaced)
        });

        tracing::info!(
            namespace = %namespace_id,
            generation,
            replaced,
            "Namespace registered"
        );

        Ok(SubscriptionHandle {
            namespace_id,
            generation,
            replaced,
        })
    }

    /// Remove a namespace; returns false if it was not registered
    pub fn unregister(&self, namespace_id: &str) -> bool {
        if !self.snapshot().contains(namespace_id) {
            return false;
        }

        let removed = self.mutate(|map, _| map.remove(namespace_id).is_some());
        if removed {
            tracing::info!(namespace = %namespace_id, "Namespace unregistered");
        }
        removed
    }

    /// Remove every namespace (server shutdown)
    pub fn clear(&self) -> usize {
        let count = self.mutate(|map, _| {
            let count = map.len();
            map.clear();
            count
        });
        tracing::info!(count, "Registry cleared");
        count
    }

    /// Consistent point-in-time copy of all subscriptions
    pub fn snapshot(&self) -> Snapshot {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Snapshot {
            namespaces: Arc::clone(&current),
        }
    }

    pub fn get(&self, namespace_id: &str) -> Option<Arc<Subscription>> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        current.get(namespace_id).cloned()
    }

    pub fn contains(&self, namespace_id: &str) -> bool {
        self.get(namespace_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Copy the map, apply `f`, and publish the copy
    ///
    /// `f` also receives the next generation number, drawn under the writer
    /// lock so stored generations follow publish order.
    fn mutate<T>(&self, f: impl FnOnce(&mut NamespaceMap, u64) -> T) -> T {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let mut next = NamespaceMap::clone(&self.snapshot().namespaces);
        let out = f(&mut next, generation);

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(next);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldFilter, FilterField};

    fn node_filter(node: &str) -> Filters {
        Filters::new().with(FilterField::SubjectName, FieldFilter::include([node]))
    }

    #[test]
    fn test_register_and_snapshot() {
        let registry = SubscriptionRegistry::new();
        let handle = registry.register("ns-b", node_filter("Node1")).unwrap();
        registry.register("ns-a", Filters::new()).unwrap();

        assert_eq!(handle.namespace_id, "ns-b");
        assert!(!handle.replaced);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        // Ordered by namespace id
        assert_eq!(snapshot.namespace_ids(), vec!["ns-a", "ns-b"]);
        assert!(snapshot.get("ns-a").unwrap().filters().is_empty());
    }

    #[test]
    fn test_register_replaces() {
        let registry = SubscriptionRegistry::new();
        let first = registry.register("ns1", node_filter("Node1")).unwrap();
        let second = registry.register("ns1", node_filter("Node2")).unwrap();

        assert!(second.replaced);
        assert!(second.generation > first.generation);
        assert_eq!(registry.len(), 1);

        let sub = registry.get("ns1").unwrap();
        assert_eq!(sub.filters(), &node_filter("Node2"));
        assert_eq!(sub.generation(), second.generation);
    }

    #[test]
    fn test_register_invalid_filter_leaves_state() {
        let registry = SubscriptionRegistry::new();
        registry.register("ns1", node_filter("Node1")).unwrap();

        let bad = Filters::new().with(FilterField::StatusFilter, FieldFilter::include(Vec::<String>::new()));
        let err = registry.register("ns1", bad).unwrap_err();
        assert!(matches!(err, RealtimeError::InvalidFilter { .. }));

        assert_eq!(registry.get("ns1").unwrap().filters(), &node_filter("Node1"));

        let err = registry.register("", Filters::new()).unwrap_err();
        assert!(matches!(err, RealtimeError::InvalidFilter { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_then_unregister() {
        let registry = SubscriptionRegistry::new();
        registry.register("ns1", Filters::new()).unwrap();
        assert!(registry.unregister("ns1"));

        assert!(!registry.snapshot().contains("ns1"));
        assert!(registry.is_empty());
        // No-op when absent
        assert!(!registry.unregister("ns1"));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_mutation() {
        let registry = SubscriptionRegistry::new();
        registry.register("ns1", Filters::new()).unwrap();

        let before = registry.snapshot();
        registry.register("ns2", Filters::new()).unwrap();
        registry.unregister("ns1");

        assert_eq!(before.namespace_ids(), vec!["ns1"]);
        assert_eq!(registry.snapshot().namespace_ids(), vec!["ns2"]);
    }

    #[test]
    fn test_clear() {
        let registry = SubscriptionRegistry::new();
        registry.register("ns1", Filters::new()).unwrap();
        registry.register("ns2", Filters::new()).unwrap();

        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_register_keeps_latest_generation() {
        let registry = Arc::new(SubscriptionRegistry::new());

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let mut last = 0;
                    for i in 0..500 {
                        let handle = registry
                            .register("ns", node_filter(&format!("Node{}-{}", t, i)))
                            .unwrap();
                        assert!(handle.generation > last);
                        last = handle.generation;
                        let stored = registry.get("ns").unwrap().generation();
                        assert!(stored >= handle.generation, "stored generation went backwards");
                    }
                    last
                })
            })
            .collect();

        let highest = writers.into_iter().map(|w| w.join().unwrap()).max().unwrap();
        assert_eq!(highest, 2_000);
        assert_eq!(registry.get("ns").unwrap().generation(), highest);
    }

    #[test]
    fn test_concurrent_register_and_snapshot_atomic() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let a = Filters::new()
            .with(FilterField::SubjectName, FieldFilter::include(["A"]))
            .with(FilterField::StatusFilter, FieldFilter::include(["A"]));
        let b = Filters::new()
            .with(FilterField::SubjectName, FieldFilter::include(["B"]))
            .with(FilterField::StatusFilter, FieldFilter::include(["B"]));
        registry.register("ns", a.clone()).unwrap();

        let writer = {
            let registry = Arc::clone(&registry);
            let (a, b) = (a.clone(), b.clone());
            std::thread::spawn(move || {
                for i in 0..2_000 {
                    let filters = if i % 2 == 0 { b.clone() } else { a.clone() };
                    registry.register("ns", filters).unwrap();
                }
            })
        };

        for _ in 0..2_000 {
            let snapshot = registry.snapshot();
            let filters = snapshot.get("ns").unwrap().filters();
            assert!(filters == &a || filters == &b, "half-applied filters observed");
        }

        writer.join().unwrap();
    }
}
