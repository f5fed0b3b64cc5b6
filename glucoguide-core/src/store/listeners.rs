//! Realtime listener bookkeeping shared by store implementations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;

use super::{DocPath, Query, Snapshot, StoreError};

type SnapshotSender = mpsc::UnboundedSender<Result<Snapshot, StoreError>>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<u64, (Query, SnapshotSender)>,
}

/// Tracks open subscriptions for a store.
///
/// Stores call [`ListenerRegistry::register`] when a subscription is opened
/// and [`ListenerRegistry::watching`] after each commit to find out which
/// listeners need a fresh snapshot.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns the handle that owns it.
    pub fn register(&self, query: Query) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.with_registry(|registry| {
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.insert(id, (query.clone(), tx));
            id
        });

        Subscription {
            id,
            query,
            receiver: rx,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Listeners whose query watches any of the given paths.
    pub fn watching(&self, paths: &[DocPath]) -> Vec<(u64, Query)> {
        self.with_registry(|registry| {
            registry
                .listeners
                .iter()
                .filter(|(_, (query, _))| paths.iter().any(|p| query.watches(p)))
                .map(|(id, (query, _))| (*id, query.clone()))
                .collect()
        })
    }

    /// Delivers a snapshot (or error) to one listener.
    ///
    /// Listeners whose receiving side has gone away are dropped.
    pub fn send(&self, id: u64, item: Result<Snapshot, StoreError>) {
        self.with_registry(|registry| {
            let closed = match registry.listeners.get(&id) {
                Some((_, tx)) => tx.send(item).is_err(),
                None => false,
            };
            if closed {
                registry.listeners.remove(&id);
            }
        })
    }

    /// Number of open listeners.
    pub fn len(&self) -> usize {
        self.with_registry(|registry| registry.listeners.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_registry<T>(&self, f: impl FnOnce(&mut Registry) -> T) -> T {
        match self.inner.lock() {
            Ok(mut registry) => f(&mut registry),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

/// Handle for an open realtime subscription.
///
/// Snapshots arrive through [`Subscription::next`]. Dropping the handle
/// unregisters the listener, so no further snapshots are produced for it.
pub struct Subscription {
    id: u64,
    query: Query,
    receiver: mpsc::UnboundedReceiver<Result<Snapshot, StoreError>>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Waits for the next snapshot. Returns `None` once the store is gone.
    pub async fn next(&mut self) -> Option<Result<Snapshot, StoreError>> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            match registry.lock() {
                Ok(mut registry) => {
                    registry.listeners.remove(&self.id);
                }
                Err(poisoned) => {
                    poisoned.into_inner().listeners.remove(&self.id);
                }
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("query", &self.query)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drop_releases_listener() {
        let registry = ListenerRegistry::new();
        let sub = registry.register(Query::collection("medicines"));
        assert_eq!(registry.len(), 1);

        drop(sub);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_watching_selects_by_path() {
        let registry = ListenerRegistry::new();
        let _meds = registry.register(Query::collection("medicines"));
        let _posts = registry.register(Query::collection("forumPosts"));

        let path = DocPath::parse("medicines/m1").unwrap();
        let watching = registry.watching(&[path]);
        assert_eq!(watching.len(), 1);
        assert_eq!(watching[0].1, Query::collection("medicines"));
    }

    #[tokio::test]
    async fn test_send_delivers_in_order() {
        let registry = ListenerRegistry::new();
        let mut sub = registry.register(Query::collection("medicines"));

        registry.send(sub.id(), Ok(Snapshot::empty(1)));
        registry.send(sub.id(), Ok(Snapshot::empty(2)));

        assert_eq!(sub.next().await.unwrap().unwrap().version, 1);
        assert_eq!(sub.next().await.unwrap().unwrap().version, 2);
    }
}
