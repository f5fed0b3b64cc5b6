//! In-memory [`RemoteStore`] implementation.
//!
//! Used by tests and by embedders that do not need persistence. Supports an
//! artificial write latency and injected failures so that the races between
//! in-flight writes and realtime snapshots can be reproduced.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    apply_write, DocPath, Document, ListenerRegistry, Query, RemoteStore, Snapshot, StoreError,
    StoredDocument, Subscription, Write,
};

#[derive(Default)]
struct Table {
    version: u64,
    docs: BTreeMap<DocPath, Document>,
}

impl Table {
    fn snapshot(&self, query: &Query) -> Snapshot {
        let documents = match query {
            Query::Document(path) => self
                .docs
                .get(path)
                .map(|data| {
                    vec![StoredDocument {
                        path: path.clone(),
                        data: data.clone(),
                    }]
                })
                .unwrap_or_default(),
            Query::Collection { .. } => self
                .docs
                .iter()
                .filter(|(path, data)| query.matches(path, data))
                .map(|(path, data)| StoredDocument {
                    path: path.clone(),
                    data: data.clone(),
                })
                .collect(),
        };
        Snapshot {
            version: self.version,
            documents,
        }
    }
}

#[derive(Default)]
struct Inner {
    table: Mutex<Table>,
    listeners: ListenerRegistry,
    write_latency: Mutex<Duration>,
    failures: Mutex<VecDeque<StoreError>>,
    commit_log: Mutex<Vec<Vec<Write>>>,
}

/// Shared in-memory document store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every subsequent commit by `latency` before it is applied.
    pub fn set_write_latency(&self, latency: Duration) {
        *lock(&self.inner.write_latency) = latency;
    }

    /// Makes the next commit fail with `error` without applying it.
    pub fn fail_next_commit(&self, error: StoreError) {
        lock(&self.inner.failures).push_back(error);
    }

    /// Every successfully applied commit batch, in order.
    pub fn commit_log(&self) -> Vec<Vec<Write>> {
        lock(&self.inner.commit_log).clone()
    }

    pub fn commit_count(&self) -> usize {
        lock(&self.inner.commit_log).len()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    pub fn version(&self) -> u64 {
        lock(&self.inner.table).version
    }

    /// Synchronous read, for assertions.
    pub fn document(&self, path: &DocPath) -> Option<Document> {
        lock(&self.inner.table).docs.get(path).cloned()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<StoredDocument>, StoreError> {
        let table = lock(&self.inner.table);
        Ok(table.docs.get(path).map(|data| StoredDocument {
            path: path.clone(),
            data: data.clone(),
        }))
    }

    async fn query(&self, query: &Query) -> Result<Snapshot, StoreError> {
        Ok(lock(&self.inner.table).snapshot(query))
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<u64, StoreError> {
        let latency = *lock(&self.inner.write_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if let Some(error) = lock(&self.inner.failures).pop_front() {
            return Err(error);
        }

        let version = {
            let mut table = lock(&self.inner.table);

            // Stage every write first so a failing write leaves the table untouched.
            let mut staged: BTreeMap<DocPath, Option<Document>> = BTreeMap::new();
            for write in &writes {
                let path = write.path().clone();
                let current = match staged.get(&path) {
                    Some(doc) => doc.clone(),
                    None => table.docs.get(&path).cloned(),
                };
                let next = apply_write(current, write)?;
                staged.insert(path, next);
            }
            for (path, doc) in staged {
                match doc {
                    Some(doc) => {
                        table.docs.insert(path, doc);
                    }
                    None => {
                        table.docs.remove(&path);
                    }
                }
            }
            table.version += 1;

            // Notify while still holding the table so per-listener order follows commit order.
            let paths: Vec<DocPath> = writes.iter().map(|w| w.path().clone()).collect();
            for (id, query) in self.inner.listeners.watching(&paths) {
                self.inner.listeners.send(id, Ok(table.snapshot(&query)));
            }
            table.version
        };

        tracing::trace!(version, writes = writes.len(), "memory store commit");
        lock(&self.inner.commit_log).push(writes);
        Ok(version)
    }

    async fn subscribe(&self, query: Query) -> Result<Subscription, StoreError> {
        let table = lock(&self.inner.table);
        let subscription = self.inner.listeners.register(query.clone());
        self.inner
            .listeners
            .send(subscription.id(), Ok(table.snapshot(&query)));
        Ok(subscription)
    }
}
