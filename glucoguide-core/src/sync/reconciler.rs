//! The synchronization state machine.
//!
//! [`Reconciler`] owns the buffer and decides what happens on each event. It
//! does no I/O: every method returns the [`Effect`]s the driver must perform.
//!
//! Ordering rules:
//! - Every teardown bumps the epoch. Snapshots and write acknowledgements
//!   tagged with an older epoch are ignored.
//! - A snapshot replaces the buffer wholesale, discarding unsaved local edits.
//! - While a write is in flight, snapshots are held back. When the last
//!   in-flight write is acknowledged, the held snapshot is applied only if its
//!   version is at least the acknowledged write's version.
//! - A snapshot older than the last acknowledged write is dropped.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::feature::{Feature, OpContext, WriteMode};
use crate::error::AppError;
use crate::identity::Session;
use crate::store::{DocPath, Document, Query, Snapshot, StoreError, Write};

/// Lifecycle of a feature instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No session; the buffer is the empty shape.
    Uninitialized,
    /// Subscribed, waiting for the first usable snapshot.
    Loading,
    /// The buffer reflects a snapshot (plus any local edits since).
    Subscribed,
}

/// I/O requested by the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Subscribe { epoch: u64, query: Query },
    /// Drop the current subscription handle.
    Unsubscribe,
    /// Point-read `path` and create it with `data` if missing. Acknowledged
    /// like a commit.
    EnsureDocument {
        epoch: u64,
        path: DocPath,
        data: Document,
    },
    Commit { epoch: u64, writes: Vec<Write> },
    /// (Re)start the debounce timer.
    ArmTimer(Duration),
    CancelTimer,
}

/// Read-only picture of a feature instance, published after every event.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureView<B> {
    pub phase: Phase,
    pub buffer: B,
    pub error: Option<AppError>,
    /// Local edits not yet handed to the store.
    pub dirty: bool,
    pub pending_writes: usize,
    pub signed_in: bool,
}

impl<B> FeatureView<B> {
    /// Whether the feature should render a login prompt instead of its UI.
    pub fn requires_login(&self) -> bool {
        !self.signed_in || matches!(self.error, Some(AppError::AuthRequired))
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn is_settled(&self) -> bool {
        !self.dirty && self.pending_writes == 0
    }
}

pub struct Reconciler<F: Feature> {
    feature: F,
    session: Option<Session>,
    key: F::Key,
    epoch: u64,
    phase: Phase,
    buffer: F::Buffer,
    dirty: bool,
    in_flight: usize,
    last_acked: u64,
    deferred: Option<Snapshot>,
    last_applied: Option<Snapshot>,
    error: Option<AppError>,
}

impl<F: Feature> Reconciler<F> {
    pub fn new(feature: F, key: F::Key) -> Self {
        let buffer = feature.empty(&key);
        Self {
            feature,
            session: None,
            key,
            epoch: 0,
            phase: Phase::Uninitialized,
            buffer,
            dirty: false,
            in_flight: 0,
            last_acked: 0,
            deferred: None,
            last_applied: None,
            error: None,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn buffer(&self) -> &F::Buffer {
        &self.buffer
    }

    pub fn key(&self) -> &F::Key {
        &self.key
    }

    pub fn error(&self) -> Option<&AppError> {
        self.error.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// No unsaved edits and no writes awaiting acknowledgement.
    pub fn is_settled(&self) -> bool {
        !self.dirty && self.in_flight == 0
    }

    pub fn view(&self) -> FeatureView<F::Buffer> {
        FeatureView {
            phase: self.phase,
            buffer: self.buffer.clone(),
            error: self.error.clone(),
            dirty: self.dirty,
            pending_writes: self.in_flight,
            signed_in: self.session.is_some(),
        }
    }

    /// Identity established or cleared.
    ///
    /// A session for the same owner (e.g. a display name change) is stored
    /// without resubscribing.
    pub fn set_session(&mut self, session: Option<Session>) -> Vec<Effect> {
        let same_owner = match (&self.session, &session) {
            (Some(old), Some(new)) => old.owner_id() == new.owner_id(),
            (None, None) => true,
            _ => false,
        };
        self.session = session;
        if same_owner && self.epoch > 0 {
            return Vec::new();
        }
        self.restart()
    }

    /// Date key changed. Treated exactly like an identity change.
    pub fn set_key(&mut self, key: F::Key) -> Vec<Effect> {
        if key == self.key {
            return Vec::new();
        }
        self.key = key;
        self.restart()
    }

    /// Tears down the current scope and, if signed in, starts the next one.
    fn restart(&mut self) -> Vec<Effect> {
        self.epoch += 1;
        self.dirty = false;
        self.in_flight = 0;
        self.last_acked = 0;
        self.deferred = None;
        self.last_applied = None;
        self.error = None;
        self.buffer = self.feature.empty(&self.key);

        let mut effects = vec![Effect::CancelTimer, Effect::Unsubscribe];

        let owner = match &self.session {
            Some(session) => session.owner_id().to_string(),
            None => {
                tracing::debug!(feature = F::NAME, "signed out, buffer cleared");
                self.phase = Phase::Uninitialized;
                return effects;
            }
        };

        self.phase = Phase::Loading;
        tracing::debug!(feature = F::NAME, owner = %owner, key = ?self.key, epoch = self.epoch, "subscribing");

        match self.feature.query(&owner, &self.key) {
            Ok(query) => effects.push(Effect::Subscribe {
                epoch: self.epoch,
                query,
            }),
            Err(e) => {
                self.error = Some(e);
                return effects;
            }
        }

        match self.feature.default_document(&owner, &self.key) {
            Ok(Some((path, data))) => {
                self.in_flight += 1;
                effects.push(Effect::EnsureDocument {
                    epoch: self.epoch,
                    path,
                    data,
                });
            }
            Ok(None) => {}
            Err(e) => self.error = Some(e),
        }

        effects
    }

    /// A realtime snapshot (or subscription error) arrived.
    pub fn on_snapshot(
        &mut self,
        epoch: u64,
        item: Result<Snapshot, StoreError>,
    ) -> Vec<Effect> {
        if epoch != self.epoch {
            tracing::trace!(feature = F::NAME, epoch, current = self.epoch, "stale snapshot dropped");
            return Vec::new();
        }

        let snapshot = match item {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(feature = F::NAME, error = %e, "subscription error");
                self.error = Some(e.into());
                return Vec::new();
            }
        };

        if snapshot.version < self.last_acked {
            tracing::trace!(
                feature = F::NAME,
                version = snapshot.version,
                last_acked = self.last_acked,
                "snapshot older than acknowledged write dropped"
            );
            return Vec::new();
        }

        if self.in_flight > 0 {
            self.deferred = Some(snapshot);
            return Vec::new();
        }

        self.apply_snapshot(snapshot)
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot) -> Vec<Effect> {
        let owner = match &self.session {
            Some(session) => session.owner_id().to_string(),
            None => return Vec::new(),
        };

        // Dirty edits were made after every issued write. A snapshot no newer
        // than our last acknowledged write carries nothing those edits lack.
        if self.dirty && snapshot.version <= self.last_acked {
            tracing::trace!(
                feature = F::NAME,
                version = snapshot.version,
                "echo of own write kept behind newer local edits"
            );
            self.phase = Phase::Subscribed;
            self.last_applied = Some(snapshot);
            return Vec::new();
        }

        match self.feature.decode(&owner, &self.key, &snapshot) {
            Ok(buffer) => {
                self.buffer = buffer;
                self.phase = Phase::Subscribed;
                self.last_applied = Some(snapshot);
                if self.dirty {
                    tracing::debug!(feature = F::NAME, "snapshot replaced unsaved edits");
                    self.dirty = false;
                    return vec![Effect::CancelTimer];
                }
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(feature = F::NAME, error = %e, "snapshot rejected");
                self.phase = Phase::Subscribed;
                self.error = Some(e.into());
                Vec::new()
            }
        }
    }

    /// The subscription could not be opened.
    pub fn on_subscribe_failed(&mut self, epoch: u64, error: StoreError) {
        if epoch == self.epoch {
            tracing::warn!(feature = F::NAME, error = %error, "subscribe failed");
            self.error = Some(error.into());
        }
    }

    /// Applies a local mutation to the buffer.
    pub fn apply(&mut self, op: F::Op, now: DateTime<Utc>) -> Result<Vec<Effect>, AppError> {
        let session = match &self.session {
            Some(session) => session,
            None => {
                self.error = Some(AppError::AuthRequired);
                return Err(AppError::AuthRequired);
            }
        };

        let ctx = OpContext {
            session,
            key: &self.key,
            now,
        };
        let mut scratch = self.buffer.clone();
        let writes = match self.feature.apply(&ctx, &mut scratch, op) {
            Ok(writes) => writes,
            Err(e) => {
                self.error = Some(e.clone());
                return Err(e);
            }
        };
        self.buffer = scratch;
        self.error = None;

        match self.feature.write_mode() {
            WriteMode::Immediate => {
                if writes.is_empty() {
                    return Ok(Vec::new());
                }
                self.in_flight += 1;
                Ok(vec![Effect::Commit {
                    epoch: self.epoch,
                    writes,
                }])
            }
            WriteMode::Debounced(delay) => {
                self.dirty = true;
                Ok(vec![Effect::ArmTimer(delay)])
            }
        }
    }

    /// The debounce delay passed with no further mutation.
    pub fn on_debounce_elapsed(&mut self) -> Vec<Effect> {
        if !self.dirty {
            return Vec::new();
        }
        self.dirty = false;

        let owner = match &self.session {
            Some(session) => session.owner_id().to_string(),
            None => return Vec::new(),
        };
        match self.feature.flush(&owner, &self.key, &self.buffer) {
            Ok(writes) if writes.is_empty() => Vec::new(),
            Ok(writes) => {
                self.in_flight += 1;
                vec![Effect::Commit {
                    epoch: self.epoch,
                    writes,
                }]
            }
            Err(e) => {
                self.error = Some(e);
                Vec::new()
            }
        }
    }

    /// Flushes pending debounced edits without waiting for the timer.
    pub fn flush_now(&mut self) -> Vec<Effect> {
        if !self.dirty {
            return Vec::new();
        }
        let mut effects = vec![Effect::CancelTimer];
        effects.extend(self.on_debounce_elapsed());
        effects
    }

    /// A commit (or ensure-document) finished. `Ok(None)` means nothing was written.
    pub fn on_write_ack(
        &mut self,
        epoch: u64,
        result: Result<Option<u64>, StoreError>,
    ) -> Vec<Effect> {
        if epoch != self.epoch {
            tracing::trace!(feature = F::NAME, epoch, "stale write acknowledgement ignored");
            return Vec::new();
        }
        self.in_flight = self.in_flight.saturating_sub(1);

        let failed = match result {
            Ok(Some(version)) => {
                self.last_acked = self.last_acked.max(version);
                false
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(feature = F::NAME, error = %e, "write failed");
                self.error = Some(e.into());
                true
            }
        };

        if self.in_flight > 0 {
            return Vec::new();
        }

        match self.deferred.take() {
            Some(snapshot) if snapshot.version >= self.last_acked => self.apply_snapshot(snapshot),
            Some(snapshot) => {
                tracing::trace!(
                    feature = F::NAME,
                    version = snapshot.version,
                    last_acked = self.last_acked,
                    "held snapshot superseded by acknowledged write"
                );
                Vec::new()
            }
            // A failed immediate write leaves an optimistic edit the store
            // will never echo; fall back to the last applied snapshot.
            None if failed && self.feature.write_mode() == WriteMode::Immediate => {
                match self.last_applied.clone() {
                    Some(snapshot) => {
                        let error = self.error.clone();
                        let effects = self.apply_snapshot(snapshot);
                        self.error = error;
                        effects
                    }
                    None => {
                        self.buffer = self.feature.empty(&self.key);
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        }
    }
}
