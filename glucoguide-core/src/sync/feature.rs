use std::fmt::Debug;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::identity::Session;
use crate::store::{DocPath, Document, Query, SchemaError, Snapshot, Write};

/// How local mutations reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Each mutation returns its own writes, committed right away.
    Immediate,
    /// Mutations only touch the buffer; the whole buffer is flushed once the
    /// delay passes with no further mutation.
    Debounced(Duration),
}

/// What an operation can see besides the buffer.
#[derive(Debug, Clone)]
pub struct OpContext<'a, K> {
    pub session: &'a Session,
    pub key: &'a K,
    pub now: DateTime<Utc>,
}

impl<K> OpContext<'_, K> {
    pub fn owner(&self) -> &str {
        self.session.owner_id()
    }
}

/// One synchronized feature: its buffer shape, its query and its mutations.
///
/// Implementations are plain data transformations; all sequencing lives in
/// the reconciler.
pub trait Feature: Send + 'static {
    /// Secondary scope besides the owner, e.g. the selected date.
    type Key: Clone + PartialEq + Debug + Send + Sync + 'static;
    type Buffer: Clone + PartialEq + Debug + Send + Sync + 'static;
    type Op: Debug + Send + 'static;

    const NAME: &'static str;

    fn write_mode(&self) -> WriteMode;

    /// The buffer shown before any snapshot arrives, and after sign-out.
    fn empty(&self, key: &Self::Key) -> Self::Buffer;

    fn query(&self, owner: &str, key: &Self::Key) -> Result<Query, AppError>;

    fn decode(
        &self,
        owner: &str,
        key: &Self::Key,
        snapshot: &Snapshot,
    ) -> Result<Self::Buffer, SchemaError>;

    /// A document that must exist before the first edit. It is created only
    /// when a point read finds it missing.
    fn default_document(
        &self,
        _owner: &str,
        _key: &Self::Key,
    ) -> Result<Option<(DocPath, Document)>, AppError> {
        Ok(None)
    }

    /// Applies `op` to `buffer` and returns the writes to commit immediately.
    ///
    /// On error the caller discards `buffer`, so a failed op never leaves a
    /// partial edit behind.
    fn apply(
        &self,
        ctx: &OpContext<'_, Self::Key>,
        buffer: &mut Self::Buffer,
        op: Self::Op,
    ) -> Result<Vec<Write>, AppError>;

    /// Writes that persist the whole buffer, for debounced features.
    fn flush(
        &self,
        _owner: &str,
        _key: &Self::Key,
        _buffer: &Self::Buffer,
    ) -> Result<Vec<Write>, AppError> {
        Ok(Vec::new())
    }
}
