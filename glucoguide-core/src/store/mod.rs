//! Remote document store contract.
//!
//! The application talks to a managed document database with realtime
//! subscriptions. This module defines that contract as the [`RemoteStore`]
//! trait and provides an in-memory implementation. The CLI ships a SQLite
//! implementation on top of the same pieces.
//!
//! # Document layout
//!
//! ```text
//! users/<uid>                          profile attributes
//! users/<uid>/mealPlans/<YYYY-MM-DD>   meal-name -> [{id, name, gi, calories}]
//! medicines/<id>                       userId, name, dose, time, taken[]
//! sugarReadings/<uid>_<YYYY-MM-DD>     userId, date, Fasting, Before Meal, ...
//! forumPosts/<id>                      question, author, userId, replies[]
//! blogPosts/<id>                       title, slug, summary, image, content
//! ```

mod blob;
mod listeners;
mod memory;
mod path;
mod schema;
mod write;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use blob::{BlobStore, LocalBlobStore, UploadProgress};
pub use listeners::{ListenerRegistry, Subscription};
pub use memory::MemoryStore;
pub use path::DocPath;
pub use schema::{decode_fields, encode_fields, DocumentSchema, SchemaError};
pub use write::apply_write;

/// Raw document body: a JSON object.
pub type Document = serde_json::Map<String, Value>;

/// A document together with its path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub path: DocPath,
    pub data: Document,
}

/// The result set of a query at a given store version.
///
/// `version` is the store's commit counter when the snapshot was taken.
/// Snapshots for one subscription are delivered in increasing version order.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub version: u64,
    pub documents: Vec<StoredDocument>,
}

impl Snapshot {
    pub fn empty(version: u64) -> Self {
        Self {
            version,
            documents: Vec::new(),
        }
    }

    /// The first document, for single-document queries.
    pub fn single(&self) -> Option<&StoredDocument> {
        self.documents.first()
    }
}

/// Field equality filter for collection queries.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub equals: Value,
}

/// What a subscription or point query watches.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// A single document, which may not exist.
    Document(DocPath),
    /// All documents directly inside a collection, optionally filtered.
    Collection {
        collection: String,
        filter: Option<FieldFilter>,
    },
}

impl Query {
    pub fn document(path: DocPath) -> Self {
        Query::Document(path)
    }

    pub fn collection(collection: impl Into<String>) -> Self {
        Query::Collection {
            collection: collection.into(),
            filter: None,
        }
    }

    pub fn where_eq(
        collection: impl Into<String>,
        field: impl Into<String>,
        equals: impl Into<Value>,
    ) -> Self {
        Query::Collection {
            collection: collection.into(),
            filter: Some(FieldFilter {
                field: field.into(),
                equals: equals.into(),
            }),
        }
    }

    /// Whether a write to `path` can change this query's result set.
    pub fn watches(&self, path: &DocPath) -> bool {
        match self {
            Query::Document(p) => p == path,
            Query::Collection { collection, .. } => path.collection() == collection,
        }
    }

    /// Whether a document belongs in this query's result set.
    pub fn matches(&self, path: &DocPath, data: &Document) -> bool {
        match self {
            Query::Document(p) => p == path,
            Query::Collection { collection, filter } => {
                path.collection() == collection
                    && filter
                        .as_ref()
                        .map(|f| data.get(&f.field) == Some(&f.equals))
                        .unwrap_or(true)
            }
        }
    }
}

/// A single mutation in a commit batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Create or replace the whole document.
    Set { path: DocPath, data: Document },
    /// Create the document only if it does not exist yet.
    Create { path: DocPath, data: Document },
    /// Overwrite the given top-level fields, creating the document if absent.
    Merge { path: DocPath, fields: Document },
    /// Append values to an array field unless already present. The document must exist.
    ArrayUnion {
        path: DocPath,
        field: String,
        values: Vec<Value>,
    },
    /// Remove every occurrence of the values from an array field.
    ArrayRemove {
        path: DocPath,
        field: String,
        values: Vec<Value>,
    },
    /// Delete the document. Deleting a missing document is not an error.
    Delete { path: DocPath },
}

impl Write {
    pub fn path(&self) -> &DocPath {
        match self {
            Write::Set { path, .. }
            | Write::Create { path, .. }
            | Write::Merge { path, .. }
            | Write::ArrayUnion { path, .. }
            | Write::ArrayRemove { path, .. }
            | Write::Delete { path } => path,
        }
    }
}

/// Errors raised by store implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(DocPath),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Write rejected for {path}: {message}")]
    FailedPrecondition { path: DocPath, message: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt document {path}: {message}")]
    Corrupt { path: String, message: String },
}

/// Authenticated document database with realtime subscriptions.
///
/// Commits are atomic batches and return the store version they produced.
/// Subscriptions deliver an initial snapshot immediately and a fresh one after
/// every commit that touches a watched path.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Point read of a single document.
    async fn get(&self, path: &DocPath) -> Result<Option<StoredDocument>, StoreError>;

    /// One-off query.
    async fn query(&self, query: &Query) -> Result<Snapshot, StoreError>;

    /// Applies all writes atomically and returns the new store version.
    async fn commit(&self, writes: Vec<Write>) -> Result<u64, StoreError>;

    /// Opens a realtime subscription. Dropping the handle releases it.
    async fn subscribe(&self, query: Query) -> Result<Subscription, StoreError>;
}
