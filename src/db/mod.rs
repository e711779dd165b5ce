// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Document store layer.
//!
//! [`DocumentStore`] is the seam between the bindings/gateway and the remote
//! store. [`FirestoreDb`] talks to Firestore; [`MemoryStore`] keeps
//! everything in-process (offline mode and tests).

pub mod firestore;
pub mod memory;
pub mod query;
pub mod value;

pub use self::firestore::FirestoreDb;
pub use memory::MemoryStore;
pub use query::{Direction, Filter, FilterOp, QueryBuilder, QueryHandle, QuerySpec, Sort};
pub use value::{normalize_fields, Fields, Value};

use crate::error::{AppError, Result};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use ring::rand::{SecureRandom, SystemRandom};
use serde::de::DeserializeOwned;
use std::fmt;
use std::str::FromStr;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "user";
    pub const ROLES: &str = "role";
    pub const COMPANIES: &str = "company";
    /// People are stored under the legacy `contact` name.
    pub const CONTACTS: &str = "contact";
    pub const EVENTS: &str = "event";
    pub const CATEGORIES: &str = "category";
    pub const COMMUNITY: &str = "community";
    pub const PILLARS: &str = "pillar";
    pub const RESOURCES: &str = "resource";
    pub const TABS: &str = "tab";
    pub const ADS: &str = "ad";
    pub const NAVIGATION: &str = "navigation";
}

/// Audit field stamped on creation.
pub const CREATED_ON: &str = "createdOn";
/// Audit field stamped on every write.
pub const MODIFIED_ON: &str = "modifiedOn";

/// Address of a single document: `collection/id`, where the collection part
/// may itself be nested (`company/1/notes/7`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    collection: String,
    id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Parse a slash-separated path with an even number of segments.
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = || AppError::InvalidArgument(format!("not a document path: {path:?}"));
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        if segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty()) {
            return Err(invalid());
        }
        let Some((id, collection)) = segments.split_last() else {
            return Err(invalid());
        };
        if collection.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(collection.join("/"), *id))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Top-level collection this document lives under.
    pub fn root_collection(&self) -> &str {
        self.collection
            .split('/')
            .next()
            .unwrap_or(&self.collection)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

impl FromStr for DocPath {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A document as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Decode into a typed entity, injecting the document ID as `id`.
    pub fn decode<T: DeserializeOwned>(&self, collection: &str) -> Result<T> {
        let mut json = value::fields_to_json(&self.fields);
        json.insert("id".to_string(), serde_json::Value::String(self.id.clone()));
        serde_json::from_value(serde_json::Value::Object(json)).map_err(|e| AppError::Decode {
            path: format!("{}/{}", collection, self.id),
            message: e.to_string(),
        })
    }
}

/// Kind of write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Create or fully replace.
    Set,
    /// Merge into an existing document; fails if it doesn't exist.
    Update,
    Delete,
}

/// Store-side transformation applied to one field as part of a write.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOp {
    /// Set to the store's clock at commit time.
    ServerTimestamp,
    /// Append elements not already present.
    ArrayUnion(Vec<Value>),
    /// Remove every occurrence of the given elements.
    ArrayRemove(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldTransform {
    pub field: String,
    pub op: TransformOp,
}

/// A single document write.
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub path: DocPath,
    pub kind: WriteKind,
    pub fields: Fields,
    pub transforms: Vec<FieldTransform>,
}

impl Write {
    pub fn set(path: DocPath, fields: Fields) -> Self {
        Self {
            path,
            kind: WriteKind::Set,
            fields,
            transforms: Vec::new(),
        }
    }

    pub fn update(path: DocPath, fields: Fields) -> Self {
        Self {
            path,
            kind: WriteKind::Update,
            fields,
            transforms: Vec::new(),
        }
    }

    pub fn delete(path: DocPath) -> Self {
        Self {
            path,
            kind: WriteKind::Delete,
            fields: Fields::new(),
            transforms: Vec::new(),
        }
    }

    pub fn transform(mut self, field: impl Into<String>, op: TransformOp) -> Self {
        self.transforms.push(FieldTransform {
            field: field.into(),
            op,
        });
        self
    }

    /// Shorthand for a server-timestamp transform.
    pub fn stamp(self, field: &str) -> Self {
        self.transform(field, TransformOp::ServerTimestamp)
    }
}

/// Stream of full snapshots. Dropping it ends the subscription.
pub type SnapshotStream<T> = BoxStream<'static, Result<T>>;

/// Remote document store.
///
/// Listeners deliver the complete current result on every change (never a
/// diff). A listener that yields an error is finished.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Fetch one document; `Ok(None)` if it doesn't exist.
    async fn get(&self, path: &DocPath) -> Result<Option<Document>>;

    /// Run a query once.
    async fn query(&self, query: &QueryHandle) -> Result<Vec<Document>>;

    /// Count matching documents using the store's aggregation.
    async fn count(&self, query: &QueryHandle) -> Result<u64>;

    /// Apply a write, including its field transforms.
    async fn commit(&self, write: Write) -> Result<()>;

    /// Follow a query's result set.
    fn listen_query(&self, query: QueryHandle) -> SnapshotStream<Vec<Document>>;

    /// Follow a single document.
    fn listen_document(&self, path: DocPath) -> SnapshotStream<Option<Document>>;
}

const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const ID_LENGTH: usize = 20;

/// Generate a random 20-character document ID.
pub fn generate_document_id() -> Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; ID_LENGTH];
    rng.fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("system RNG unavailable")))?;
    Ok(bytes
        .iter()
        .map(|b| ID_ALPHABET[*b as usize % ID_ALPHABET.len()] as char)
        .collect())
}
