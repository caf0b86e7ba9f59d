pub mod memory;
pub mod redb_store;

use crate::error::DatastoreError;
use crate::property::PropertySet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Scalar types the datastore stores natively. Timestamps are microseconds
/// since the epoch.
#[derive(Clone, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum NativeValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
    Blob(Vec<u8>),
    Timestamp(i64),
    Key(Key),
}

impl NativeValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NativeValue::Null => "null",
            NativeValue::Bool(_) => "bool",
            NativeValue::I64(_) => "i64",
            NativeValue::F64(_) => "f64",
            NativeValue::Str(_) => "str",
            NativeValue::Blob(_) => "blob",
            NativeValue::Timestamp(_) => "timestamp",
            NativeValue::Key(_) => "key",
        }
    }
}

/// Identifier component of a key: either datastore-allocated numeric or a
/// caller-chosen name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyId {
    Id(i64),
    Name(String),
}

impl From<i64> for KeyId {
    fn from(n: i64) -> KeyId {
        KeyId::Id(n)
    }
}

impl From<String> for KeyId {
    fn from(name: String) -> KeyId {
        KeyId::Name(name)
    }
}

impl From<&str> for KeyId {
    fn from(name: &str) -> KeyId {
        KeyId::Name(name.to_string())
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Id(n) => write!(f, "{n}"),
            KeyId::Name(s) => write!(f, "{s}"),
        }
    }
}

/// A complete datastore key: kind, identifier and optional parent chain.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    pub kind: String,
    pub id: KeyId,
    pub parent: Option<Box<Key>>,
}

impl Key {
    pub fn new(kind: impl Into<String>, id: KeyId, parent: Option<Key>) -> Key {
        Key { kind: kind.into(), id, parent: parent.map(Box::new) }
    }

    pub fn with_id(kind: impl Into<String>, id: i64) -> Key {
        Key::new(kind, KeyId::Id(id), None)
    }

    pub fn with_name(kind: impl Into<String>, name: impl Into<String>) -> Key {
        Key::new(kind, KeyId::Name(name.into()), None)
    }

    pub fn parent(&self) -> Option<&Key> {
        self.parent.as_deref()
    }

    pub fn has_ancestor(&self, ancestor: &Key) -> bool {
        let mut current = self.parent();
        while let Some(k) = current {
            if k == ancestor {
                return true;
            }
            current = k.parent();
        }
        false
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = self.parent() {
            write!(f, "{parent}/")?;
        }
        write!(f, "{}({})", self.kind, self.id)
    }
}

/// Accumulates key material while an instance is encoded: the id field
/// fills `id`, the parent relation fills `parent`, a native-key field
/// short-circuits through `key`.
#[derive(Clone, Debug, Default)]
pub struct KeySpec {
    pub kind: String,
    pub id: Option<KeyId>,
    pub parent: Option<Key>,
    pub key: Option<Key>,
}

impl KeySpec {
    pub fn new(kind: impl Into<String>) -> KeySpec {
        KeySpec { kind: kind.into(), id: None, parent: None, key: None }
    }

    /// Folds the spec into a complete key; None when no id is known yet.
    pub fn to_key(&self) -> Option<Key> {
        if let Some(key) = &self.key {
            return Some(key.clone());
        }
        self.id.clone().map(|id| Key::new(self.kind.clone(), id, self.parent.clone()))
    }
}

/// The datastore's unit of storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub key: Key,
    pub props: PropertySet,
}

/// Comparison applied by a property filter.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterOp<T> {
    Eq(T),
    Ne(T),
    Lt(T),
    Le(T),
    Gt(T),
    Ge(T),
    In(Vec<T>),
}

impl<T: PartialOrd + PartialEq> FilterOp<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            FilterOp::Eq(expected) => value == expected,
            FilterOp::Ne(expected) => value != expected,
            FilterOp::Lt(expected) => value < expected,
            FilterOp::Le(expected) => value <= expected,
            FilterOp::Gt(expected) => value > expected,
            FilterOp::Ge(expected) => value >= expected,
            FilterOp::In(options) => options.contains(value),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PropertyFilter {
    pub name: String,
    pub op: FilterOp<NativeValue>,
}

/// A query over one kind, optionally restricted to an ancestor and a
/// single property filter.
#[derive(Clone, Debug)]
pub struct KindQuery {
    pub kind: String,
    pub ancestor: Option<Key>,
    pub filter: Option<PropertyFilter>,
    pub keys_only: bool,
}

impl KindQuery {
    pub fn kind(kind: impl Into<String>) -> KindQuery {
        KindQuery { kind: kind.into(), ancestor: None, filter: None, keys_only: false }
    }

    pub fn keys_only(mut self) -> KindQuery {
        self.keys_only = true;
        self
    }

    pub fn with_filter(mut self, name: impl Into<String>, op: FilterOp<NativeValue>) -> KindQuery {
        self.filter = Some(PropertyFilter { name: name.into(), op });
        self
    }

    pub fn with_ancestor(mut self, ancestor: Key) -> KindQuery {
        self.ancestor = Some(ancestor);
        self
    }

    fn accepts(&self, entity: &Entity) -> bool {
        if entity.key.kind != self.kind {
            return false;
        }
        if let Some(ancestor) = &self.ancestor {
            if !entity.key.has_ancestor(ancestor) {
                return false;
            }
        }
        if let Some(filter) = &self.filter {
            let path = crate::path::Path::root(&filter.name);
            let hit = entity
                .props
                .slice_with_prefix(&path)
                .iter()
                .any(|p| filter.op.matches(&p.value));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// How result iteration batches fetch and decode work.
#[derive(Clone, Copy, Debug)]
pub struct FetchOptions {
    pub chunk_size: usize,
    pub prefetch_size: Option<usize>,
}

impl Default for FetchOptions {
    fn default() -> FetchOptions {
        FetchOptions { chunk_size: 20, prefetch_size: None }
    }
}

impl FetchOptions {
    pub fn chunk_size(size: usize) -> FetchOptions {
        FetchOptions { chunk_size: size, prefetch_size: None }
    }
}

pub type EntityIter = Box<dyn Iterator<Item = Result<Entity, DatastoreError>>>;

/// The native SDK surface the mapper consumes. Implementations complete
/// incomplete keys on `put` by allocating numeric ids.
pub trait DatastoreClient: Send + Sync {
    fn put(&self, entities: Vec<(KeySpec, PropertySet)>) -> Result<Vec<Key>, DatastoreError>;

    fn get(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>, DatastoreError>;

    fn delete(&self, keys: &[Key]) -> Result<(), DatastoreError>;

    fn query(&self, query: &KindQuery, fetch: &FetchOptions) -> Result<EntityIter, DatastoreError>;

    fn allocate_ids(&self, kind: &str, count: u64) -> Result<Range<i64>, DatastoreError>;
}
