//! graft maps graphs of plain Rust records into a hierarchical key/value datastore and back,
//! flattening each instance into path-named properties and deriving datastore keys from
//! id, key and parent fields.
//!
//! Types are registered once in a [`model::Registry`]; a single-threaded [`ObjectDatastore`]
//! session then stores, loads, updates and queries instance graphs through a pluggable
//! [`client::DatastoreClient`]. Two clients ship: an in-memory one for tests and a
//! [Redb](https://github.com/cberner/redb)-backed one with `bincode` entity bodies.
//! Relations (parent, child, independent) store on first encounter and decode through a
//! session cache, so cyclic graphs terminate and identity is preserved within a session.
//!

pub mod cache;
pub mod client;
pub mod command;
pub mod config;
pub mod convert;
pub mod error;
pub mod logger;
pub mod model;
pub mod path;
pub mod property;
pub mod retry;
pub mod session;
pub mod translate;
pub mod value;

pub use cache::InstanceKeyCache;
pub use client::memory::MemoryDatastore;
pub use client::redb_store::RedbDatastore;
pub use client::{
    DatastoreClient, Entity, FetchOptions, FilterOp, Key, KeyId, KeySpec, KindQuery, NativeValue,
};
pub use command::{FindCommand, LoadCommand, StoreCommand};
pub use config::{Configuration, ModelConfiguration};
pub use convert::{ConverterChain, ValueConverter};
pub use error::{DatastoreError, MapperError};
pub use model::{FieldDef, FieldRole, Registry, RegistryBuilder, TypeModel};
pub use path::Path;
pub use property::{Property, PropertySet};
pub use session::{FindIterator, ObjectDatastore};
pub use translate::{PropertyTranslator, TranslatorSet};
pub use value::{DeclaredKind, Obj, ScalarKind, Value};

pub use bincode;
pub use chrono;
pub use rand;
pub use redb;
pub use serde;
pub use serde_json;
