use thiserror::Error;

/// Failures raised by the datastore client boundary.
#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("datastore unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt entity data: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("redb database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("encoding error: {0}")]
    Encoding(#[from] Box<bincode::ErrorKind>),
}

/// Failures raised by the mapping layer itself. Translator failures carry
/// the path at which they occurred.
#[derive(Debug, Error)]
pub enum MapperError {
    #[error("instance of {0} is not associated with this session")]
    NotAssociated(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cannot embed persistent instance at `{path}`; declare the field as a relation")]
    ForbiddenEmbed { path: String },

    #[error("type {0} has no constructor registered; decode cannot allocate it")]
    MissingConstructor(&'static str),

    #[error("no conversion from {from} to {to} at `{at}`")]
    Conversion { at: String, from: &'static str, to: String },

    #[error("map key `{0}` contains a reserved path separator")]
    BadMapKey(String),

    #[error("fetch options mismatch: chunk size {chunk} != prefetch size {prefetch}")]
    FetchOptionMismatch { chunk: usize, prefetch: usize },

    #[error("type {0} is not registered")]
    UnregisteredType(String),

    #[error("kind `{0}` is not registered")]
    UnregisteredKind(String),

    #[error("kind `{0}` is declared by more than one type")]
    DuplicateKind(String),

    #[error("could not assign value at `{at}`: {reason}")]
    Assignment { at: String, reason: String },

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("datastore error: {0}")]
    Datastore(#[from] DatastoreError),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl MapperError {
    pub fn assignment(path: &crate::path::Path, reason: impl Into<String>) -> Self {
        MapperError::Assignment { at: path.to_string(), reason: reason.into() }
    }

    pub fn conversion(path: &crate::path::Path, from: &'static str, to: impl Into<String>) -> Self {
        MapperError::Conversion { at: path.to_string(), from, to: to.into() }
    }
}
