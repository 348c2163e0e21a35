//! Error types for the metadata store

use crate::codec::CollectionTag;
use std::path::PathBuf;

/// Error type for metadata store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open store at {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{collection} not found: {key}")]
    NotFound { collection: CollectionTag, key: String },

    #[error("{collection} already exists: {key}")]
    AlreadyExists { collection: CollectionTag, key: String },

    #[error("failed to decode {collection} record: {source}")]
    Decode {
        collection: CollectionTag,
        #[source]
        source: bincode::Error,
    },

    #[error("failed to encode {collection} record: {source}")]
    Encode {
        collection: CollectionTag,
        #[source]
        source: bincode::Error,
    },

    #[error("corrupt apply index: expected 8 bytes, found {0}")]
    CorruptApplyIndex(usize),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("store is closed")]
    Closed,

    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub(crate) fn not_found(collection: CollectionTag, key: &[u8]) -> Self {
        Self::NotFound {
            collection,
            key: hex::encode(key),
        }
    }

    pub(crate) fn already_exists(collection: CollectionTag, key: &[u8]) -> Self {
        Self::AlreadyExists {
            collection,
            key: hex::encode(key),
        }
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an already exists error
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// POSIX errno the metadata service should surface for this error
    #[must_use]
    pub const fn errno(&self) -> i32 {
        match self {
            Self::NotFound { .. } => libc::ENOENT,
            Self::AlreadyExists { .. } => libc::EEXIST,
            Self::InvalidKey(_) => libc::EINVAL,
            Self::Closed => libc::ESHUTDOWN,
            _ => libc::EIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = StoreError::not_found(CollectionTag::Inode, &[0, 1]);
        assert!(err.is_not_found());
        assert!(!err.is_already_exists());
        assert_eq!(err.errno(), libc::ENOENT);

        let err = StoreError::already_exists(CollectionTag::Dentry, b"x");
        assert!(err.is_already_exists());
        assert_eq!(err.errno(), libc::EEXIST);

        assert_eq!(StoreError::Closed.errno(), libc::ESHUTDOWN);
        assert_eq!(StoreError::CorruptApplyIndex(3).errno(), libc::EIO);
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::not_found(CollectionTag::Inode, &[0, 0x64]);
        assert_eq!(err.to_string(), "inode not found: 0064");
    }
}
