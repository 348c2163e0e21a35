//! Metanode Store - embedded metadata storage for one metadata partition
//!
//! Inodes, directory entries, extended attributes and multipart uploads
//! share a single redb table. Every key starts with a one-byte collection
//! tag, so each collection is a contiguous, independently scannable key
//! range. Every mutating commit also records the replicated-log apply
//! index, so the persisted index never disagrees with the data.
//!
//! ```text
//!   Collection<'_, R>  ──encode key──▶  codec
//!          │
//!          ▼
//!      MetaStore  ──▶ redb (single "metadata" table)
//!          │
//!          └─▶ MetaSnapshot (read transaction, MVCC view)
//! ```

pub mod codec;
pub mod collection;
pub mod error;
pub mod snapshot;
pub mod store;
pub mod tables;
pub mod types;

// Re-exports
pub use codec::CollectionTag;
pub use collection::{Collection, DentryTree, ExtendTree, InodeTree, MultipartTree, Record};
pub use error::{StoreError, StoreResult};
pub use snapshot::MetaSnapshot;
pub use store::MetaStore;
pub use types::{Dentry, DentryId, Extend, ExtentKey, Inode, Multipart, MultipartId, Part};
