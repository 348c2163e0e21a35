//! Typed access to one collection of the metadata store.
//!
//! [`Collection`] is a thin, stateless view over a [`MetaStore`]: it encodes
//! the record identity with the key codec, delegates byte work to the store
//! and decodes results. What differs per collection (tag, key layout, key
//! validation) lives in the [`Record`] impl of the stored type.
//!
//! `create` checks for an existing value and writes inside one redb write
//! transaction. Callers still apply mutations in replicated-log order, so
//! no extra locking is done here.

use crate::codec::{self, CollectionTag};
use crate::error::{StoreError, StoreResult};
use crate::snapshot::MetaSnapshot;
use crate::store::MetaStore;
use crate::types::{Dentry, DentryId, Extend, Inode, Multipart, MultipartId};
use bincode::Options;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Fixed-width little-endian bincode that fails on bytes left over after
/// the record.
fn record_codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// A record type stored in its own collection
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: CollectionTag;

    /// Identity used for point lookups and scan bounds
    type Id;

    fn id_key(id: &Self::Id) -> Vec<u8>;

    /// Encoded key of this record
    fn key(&self) -> Vec<u8>;

    /// Reject records whose key cannot be encoded unambiguously
    fn validate(&self) -> StoreResult<()> {
        Ok(())
    }

    fn encode(&self) -> StoreResult<Vec<u8>> {
        record_codec().serialize(self).map_err(|source| StoreError::Encode {
            collection: Self::COLLECTION,
            source,
        })
    }

    fn decode(bytes: &[u8]) -> StoreResult<Self> {
        record_codec().deserialize(bytes).map_err(|source| StoreError::Decode {
            collection: Self::COLLECTION,
            source,
        })
    }
}

impl Record for Inode {
    const COLLECTION: CollectionTag = CollectionTag::Inode;
    type Id = u64;

    fn id_key(id: &u64) -> Vec<u8> {
        codec::inode_key(*id)
    }

    fn key(&self) -> Vec<u8> {
        codec::inode_key(self.inode)
    }
}

impl Record for Dentry {
    const COLLECTION: CollectionTag = CollectionTag::Dentry;
    type Id = DentryId;

    fn id_key(id: &DentryId) -> Vec<u8> {
        codec::dentry_key(id.parent_id, &id.name)
    }

    fn key(&self) -> Vec<u8> {
        codec::dentry_key(self.parent_id, &self.name)
    }

    fn validate(&self) -> StoreResult<()> {
        codec::check_dentry_name(&self.name)
    }
}

impl Record for Extend {
    const COLLECTION: CollectionTag = CollectionTag::Extend;
    type Id = u64;

    fn id_key(id: &u64) -> Vec<u8> {
        codec::extend_key(*id)
    }

    fn key(&self) -> Vec<u8> {
        codec::extend_key(self.inode)
    }
}

impl Record for Multipart {
    const COLLECTION: CollectionTag = CollectionTag::Multipart;
    type Id = MultipartId;

    fn id_key(id: &MultipartId) -> Vec<u8> {
        codec::multipart_key(&id.key, &id.upload_id)
    }

    fn key(&self) -> Vec<u8> {
        codec::multipart_key(&self.key, &self.upload_id)
    }

    fn validate(&self) -> StoreResult<()> {
        codec::check_multipart_key(&self.key)
    }
}

/// Typed view of one collection
pub struct Collection<'a, R> {
    store: &'a MetaStore,
    _record: PhantomData<fn() -> R>,
}

pub type InodeTree<'a> = Collection<'a, Inode>;
pub type DentryTree<'a> = Collection<'a, Dentry>;
pub type ExtendTree<'a> = Collection<'a, Extend>;
pub type MultipartTree<'a> = Collection<'a, Multipart>;

impl<'a, R> Collection<'a, R> {
    pub(crate) const fn new(store: &'a MetaStore) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }
}

impl<R: Record> Collection<'_, R> {
    /// Fetch and decode the record with identity `id`
    pub fn get(&self, id: &R::Id) -> StoreResult<R> {
        let key = R::id_key(id);
        match self.store.get_bytes(&key)? {
            Some(bytes) if !bytes.is_empty() => R::decode(&bytes),
            _ => Err(StoreError::not_found(R::COLLECTION, &key)),
        }
    }

    pub fn contains(&self, id: &R::Id) -> StoreResult<bool> {
        self.store.has_key(&R::id_key(id))
    }

    /// Insert or overwrite `record`
    pub fn put(&self, record: &R) -> StoreResult<()> {
        record.validate()?;
        let bytes = record.encode()?;
        self.store.put(&record.key(), &bytes)
    }

    /// Insert `record`, failing with `AlreadyExists` if its key is taken
    pub fn create(&self, record: &R) -> StoreResult<()> {
        record.validate()?;
        let key = record.key();
        let bytes = record.encode()?;
        if self.store.put_if_absent(&key, &bytes)? {
            Ok(())
        } else {
            Err(StoreError::already_exists(R::COLLECTION, &key))
        }
    }

    pub fn delete(&self, id: &R::Id) -> StoreResult<()> {
        self.store.delete(&R::id_key(id))
    }

    /// Visit records from `start` through `end` inclusive, or to the end of
    /// the collection when `end` is `None`.
    pub fn range<F, E>(&self, start: &R::Id, end: Option<&R::Id>, visit: F) -> Result<(), E>
    where
        F: FnMut(R) -> Result<bool, E>,
        E: From<StoreError>,
    {
        let snapshot = self.store.new_snapshot()?;
        self.snapshot_range(&snapshot, start, end, visit)
    }

    /// [`Collection::range`] reading through a caller-held snapshot
    pub fn snapshot_range<F, E>(
        &self,
        snapshot: &MetaSnapshot,
        start: &R::Id,
        end: Option<&R::Id>,
        mut visit: F,
    ) -> Result<(), E>
    where
        F: FnMut(R) -> Result<bool, E>,
        E: From<StoreError>,
    {
        let start = R::id_key(start);
        let end = end.map_or_else(|| codec::boundary(R::COLLECTION), R::id_key);
        snapshot.range_bytes(&start, &end, |bytes| visit(R::decode(bytes)?))
    }

    /// Number of records; walks the whole collection
    pub fn count(&self) -> StoreResult<u64> {
        self.store.count(R::COLLECTION)
    }
}

impl Collection<'_, Dentry> {
    /// Visit the entries of directory `parent` in name order
    pub fn children<F, E>(&self, parent: u64, mut visit: F) -> Result<(), E>
    where
        F: FnMut(Dentry) -> Result<bool, E>,
        E: From<StoreError>,
    {
        let start = codec::dentry_key(parent, "");
        let end = parent.checked_add(1).map_or_else(
            || codec::boundary(CollectionTag::Dentry),
            |next| codec::dentry_key(next, ""),
        );
        self.store.range(&start, &end, |bytes| {
            let dentry = Dentry::decode(bytes)?;
            if dentry.parent_id != parent {
                return Ok(false);
            }
            visit(dentry)
        })
    }
}
