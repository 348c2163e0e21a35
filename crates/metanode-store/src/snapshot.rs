//! Point-in-time views over the metadata store.
//!
//! A [`MetaSnapshot`] wraps a redb read transaction. Everything read
//! through it reflects the store as of [`MetaStore::new_snapshot`], no
//! matter what commits afterwards. Dropping the snapshot (or calling
//! [`MetaSnapshot::close`]) releases the history it pins, so hold one only
//! for the duration of a scan.
//!
//! [`MetaStore::new_snapshot`]: crate::MetaStore::new_snapshot

use crate::codec::{self, CollectionTag};
use crate::collection::Record;
use crate::error::{StoreError, StoreResult};
use crate::tables::{self, APPLY_INDEX_KEY};
use redb::{ReadTransaction, ReadableTable};

/// Immutable view of the store
pub struct MetaSnapshot {
    read_txn: ReadTransaction,
}

impl MetaSnapshot {
    pub(crate) const fn new(read_txn: ReadTransaction) -> Self {
        Self { read_txn }
    }

    pub fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let table = self.read_txn.open_table(tables::METADATA)?;
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    /// Apply index persisted together with the data in this view
    pub fn apply_index(&self) -> StoreResult<u64> {
        match self.get(APPLY_INDEX_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StoreError::CorruptApplyIndex(bytes.len()))?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    /// Visit values of keys in `[start, end]` in ascending key order.
    ///
    /// Stops at the first `Ok(false)` or error from `visit`; the error is
    /// returned unchanged.
    pub fn range_bytes<F, E>(&self, start: &[u8], end: &[u8], mut visit: F) -> Result<(), E>
    where
        F: FnMut(&[u8]) -> Result<bool, E>,
        E: From<StoreError>,
    {
        if start > end {
            return Ok(());
        }
        let table = self
            .read_txn
            .open_table(tables::METADATA)
            .map_err(StoreError::from)?;
        let entries = table
            .range::<&[u8]>(start..=end)
            .map_err(StoreError::from)?;
        for entry in entries {
            let (_key, value) = entry.map_err(StoreError::from)?;
            if !visit(value.value())? {
                break;
            }
        }
        Ok(())
    }

    /// Visit every value of a collection
    pub fn range<F, E>(&self, tag: CollectionTag, visit: F) -> Result<(), E>
    where
        F: FnMut(&[u8]) -> Result<bool, E>,
        E: From<StoreError>,
    {
        self.range_bytes(&codec::prefix(tag), &codec::boundary(tag), visit)
    }

    /// Decode and visit every record of collection `R`
    pub fn scan<R, F, E>(&self, mut visit: F) -> Result<(), E>
    where
        R: Record,
        F: FnMut(R) -> Result<bool, E>,
        E: From<StoreError>,
    {
        self.range(R::COLLECTION, |bytes| visit(R::decode(bytes)?))
    }

    /// Number of records in a collection at this snapshot
    pub fn count(&self, tag: CollectionTag) -> StoreResult<u64> {
        let mut count = 0u64;
        self.range(tag, |_| {
            count += 1;
            Ok::<_, StoreError>(true)
        })?;
        Ok(count)
    }

    /// Release the snapshot
    pub fn close(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::{CollectionTag, inode_key};
    use crate::error::StoreError;
    use crate::store::MetaStore;
    use crate::types::Inode;
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_isolation() {
        let dir = TempDir::new().unwrap();
        let store = MetaStore::open(dir.path(), 1 << 20, 1 << 20).unwrap();
        store.inodes().create(&Inode::new(1, 0o100_644)).unwrap();

        let before = store.new_snapshot().unwrap();
        store.inodes().put(&Inode::new(2, 0o100_644)).unwrap();
        store.inodes().delete(&1).unwrap();

        assert_eq!(before.count(CollectionTag::Inode).unwrap(), 1);
        let mut seen = Vec::new();
        before
            .scan::<Inode, _, StoreError>(|inode| {
                seen.push(inode.inode);
                Ok(true)
            })
            .unwrap();
        assert_eq!(seen, vec![1]);
        assert!(before.get(&inode_key(2)).unwrap().is_none());
        before.close();

        let after = store.new_snapshot().unwrap();
        assert_eq!(after.count(CollectionTag::Inode).unwrap(), 1);
        assert!(after.get(&inode_key(2)).unwrap().is_some());
        assert!(after.get(&inode_key(1)).unwrap().is_none());
    }

    #[test]
    fn test_snapshot_apply_index_matches_data() {
        let dir = TempDir::new().unwrap();
        let store = MetaStore::open(dir.path(), 1 << 20, 1 << 20).unwrap();
        store.set_apply_index(5);
        store.inodes().put(&Inode::new(1, 0o100_644)).unwrap();
        let snap = store.new_snapshot().unwrap();

        store.set_apply_index(6);
        store.inodes().put(&Inode::new(2, 0o100_644)).unwrap();

        assert_eq!(snap.apply_index().unwrap(), 5);
        assert_eq!(snap.count(CollectionTag::Inode).unwrap(), 1);
        assert_eq!(store.new_snapshot().unwrap().apply_index().unwrap(), 6);
    }

    #[test]
    fn test_closing_one_snapshot_leaves_others() {
        let dir = TempDir::new().unwrap();
        let store = MetaStore::open(dir.path(), 1 << 20, 1 << 20).unwrap();
        store.inodes().put(&Inode::new(7, 0o100_644)).unwrap();
        let snap = store.new_snapshot().unwrap();
        let other = store.new_snapshot().unwrap();
        other.close();
        assert_eq!(snap.count(CollectionTag::Inode).unwrap(), 1);
    }

    #[test]
    fn test_scan_surfaces_decode_error() {
        let dir = TempDir::new().unwrap();
        let store = MetaStore::open(dir.path(), 1 << 20, 1 << 20).unwrap();
        store.put(&inode_key(3), &[0xff]).unwrap();
        let snap = store.new_snapshot().unwrap();
        let err = snap
            .scan::<Inode, _, StoreError>(|_| Ok(true))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Decode {
                collection: CollectionTag::Inode,
                ..
            }
        ));
    }
}
