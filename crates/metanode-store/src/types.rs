//! Stored types for metadata persistence.
//!
//! These types are serialized to redb via bincode. Maps are `BTreeMap` so
//! the encoded bytes are deterministic.

use metanode_common::{FileType, unix_now};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---- Inodes ----

/// Location of one extent of file data
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtentKey {
    pub file_offset: u64,
    pub partition_id: u64,
    pub extent_id: u64,
    pub extent_offset: u64,
    pub size: u32,
    pub crc: u32,
}

impl ExtentKey {
    /// File offset just past this extent
    #[must_use]
    pub fn end(&self) -> u64 {
        self.file_offset.saturating_add(u64::from(self.size))
    }
}

/// Inode record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inode {
    pub inode: u64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub generation: u64,
    pub create_time: i64,
    pub access_time: i64,
    pub modify_time: i64,
    /// Symlink target, empty for other types
    pub link_target: Vec<u8>,
    pub nlink: u32,
    pub flag: u32,
    pub extents: Vec<ExtentKey>,
}

impl Inode {
    /// Create a fresh inode with current timestamps
    #[must_use]
    pub fn new(inode: u64, mode: u32) -> Self {
        let now = unix_now();
        let nlink = if FileType::from_mode(mode) == FileType::Directory {
            2
        } else {
            1
        };
        Self {
            inode,
            mode,
            generation: 1,
            create_time: now,
            access_time: now,
            modify_time: now,
            nlink,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn file_type(&self) -> FileType {
        FileType::from_mode(self.mode)
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.file_type() == FileType::Directory
    }

    #[must_use]
    pub fn is_regular(&self) -> bool {
        self.file_type() == FileType::Regular
    }

    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.file_type() == FileType::Symlink
    }

    /// Update access and modify time to now and bump the generation
    pub fn touch(&mut self) {
        let now = unix_now();
        self.access_time = now;
        self.modify_time = now;
        self.generation += 1;
    }

    /// Append an extent, growing the size if it ends past the current size
    pub fn append_extent(&mut self, ek: ExtentKey) {
        self.size = self.size.max(ek.end());
        self.extents.push(ek);
        self.generation += 1;
    }
}

// ---- Directory entries ----

/// Identity of a directory entry
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DentryId {
    pub parent_id: u64,
    pub name: String,
}

impl DentryId {
    #[must_use]
    pub fn new(parent_id: u64, name: impl Into<String>) -> Self {
        Self {
            parent_id,
            name: name.into(),
        }
    }
}

/// Directory entry record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dentry {
    pub parent_id: u64,
    pub name: String,
    pub inode: u64,
    /// Mode of the target inode (type bits are what matter)
    pub mode: u32,
}

impl Dentry {
    #[must_use]
    pub fn new(parent_id: u64, name: impl Into<String>, inode: u64, mode: u32) -> Self {
        Self {
            parent_id,
            name: name.into(),
            inode,
            mode,
        }
    }

    #[must_use]
    pub fn file_type(&self) -> FileType {
        FileType::from_mode(self.mode)
    }
}

// ---- Extended attributes ----

/// Extended attributes of one inode
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extend {
    pub inode: u64,
    pub attrs: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Extend {
    #[must_use]
    pub fn new(inode: u64) -> Self {
        Self {
            inode,
            attrs: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &[u8]) -> Option<&[u8]> {
        self.attrs.get(name).map(Vec::as_slice)
    }

    /// Set an attribute, returning the previous value
    pub fn set(&mut self, name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        self.attrs.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &[u8]) -> Option<Vec<u8>> {
        self.attrs.remove(name)
    }

    /// Attribute names in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.attrs.keys().map(Vec::as_slice)
    }
}

// ---- Multipart uploads ----

/// Identity of a multipart upload
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MultipartId {
    pub key: String,
    pub upload_id: String,
}

impl MultipartId {
    #[must_use]
    pub fn new(key: impl Into<String>, upload_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            upload_id: upload_id.into(),
        }
    }
}

/// One uploaded part
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub id: u16,
    pub upload_time: i64,
    pub md5: String,
    pub size: u64,
    /// Inode holding the part data
    pub inode: u64,
}

/// State of an in-progress multipart upload
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multipart {
    pub key: String,
    pub upload_id: String,
    pub init_time: i64,
    /// Parts ordered by id
    pub parts: Vec<Part>,
    pub extend: BTreeMap<String, String>,
}

impl Multipart {
    #[must_use]
    pub fn new(key: impl Into<String>, upload_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            upload_id: upload_id.into(),
            init_time: unix_now(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn part(&self, id: u16) -> Option<&Part> {
        self.parts
            .binary_search_by_key(&id, |p| p.id)
            .ok()
            .map(|i| &self.parts[i])
    }

    /// Insert a part, replacing (and returning) any part with the same id
    pub fn insert_part(&mut self, part: Part) -> Option<Part> {
        match self.parts.binary_search_by_key(&part.id, |p| p.id) {
            Ok(i) => Some(std::mem::replace(&mut self.parts[i], part)),
            Err(i) => {
                self.parts.insert(i, part);
                None
            }
        }
    }

    pub fn remove_part(&mut self, id: u16) -> Option<Part> {
        self.parts
            .binary_search_by_key(&id, |p| p.id)
            .ok()
            .map(|i| self.parts.remove(i))
    }

    /// Sum of all part sizes
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.parts.iter().map(|p| p.size).sum()
    }
}
