//! Key encoding for the shared metadata key space.
//!
//! Every key is `tag || suffix`. Fixed-width identifiers are big-endian so
//! byte order equals numeric order:
//!
//! | collection | suffix                                        |
//! |------------|-----------------------------------------------|
//! | inode      | `ino: u64`                                    |
//! | dentry     | `parent: u64` then raw name bytes             |
//! | extend     | `ino: u64`                                    |
//! | multipart  | `key_len: u32`, key bytes, upload id bytes    |
//!
//! [`boundary`] returns `tag + 1`, which sorts after every key of the
//! collection and is used as the upper bound of whole-collection scans.

use crate::error::{StoreError, StoreResult};
use crate::tables::APPLY_INDEX_KEY;
use std::fmt;
use std::str::FromStr;

/// One-byte discriminator partitioning the key space
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum CollectionTag {
    Inode = 0,
    Dentry = 1,
    Extend = 2,
    Multipart = 3,
}

// boundary() needs tag + 1 to stay a valid byte below the reserved key.
const _: () = assert!((CollectionTag::Multipart as u8) < u8::MAX);
const _: () = assert!((CollectionTag::Multipart as u8) + 1 < APPLY_INDEX_KEY[0]);

impl CollectionTag {
    /// All collections in key order
    pub const ALL: [Self; 4] = [Self::Inode, Self::Dentry, Self::Extend, Self::Multipart];

    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Inode),
            1 => Some(Self::Dentry),
            2 => Some(Self::Extend),
            3 => Some(Self::Multipart),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Inode => "inode",
            Self::Dentry => "dentry",
            Self::Extend => "extend",
            Self::Multipart => "multipart",
        }
    }
}

impl fmt::Display for CollectionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CollectionTag {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| StoreError::InvalidKey(format!("unknown collection: {s}")))
    }
}

/// Lowest possible key of a collection
#[must_use]
pub fn prefix(tag: CollectionTag) -> Vec<u8> {
    vec![tag.as_byte()]
}

/// Upper bound spanning the whole collection (`tag + 1`)
#[must_use]
pub fn boundary(tag: CollectionTag) -> Vec<u8> {
    vec![tag.as_byte() + 1]
}

fn tagged_u64(tag: CollectionTag, id: u64, extra: usize) -> Vec<u8> {
    let mut key = Vec::with_capacity(9 + extra);
    key.push(tag.as_byte());
    key.extend_from_slice(&id.to_be_bytes());
    key
}

#[must_use]
pub fn inode_key(ino: u64) -> Vec<u8> {
    tagged_u64(CollectionTag::Inode, ino, 0)
}

#[must_use]
pub fn dentry_key(parent: u64, name: &str) -> Vec<u8> {
    let mut key = tagged_u64(CollectionTag::Dentry, parent, name.len());
    key.extend_from_slice(name.as_bytes());
    key
}

#[must_use]
pub fn extend_key(ino: u64) -> Vec<u8> {
    tagged_u64(CollectionTag::Extend, ino, 0)
}

/// Multipart keys sort by object key length first, then key, then upload id.
#[must_use]
pub fn multipart_key(object_key: &str, upload_id: &str) -> Vec<u8> {
    // Longer keys are rejected by check_multipart_key before any write.
    let len = u32::try_from(object_key.len()).unwrap_or(u32::MAX);
    let mut key = Vec::with_capacity(5 + object_key.len() + upload_id.len());
    key.push(CollectionTag::Multipart.as_byte());
    key.extend_from_slice(&len.to_be_bytes());
    key.extend_from_slice(object_key.as_bytes());
    key.extend_from_slice(upload_id.as_bytes());
    key
}

/// Directory entry names are stored unterminated after the parent id, so a
/// NUL byte is never allowed inside one.
pub fn check_dentry_name(name: &str) -> StoreResult<()> {
    if name.as_bytes().contains(&0) {
        return Err(StoreError::InvalidKey(format!(
            "dentry name contains NUL: {name:?}"
        )));
    }
    Ok(())
}

pub fn check_multipart_key(object_key: &str) -> StoreResult<()> {
    if u32::try_from(object_key.len()).is_err() {
        return Err(StoreError::InvalidKey(format!(
            "multipart object key too long: {} bytes",
            object_key.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_inode_key_layout() {
        assert_eq!(inode_key(0x0102), vec![0, 0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(extend_key(7)[0], CollectionTag::Extend.as_byte());
        assert_eq!(extend_key(7).len(), 9);
    }

    #[test]
    fn test_inode_key_order_matches_numeric_order() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let a: u64 = rng.r#gen();
            let b: u64 = rng.r#gen();
            assert_eq!(a.cmp(&b), inode_key(a).cmp(&inode_key(b)));
            assert_eq!(a.cmp(&b), extend_key(a).cmp(&extend_key(b)));
        }
        assert!(inode_key(255) < inode_key(256));
    }

    #[test]
    fn test_dentry_key_order() {
        assert!(dentry_key(5, "a") < dentry_key(5, "b"));
        assert!(dentry_key(5, "b") < dentry_key(6, "a"));
        assert!(dentry_key(5, "zzzz") < dentry_key(6, ""));
        assert!(dentry_key(5, "") < dentry_key(5, "a"));
        assert!(dentry_key(5, "ab") > dentry_key(5, "a"));
    }

    #[test]
    fn test_multipart_key_layout() {
        let key = multipart_key("obj1", "u1");
        assert_eq!(key[0], CollectionTag::Multipart.as_byte());
        assert_eq!(&key[1..5], &4u32.to_be_bytes());
        assert_eq!(&key[5..9], b"obj1");
        assert_eq!(&key[9..], b"u1");
        assert_ne!(multipart_key("obj1", "u1"), multipart_key("obj1", "u2"));
        // The length prefix separates "ab"+"c" from "a"+"bc".
        assert_ne!(multipart_key("ab", "c"), multipart_key("a", "bc"));
    }

    #[test]
    fn test_boundary_spans_collection() {
        for tag in CollectionTag::ALL {
            let end = boundary(tag);
            assert!(prefix(tag) < end);
            let samples = match tag {
                CollectionTag::Inode => vec![inode_key(u64::MAX)],
                CollectionTag::Dentry => vec![dentry_key(u64::MAX, "\u{10FFFF}")],
                CollectionTag::Extend => vec![extend_key(u64::MAX)],
                CollectionTag::Multipart => vec![multipart_key("zz", "zz")],
            };
            for key in samples {
                assert!(key < end, "{tag} key escapes boundary");
            }
        }
        assert!(boundary(CollectionTag::Multipart).as_slice() < APPLY_INDEX_KEY);
    }

    #[test]
    fn test_collection_tag_parse() {
        assert_eq!("Dentry".parse::<CollectionTag>().unwrap(), CollectionTag::Dentry);
        assert!("bogus".parse::<CollectionTag>().is_err());
        for tag in CollectionTag::ALL {
            assert_eq!(CollectionTag::from_byte(tag.as_byte()), Some(tag));
        }
        assert_eq!(CollectionTag::from_byte(9), None);
    }

    #[test]
    fn test_check_dentry_name() {
        assert!(check_dentry_name("file.txt").is_ok());
        assert!(check_dentry_name("").is_ok());
        assert!(check_dentry_name("a\0b").is_err());
    }
}
