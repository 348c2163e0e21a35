//! Filesystem type helpers
//!
//! Mode-bit classification shared by inode and dentry records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of the root directory inode
pub const ROOT_INODE: u64 = 1;

// mode_t is u16 on some platforms
#[allow(clippy::unnecessary_cast)]
const S_IFMT: u32 = libc::S_IFMT as u32;

/// Kind of filesystem object, derived from POSIX mode bits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    Other,
}

impl FileType {
    /// Classify a POSIX mode value
    #[must_use]
    pub fn from_mode(mode: u32) -> Self {
        let fmt = mode & S_IFMT;
        if fmt == Self::Regular.mode_bits() {
            Self::Regular
        } else if fmt == Self::Directory.mode_bits() {
            Self::Directory
        } else if fmt == Self::Symlink.mode_bits() {
            Self::Symlink
        } else {
            Self::Other
        }
    }

    /// The `S_IFMT` bits for this type (zero for `Other`)
    #[must_use]
    pub fn mode_bits(self) -> u32 {
        #[allow(clippy::unnecessary_cast)]
        match self {
            Self::Regular => libc::S_IFREG as u32,
            Self::Directory => libc::S_IFDIR as u32,
            Self::Symlink => libc::S_IFLNK as u32,
            Self::Other => 0,
        }
    }

    /// Build a full mode from this type and permission bits
    #[must_use]
    pub fn with_perm(self, perm: u32) -> u32 {
        self.mode_bits() | (perm & !S_IFMT)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Regular => "file",
            Self::Directory => "dir",
            Self::Symlink => "symlink",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Seconds since the Unix epoch
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_mode() {
        assert_eq!(FileType::from_mode(0o040_755), FileType::Directory);
        assert_eq!(FileType::from_mode(0o100_644), FileType::Regular);
        assert_eq!(FileType::from_mode(0o120_777), FileType::Symlink);
        assert_eq!(FileType::from_mode(0o644), FileType::Other);
    }

    #[test]
    fn test_with_perm_keeps_type() {
        let mode = FileType::Directory.with_perm(0o755);
        assert_eq!(mode, 0o040_755);
        assert_eq!(FileType::from_mode(mode), FileType::Directory);
    }

    #[test]
    fn test_unix_now_is_positive() {
        assert!(unix_now() > 1_600_000_000);
    }
}
