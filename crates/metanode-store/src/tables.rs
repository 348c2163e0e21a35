//! Redb table definitions for persistent metadata storage.

use redb::TableDefinition;

/// All four collections plus the apply index, keyed by encoded key
pub const METADATA: TableDefinition<&[u8], &[u8]> = TableDefinition::new("metadata");

/// Reserved key holding the big-endian u64 apply index. Sorts after every
/// collection boundary.
pub const APPLY_INDEX_KEY: &[u8] = b"\xffapply_index";
