//! `RocksDB` column families.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Config store entries keyed by absolute path.
    pub const NODES: &str = "nodes";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::NODES]
}
