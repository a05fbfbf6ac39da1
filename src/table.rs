//! The table collaborator contract (out of scope beyond this interface).
//!
//! The buffer manager never interprets a table beyond what's needed to key
//! the page directory and find its backing file: a stable, hashable
//! identity and a `storage_location`. Catalog lookup, free-space
//! management, and everything else about a table belong to layers above
//! this one.

use std::fmt::Debug;
use std::hash::Hash;
use std::path::{Path, PathBuf};

/// Collaborator contract for a persistent page's owning table.
pub trait TableRef: Clone + Eq + Hash + Debug {
    /// Path of the file backing this table's pages.
    fn storage_location(&self) -> &Path;
}

/// A minimal table reference, sufficient to exercise the buffer manager
/// without a real catalog: a name used as identity, and a backing path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StaticTable {
    name: String,
    storage_location: PathBuf,
}

impl StaticTable {
    pub fn new(name: impl Into<String>, storage_location: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            storage_location: storage_location.into(),
        }
    }
}

impl TableRef for StaticTable {
    fn storage_location(&self) -> &Path {
        &self.storage_location
    }
}
