//! Canonical mapping from page identity to resident `Page` (§4.2).
//!
//! The directory owns `Page` records (and, transitively, any frame they're
//! bound to); it owns no bytes directly.

use std::collections::HashMap;

use crate::identity::PageIdentity;
use crate::page::Page;
use crate::table::TableRef;

pub(crate) struct PageDirectory<T: TableRef> {
    pages: HashMap<PageIdentity<T>, Page<T>>,
}

impl<T: TableRef> PageDirectory<T> {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
        }
    }

    pub fn get(&self, id: &PageIdentity<T>) -> Option<Page<T>> {
        self.pages.get(id).cloned()
    }

    pub fn insert(&mut self, id: PageIdentity<T>, page: Page<T>) {
        self.pages.insert(id, page);
    }

    pub fn remove(&mut self, id: &PageIdentity<T>) {
        self.pages.remove(id);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Page<T>> {
        self.pages.values()
    }
}
