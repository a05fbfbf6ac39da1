//! Page identity: the directory key that makes two handles for the same
//! table/index (or the same anonymous serial) refer to one cached `Page`.

use crate::config::{AnonymousSerial, PageIndex};
use crate::table::TableRef;

/// Either a persistent page belonging to a table, or an anonymous
/// (temporary) page backed by the manager's scratch file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageIdentity<T: TableRef> {
    Persistent(T, PageIndex),
    Anonymous(AnonymousSerial),
}

impl<T: TableRef> PageIdentity<T> {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, PageIdentity::Anonymous(_))
    }
}
