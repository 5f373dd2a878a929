//! Page-anchored annotations with threaded replies
//!
//! Annotations reference their document by id (no back-pointers); replies are
//! owned by their annotation and persist as an ordered list on its row.

mod store;
mod types;

pub use store::*;
pub use types::*;
