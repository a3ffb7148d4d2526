//! Row storage and lookup: the per-table arena, generic record views, and
//! the three index strategies (physical binary search, virtual sort, hash).

mod hashidx;
mod indirect;
mod record;
mod store;
mod vsort;

pub mod search;

pub use hashidx::{hash_bytes, hash_parent_name, HashIndex};
pub use record::Record;
pub use store::TableStore;
pub use vsort::VirtualSort;
