#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # tablemerge
//!
//! A versioned, columnar metadata-table database with heap pools, lazy
//! indices and a multi-scope merge engine.
//!
//! A database holds a fixed catalog of record tables plus four append-only
//! heap pools (strings, blobs, GUIDs, user strings). Rows live in a wide
//! in-memory layout and are addressed by 1-based RIDs; cross-table
//! references travel as [`Token`] values combining a table tag with a RID.
//! The on-disk form narrows every column to its minimal width, decided once
//! per database from row counts and heap sizes.
//!
//! ## Quick Start
//!
//! ```rust
//! use tablemerge::{col, MetaDatabase, TableId};
//!
//! let mut db = MetaDatabase::new(2)?;
//! let name = db.strings_mut()?.add("Widget")?;
//! let rid = db.add_record(TableId::TypeDef)?;
//! db.set(TableId::TypeDef, rid, col::TYPEDEF_NAME, name)?;
//!
//! let streams = db.encode()?;
//! let reloaded = MetaDatabase::decode(&streams)?;
//! assert_eq!(reloaded.rows(TableId::TypeDef), 1);
//! # Ok::<(), tablemerge::Error>(())
//! ```
//!
//! ## Merging
//!
//! [`merge::MergeEngine`] folds any number of read-only import databases
//! into one emit database, deduplicating rows, collapsing references onto
//! definitions that land in the same module, and reporting every token
//! movement through a per-scope remap map:
//!
//! ```rust
//! use tablemerge::{
//!     merge::{MergeConfig, MergeEngine, NullSink},
//!     col, MetaDatabase, TableId,
//! };
//!
//! let emit = MetaDatabase::new(2)?;
//! let mut import = MetaDatabase::new(2)?;
//!
//! // Every import scope carries exactly one module record
//! let name = import.strings_mut()?.add("app.netmodule")?;
//! let rid = import.add_record(TableId::Module)?;
//! import.set(TableId::Module, rid, col::MODULE_NAME, name)?;
//!
//! let mut engine = MergeEngine::new(emit);
//! engine.add_import(import, Box::new(NullSink));
//! engine.merge(MergeConfig::default())?;
//! # Ok::<(), tablemerge::Error>(())
//! ```

#[macro_use]
mod error;

mod database;
mod heaps;
mod io;
mod schema;
mod tables;

pub mod merge;

/// Central result type of this library, wrapping [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

pub use database::{DatabaseStreams, MetaDatabase};
pub use error::Error;
pub use heaps::{BlobHeap, GuidHeap, StringHeap, UserStringHeap};
pub use schema::{
    col, table_definition, CodedTokenKind, ColumnDef, ColumnKind, HeapFlags, Schema, TableId,
    TableDefinition, Token, WidthContext, TABLE_COUNT, USER_STRING_TAG,
};
pub use tables::search;
pub use tables::{hash_bytes, hash_parent_name, HashIndex, Record, TableStore, VirtualSort};
