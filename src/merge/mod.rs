//! Multi-scope metadata merging.
//!
//! A merge folds any number of read-only import databases into one mutable
//! emit database, producing a per-scope token remap map and resolving
//! references onto definitions that end up in the same module. The engine
//! owns the phase ordering and table mechanics; mismatch handling, security
//! consolidation and signature rewriting are delegated to trait
//! collaborators supplied by the caller.

mod config;
mod engine;
mod remap;
mod session;

pub use config::{MergeConfig, MergeFlags, RefToDefPolicy};
pub use engine::{marks, MergeEngine};
pub use remap::{RemapMap, TokenRecord};
pub use session::{
    AbortPolicy, CollectPolicy, ErrorAction, ErrorPolicy, ImportScope, MergeErrorKind,
    NoSecurityPolicy, NotifySink, NullSink, OpaqueSignatures, RecordingSink, SecurityPolicy,
    SecurityStatus, SignatureRewriter,
};
