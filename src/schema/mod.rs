//! Schema layer: tokens, table identities, coded-token codec, the static
//! record layout catalog, and the bit-exact schema header.

mod coded;
mod header;
mod layout;
mod tableid;
mod token;

pub use coded::CodedTokenKind;
pub use header::{HeapFlags, Schema, WidthContext};
pub use layout::{col, table_definition, ColumnDef, ColumnKind, TableDefinition};
pub use tableid::{TableId, TABLE_COUNT, USER_STRING_TAG};
pub use token::Token;
