//! Generic typed views over one fixed-size record.
//!
//! There is no per-table record struct; a [`Record`] is a byte slice plus
//! the table's [`TableDefinition`], and every accessor is driven by the
//! column catalog. Index columns (RIDs, coded tokens, heap offsets) are
//! kept at full width in memory, so the accessors never need the schema's
//! on-disk width context.

use crate::{
    io::{read_le, write_le_at},
    schema::{ColumnKind, TableDefinition, Token},
    Error, Result,
};

/// Read-only view of one record.
#[derive(Clone, Copy)]
pub struct Record<'a> {
    data: &'a [u8],
    def: &'static TableDefinition,
}

impl<'a> Record<'a> {
    pub(crate) fn new(data: &'a [u8], def: &'static TableDefinition) -> Self {
        Record { data, def }
    }

    /// The table definition this record belongs to.
    #[must_use]
    pub fn definition(&self) -> &'static TableDefinition {
        self.def
    }

    /// Reads column `column` as a plain integer (heap offsets and RIDs
    /// included; coded columns come back still packed).
    #[must_use]
    pub fn get(&self, column: usize) -> u32 {
        let offset = self.def.mem_offset(column);
        let slice = &self.data[offset..];
        match self.def.columns[column].kind.mem_width() {
            1 => u32::from(slice[0]),
            2 => u32::from(read_le::<u16>(slice).unwrap_or(0)),
            _ => read_le::<u32>(slice).unwrap_or(0),
        }
    }

    /// Reads column `column` as a token. Valid for RID and coded columns.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidColumnValue`] if the column is not
    /// token-shaped.
    pub fn get_token(&self, column: usize) -> Result<Token> {
        let value = self.get(column);
        match self.def.columns[column].kind {
            ColumnKind::Rid(table) => Ok(table.token(value)),
            ColumnKind::Coded(kind) => Ok(kind.decode(value)),
            _ => Err(Error::InvalidColumnValue(Token::new(value))),
        }
    }
}

/// Writes column `column` of the record at `data` (one record's bytes).
///
/// Shared by [`crate::tables::TableStore`] and the decoder; callers have
/// already validated the RID.
pub(crate) fn write_column(
    data: &mut [u8],
    def: &'static TableDefinition,
    column: usize,
    value: u32,
) -> Result<()> {
    let mut offset = def.mem_offset(column);
    match def.columns[column].kind.mem_width() {
        1 => {
            if value > u32::from(u8::MAX) {
                return Err(Error::InvalidColumnValue(Token::new(value)));
            }
            write_le_at::<u8>(data, &mut offset, value as u8)
        }
        2 => {
            if value > u32::from(u16::MAX) {
                return Err(Error::InvalidColumnValue(Token::new(value)));
            }
            write_le_at::<u16>(data, &mut offset, value as u16)
        }
        _ => write_le_at::<u32>(data, &mut offset, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{col, table_definition, TableId};

    #[test]
    fn read_write_columns() {
        let def = table_definition(2, TableId::TypeDef).unwrap();
        let mut data = vec![0u8; def.mem_size()];

        write_column(&mut data, def, col::TYPEDEF_FLAGS, 0x0010_0001).unwrap();
        write_column(&mut data, def, col::TYPEDEF_NAME, 42).unwrap();
        write_column(&mut data, def, col::TYPEDEF_METHODLIST, 7).unwrap();

        let record = Record::new(&data, def);
        assert_eq!(record.get(col::TYPEDEF_FLAGS), 0x0010_0001);
        assert_eq!(record.get(col::TYPEDEF_NAME), 42);
        assert_eq!(record.get(col::TYPEDEF_METHODLIST), 7);
        assert_eq!(record.get(col::TYPEDEF_NAMESPACE), 0);
    }

    #[test]
    fn token_columns() {
        let def = table_definition(2, TableId::TypeDef).unwrap();
        let mut data = vec![0u8; def.mem_size()];

        // Extends is a TypeDefOrRef coded column; store TypeRef row 3
        let coded = crate::schema::CodedTokenKind::TypeDefOrRef
            .encode(TableId::TypeRef.token(3))
            .unwrap();
        write_column(&mut data, def, col::TYPEDEF_EXTENDS, coded).unwrap();

        let record = Record::new(&data, def);
        let token = record.get_token(col::TYPEDEF_EXTENDS).unwrap();
        assert_eq!(token, TableId::TypeRef.token(3));

        let rid_token = record.get_token(col::TYPEDEF_FIELDLIST).unwrap();
        assert!(rid_token.is_nil());
        assert_eq!(rid_token.table(), TableId::Field as u8);

        assert!(record.get_token(col::TYPEDEF_NAME).is_err());
    }

    #[test]
    fn narrow_column_overflow_rejected() {
        let def = table_definition(2, TableId::Field).unwrap();
        let mut data = vec![0u8; def.mem_size()];
        assert!(write_column(&mut data, def, col::FIELD_FLAGS, 0x1_0000).is_err());
    }
}
