//! Typed random-access row storage for one table.
//!
//! Rows live in a flat arena of fixed-size slots indexed by RID. RIDs are
//! 1-based, assigned sequentially and never reused; external observers may
//! hold on to a RID for the lifetime of the store. The arena is append-only
//! except for the indirection tables, which support positional insertion
//! (their rows are positions, not identities).

use crate::{
    schema::{ColumnKind, TableDefinition, Token},
    tables::record::{write_column, Record},
    tables::vsort::VirtualSort,
    Error, Result,
};

/// Row storage for one table.
#[derive(Debug, Clone)]
pub struct TableStore {
    def: &'static TableDefinition,
    data: Vec<u8>,
    rows: u32,
    vsort: Option<VirtualSort>,
}

impl TableStore {
    /// Creates an empty store for `def`.
    #[must_use]
    pub fn new(def: &'static TableDefinition) -> Self {
        TableStore {
            def,
            data: Vec::new(),
            rows: 0,
            vsort: None,
        }
    }

    /// The layout this store follows.
    #[must_use]
    pub fn definition(&self) -> &'static TableDefinition {
        self.def
    }

    /// Current number of rows.
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.rows
    }

    /// Appends a zero-initialized record and returns its RID. RIDs start at
    /// 1 and increase by exactly one per call.
    pub fn add_record(&mut self) -> u32 {
        self.data.resize(self.data.len() + self.def.mem_size(), 0);
        self.rows += 1;
        self.vsort = None;
        self.rows
    }

    /// Inserts a zero-initialized record *before* position `rid`, shifting
    /// subsequent rows. Only the indirection tables use this; their rows
    /// are positional and carry no identity.
    pub(crate) fn insert_record_at(&mut self, rid: u32) -> Result<()> {
        if rid == 0 || rid > self.rows + 1 {
            return Err(self.bad_rid(rid));
        }

        let size = self.def.mem_size();
        let at = (rid as usize - 1) * size;
        self.data.splice(at..at, std::iter::repeat(0).take(size));
        self.rows += 1;
        self.vsort = None;
        Ok(())
    }

    /// Read-only view of the record at `rid`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidRid`] if `rid` is 0 or past the end.
    pub fn record(&self, rid: u32) -> Result<Record<'_>> {
        let slice = self.row_slice(rid)?;
        Ok(Record::new(slice, self.def))
    }

    /// Reads one column of the record at `rid` as a plain integer.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidRid`] if `rid` is 0 or past the end.
    pub fn get(&self, rid: u32, column: usize) -> Result<u32> {
        Ok(self.record(rid)?.get(column))
    }

    /// Reads one token-shaped column of the record at `rid`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidRid`] for a bad RID and
    /// [`crate::Error::InvalidColumnValue`] for a non-token column.
    pub fn get_token(&self, rid: u32, column: usize) -> Result<Token> {
        self.record(rid)?.get_token(column)
    }

    /// Writes one column of the record at `rid`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidRid`] for a bad RID and
    /// [`crate::Error::InvalidColumnValue`] if the value does not fit the
    /// column.
    pub fn set(&mut self, rid: u32, column: usize, value: u32) -> Result<()> {
        let def = self.def;
        let slice = self.row_slice_mut(rid)?;
        write_column(slice, def, column, value)?;
        self.vsort = None;
        Ok(())
    }

    /// Writes a token into a RID or coded column, validating that the
    /// token's table is representable there.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidColumnValue`] if the token's table is
    /// not a legal target for the column.
    pub fn set_token(&mut self, rid: u32, column: usize, token: Token) -> Result<()> {
        let value = match self.def.columns[column].kind {
            ColumnKind::Rid(table) => {
                if !token.is_nil() && token.table() != table as u8 {
                    return Err(Error::InvalidColumnValue(token));
                }
                token.rid()
            }
            ColumnKind::Coded(kind) => kind.encode(token)?,
            _ => return Err(Error::InvalidColumnValue(token)),
        };
        self.set(rid, column, value)
    }

    /// Uninterpreted column read for callers that have already validated
    /// the RID; used by the search routines on their inner loops.
    #[must_use]
    pub(crate) fn value(&self, rid: u32, column: usize) -> u32 {
        self.record(rid).map_or(0, |record| record.get(column))
    }

    /// Positions `(start, end)` in the virtual sort order whose key column
    /// equals `value`, building the side index on first use. The side index
    /// is dropped on any row mutation and rebuilt here.
    ///
    /// Returns an empty range at the insertion point when no row matches.
    pub fn sorted_range(&mut self, column: usize, value: u32) -> (u32, u32) {
        if self
            .vsort
            .as_ref()
            .map_or(true, |vsort| vsort.column() != column)
        {
            self.vsort = Some(VirtualSort::build(self, column));
        }

        // The map was just rebuilt if it was missing
        self.vsort
            .as_ref()
            .map_or((0, 0), |vsort| vsort.equal_range(self, value))
    }

    /// Maps a virtual-sort position (from [`TableStore::sorted_range`])
    /// back to the real RID.
    #[must_use]
    pub fn sorted_rid(&self, position: u32) -> u32 {
        self.vsort
            .as_ref()
            .map_or(0, |vsort| vsort.rid_at(position))
    }

    /// Physically reorders rows ascending by `column` (stable), returning
    /// the old-RID to new-RID map (index `old_rid - 1`). Callers own fixing
    /// up every external reference into this table.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn sort_physical(&mut self, column: usize) -> Vec<u32> {
        let mut order: Vec<u32> = (1..=self.rows).collect();
        order.sort_by_key(|rid| self.value(*rid, column));

        let size = self.def.mem_size();
        let mut data = Vec::with_capacity(self.data.len());
        let mut map = vec![0u32; self.rows as usize];
        for (position, old_rid) in order.iter().enumerate() {
            let start = (*old_rid as usize - 1) * size;
            data.extend_from_slice(&self.data[start..start + size]);
            map[*old_rid as usize - 1] = position as u32 + 1;
        }

        self.data = data;
        self.vsort = None;
        map
    }

    fn row_slice(&self, rid: u32) -> Result<&[u8]> {
        if rid == 0 || rid > self.rows {
            return Err(self.bad_rid(rid));
        }
        let size = self.def.mem_size();
        let start = (rid as usize - 1) * size;
        Ok(&self.data[start..start + size])
    }

    fn row_slice_mut(&mut self, rid: u32) -> Result<&mut [u8]> {
        if rid == 0 || rid > self.rows {
            return Err(self.bad_rid(rid));
        }
        let size = self.def.mem_size();
        let start = (rid as usize - 1) * size;
        Ok(&mut self.data[start..start + size])
    }

    fn bad_rid(&self, rid: u32) -> Error {
        Error::InvalidRid {
            table: self.def.id as u8,
            rid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{col, table_definition, TableId};

    fn field_store() -> TableStore {
        TableStore::new(table_definition(2, TableId::Field).unwrap())
    }

    #[test]
    fn rids_are_monotonic_from_one() {
        let mut store = field_store();
        for expected in 1..=100u32 {
            assert_eq!(store.add_record(), expected);
        }
        assert_eq!(store.row_count(), 100);
    }

    #[test]
    fn new_records_are_zeroed() {
        let mut store = field_store();
        let rid = store.add_record();
        assert_eq!(store.get(rid, col::FIELD_FLAGS).unwrap(), 0);
        assert_eq!(store.get(rid, col::FIELD_NAME).unwrap(), 0);
    }

    #[test]
    fn set_and_get() {
        let mut store = field_store();
        let rid = store.add_record();
        store.set(rid, col::FIELD_FLAGS, 0x16).unwrap();
        store.set(rid, col::FIELD_NAME, 1234).unwrap();

        assert_eq!(store.get(rid, col::FIELD_FLAGS).unwrap(), 0x16);
        assert_eq!(store.get(rid, col::FIELD_NAME).unwrap(), 1234);
    }

    #[test]
    fn rid_zero_and_past_end_rejected() {
        let mut store = field_store();
        store.add_record();
        assert!(store.get(0, col::FIELD_FLAGS).is_err());
        assert!(store.get(2, col::FIELD_FLAGS).is_err());
        assert!(store.set(0, col::FIELD_FLAGS, 1).is_err());
    }

    #[test]
    fn token_column_validation() {
        let def = table_definition(2, TableId::InterfaceImpl).unwrap();
        let mut store = TableStore::new(def);
        let rid = store.add_record();

        store
            .set_token(rid, col::INTERFACEIMPL_CLASS, TableId::TypeDef.token(5))
            .unwrap();
        store
            .set_token(rid, col::INTERFACEIMPL_INTERFACE, TableId::TypeSpec.token(2))
            .unwrap();

        assert_eq!(
            store.get_token(rid, col::INTERFACEIMPL_CLASS).unwrap(),
            TableId::TypeDef.token(5)
        );
        assert_eq!(
            store.get_token(rid, col::INTERFACEIMPL_INTERFACE).unwrap(),
            TableId::TypeSpec.token(2)
        );

        // A Field token is not a TypeDef RID
        assert!(store
            .set_token(rid, col::INTERFACEIMPL_CLASS, TableId::Field.token(1))
            .is_err());
    }

    #[test]
    fn physical_sort_is_stable_and_mapped() {
        let def = table_definition(2, TableId::InterfaceImpl).unwrap();
        let mut store = TableStore::new(def);
        for (class, interface) in [(3u32, 10u32), (1, 20), (3, 30), (2, 40)] {
            let rid = store.add_record();
            store.set(rid, col::INTERFACEIMPL_CLASS, class).unwrap();
            store.set(rid, col::INTERFACEIMPL_INTERFACE, interface).unwrap();
        }

        let map = store.sort_physical(col::INTERFACEIMPL_CLASS);
        let classes: Vec<u32> = (1..=4)
            .map(|rid| store.get(rid, col::INTERFACEIMPL_CLASS).unwrap())
            .collect();
        assert_eq!(classes, [1, 2, 3, 3]);
        // Rows 1 and 3 shared key 3; stability keeps row 1 first
        assert_eq!(map, [3, 1, 4, 2]);
        assert_eq!(store.get(map[0], col::INTERFACEIMPL_INTERFACE).unwrap(), 10);
    }

    #[test]
    fn positional_insert_shifts_rows() {
        let def = table_definition(2, TableId::MethodPtr).unwrap();
        let mut store = TableStore::new(def);
        for target in [10u32, 30] {
            let rid = store.add_record();
            store.set(rid, col::PTR_TARGET, target).unwrap();
        }

        store.insert_record_at(2).unwrap();
        store.set(2, col::PTR_TARGET, 20).unwrap();

        let targets: Vec<u32> = (1..=3)
            .map(|rid| store.get(rid, col::PTR_TARGET).unwrap())
            .collect();
        assert_eq!(targets, [10, 20, 30]);
    }
}
