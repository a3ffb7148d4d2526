//! The database facade: schema version, four heap pools and one row store
//! per table kind, with the stream codec and the pre-save finalization pass.
//!
//! In memory every index column is kept wide; the narrow on-disk widths are
//! derived from row counts and heap sizes only when [`MetaDatabase::encode`]
//! runs, so nothing ever needs to migrate when a table crosses a width
//! threshold. Mutation is gated by two capability flags: `read_only` rejects
//! every write, `pinned` rejects only operations that would relocate rows
//! (appends and physical sorts), for callers holding references into the
//! row arena.

use strum::IntoEnumIterator;

use crate::{
    heaps::{BlobHeap, GuidHeap, StringHeap, UserStringHeap},
    io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    schema::{
        col, table_definition, CodedTokenKind, HeapFlags, Schema, TableId, Token, WidthContext,
        TABLE_COUNT,
    },
    tables::{search, TableStore},
    Error, Result,
};

/// The serialized streams of one database: the packed tables stream plus
/// the four heap images.
#[derive(Debug, Clone, Default)]
pub struct DatabaseStreams {
    /// Schema header followed by the packed records
    pub tables: Vec<u8>,
    /// String pool image
    pub strings: Vec<u8>,
    /// Blob pool image
    pub blob: Vec<u8>,
    /// GUID pool image
    pub guid: Vec<u8>,
    /// User-string pool image
    pub user_strings: Vec<u8>,
}

/// One metadata database: schema version, heaps and tables.
#[derive(Debug, Clone)]
pub struct MetaDatabase {
    major: u8,
    minor: u8,
    sorted: u64,
    extra: Option<u32>,
    read_only: bool,
    pinned: bool,
    pub(crate) tables: Vec<TableStore>,
    strings: StringHeap,
    blobs: BlobHeap,
    guids: GuidHeap,
    user_strings: UserStringHeap,
}

impl MetaDatabase {
    /// Creates an empty database under schema major version `major`.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedVersion`] for majors other than 1
    /// and 2.
    pub fn new(major: u8) -> Result<Self> {
        if major != 1 && major != 2 {
            return Err(Error::UnsupportedVersion(major));
        }

        // Stores exist for every table kind; v1 merely refuses to populate
        // the generics tables
        let tables = TableId::iter()
            .filter_map(|id| table_definition(2, id))
            .map(TableStore::new)
            .collect();

        Ok(MetaDatabase {
            major,
            minor: 0,
            sorted: 0,
            extra: None,
            read_only: false,
            pinned: false,
            tables,
            strings: StringHeap::new(),
            blobs: BlobHeap::new(),
            guids: GuidHeap::new(),
            user_strings: UserStringHeap::new(),
        })
    }

    /// Schema major version.
    #[must_use]
    pub fn major(&self) -> u8 {
        self.major
    }

    /// Schema minor version.
    #[must_use]
    pub fn minor(&self) -> u8 {
        self.minor
    }

    /// Read access to one table's row store.
    #[must_use]
    pub fn table(&self, id: TableId) -> &TableStore {
        &self.tables[id as usize]
    }

    pub(crate) fn table_mut(&mut self, id: TableId) -> &mut TableStore {
        &mut self.tables[id as usize]
    }

    /// Current row count of one table.
    #[must_use]
    pub fn rows(&self, id: TableId) -> u32 {
        self.tables[id as usize].row_count()
    }

    /// Whether the table is currently marked physically sorted by its key
    /// column.
    #[must_use]
    pub fn is_sorted(&self, id: TableId) -> bool {
        self.sorted & (1u64 << id as u64) != 0
    }

    /// Appends a zero-initialized record, returning its RID.
    ///
    /// # Errors
    /// Fails on a read-only or pinned database, and for tables that do not
    /// exist under the schema's major version.
    pub fn add_record(&mut self, id: TableId) -> Result<u32> {
        self.check_writable()?;
        if self.pinned {
            return Err(Error::Pinned);
        }
        if table_definition(self.major, id).is_none() {
            return Err(malformed_error!(
                "Table {:?} does not exist in schema v{}",
                id,
                self.major
            ));
        }

        self.sorted &= !(1u64 << id as u64);
        Ok(self.tables[id as usize].add_record())
    }

    /// Reads one column as a plain integer.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidRid`] for a bad RID.
    pub fn get(&self, id: TableId, rid: u32, column: usize) -> Result<u32> {
        self.tables[id as usize].get(rid, column)
    }

    /// Reads one token-shaped column.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidRid`] for a bad RID and
    /// [`crate::Error::InvalidColumnValue`] for a non-token column.
    pub fn get_token(&self, id: TableId, rid: u32, column: usize) -> Result<Token> {
        self.tables[id as usize].get_token(rid, column)
    }

    /// Writes one column. Clears the table's sorted mark.
    ///
    /// # Errors
    /// Fails on a read-only database, a bad RID, or a value the column
    /// cannot represent.
    pub fn set(&mut self, id: TableId, rid: u32, column: usize, value: u32) -> Result<()> {
        self.check_writable()?;
        self.sorted &= !(1u64 << id as u64);
        self.tables[id as usize].set(rid, column, value)
    }

    /// Writes a token into a RID or coded column. Clears the table's sorted
    /// mark.
    ///
    /// # Errors
    /// Fails on a read-only database, a bad RID, or a token whose table is
    /// not a legal target for the column.
    pub fn set_token(&mut self, id: TableId, rid: u32, column: usize, token: Token) -> Result<()> {
        self.check_writable()?;
        self.sorted &= !(1u64 << id as u64);
        self.tables[id as usize].set_token(rid, column, token)
    }

    /// All RIDs whose `column` equals `value`.
    ///
    /// Uses physical binary search when the table is marked sorted by that
    /// column, the virtual sort otherwise. The result set is identical
    /// either way.
    pub fn lookup(&mut self, id: TableId, column: usize, value: u32) -> Vec<u32> {
        let sorted = self.is_sorted(id);
        let store = &mut self.tables[id as usize];

        if sorted && store.definition().key == Some(column) {
            let (start, end) = search::search_multi_row(store, column, value);
            (start..end).collect()
        } else {
            let (start, end) = store.sorted_range(column, value);
            (start..end).map(|pos| store.sorted_rid(pos)).collect()
        }
    }

    /// The string pool.
    #[must_use]
    pub fn strings(&self) -> &StringHeap {
        &self.strings
    }

    /// Mutable string pool.
    ///
    /// # Errors
    /// Fails on a read-only database.
    pub fn strings_mut(&mut self) -> Result<&mut StringHeap> {
        self.check_writable()?;
        Ok(&mut self.strings)
    }

    /// The blob pool.
    #[must_use]
    pub fn blobs(&self) -> &BlobHeap {
        &self.blobs
    }

    /// Mutable blob pool.
    ///
    /// # Errors
    /// Fails on a read-only database.
    pub fn blobs_mut(&mut self) -> Result<&mut BlobHeap> {
        self.check_writable()?;
        Ok(&mut self.blobs)
    }

    /// The GUID pool.
    #[must_use]
    pub fn guids(&self) -> &GuidHeap {
        &self.guids
    }

    /// Mutable GUID pool.
    ///
    /// # Errors
    /// Fails on a read-only database.
    pub fn guids_mut(&mut self) -> Result<&mut GuidHeap> {
        self.check_writable()?;
        Ok(&mut self.guids)
    }

    /// The user-string pool.
    #[must_use]
    pub fn user_strings(&self) -> &UserStringHeap {
        &self.user_strings
    }

    /// Mutable user-string pool.
    ///
    /// # Errors
    /// Fails on a read-only database.
    pub fn user_strings_mut(&mut self) -> Result<&mut UserStringHeap> {
        self.check_writable()?;
        Ok(&mut self.user_strings)
    }

    /// Marks the database read-only. There is no way back; import scopes
    /// stay frozen for the lifetime of a merge.
    pub fn freeze(&mut self) {
        self.read_only = true;
    }

    /// Whether the database is read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Pins the row arena: appends and physical sorts fail with
    /// [`crate::Error::Pinned`] until [`MetaDatabase::unpin`]. Column writes
    /// stay allowed; they never relocate rows.
    pub fn pin(&mut self) {
        self.pinned = true;
    }

    /// Releases a pin.
    pub fn unpin(&mut self) {
        self.pinned = false;
    }

    /// Whether the row arena is pinned.
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }

    /// Decodes a database from its serialized streams.
    ///
    /// Empty heap images stand for absent streams and decode to empty
    /// pools.
    ///
    /// # Errors
    /// Fails on a malformed schema header, truncated record data, or an
    /// invalid heap image.
    pub fn decode(streams: &DatabaseStreams) -> Result<Self> {
        let (schema, mut offset) = Schema::decode(&streams.tables)?;
        let ctx = WidthContext {
            row_counts: schema.row_counts,
            heap_flags: schema.heap_flags,
        };

        let mut db = MetaDatabase::new(schema.major)?;
        db.minor = schema.minor;
        db.sorted = schema.sorted;
        db.extra = schema.extra;

        if !streams.strings.is_empty() {
            db.strings = StringHeap::from_bytes(&streams.strings)?;
        }
        if !streams.blob.is_empty() {
            db.blobs = BlobHeap::from_bytes(&streams.blob)?;
        }
        if !streams.guid.is_empty() {
            db.guids = GuidHeap::from_bytes(&streams.guid)?;
        }
        if !streams.user_strings.is_empty() {
            db.user_strings = UserStringHeap::from_bytes(&streams.user_strings)?;
        }

        for id in TableId::iter() {
            let rows = schema.row_counts[id as usize];
            if rows == 0 {
                continue;
            }
            // Schema::decode already validated the valid bits against the
            // major version
            let Some(def) = table_definition(schema.major, id) else {
                return Err(malformed_error!("Row count for absent table {:?}", id));
            };

            let store = &mut db.tables[id as usize];
            for _ in 0..rows {
                let rid = store.add_record();
                for (index, column) in def.columns.iter().enumerate() {
                    let value = match ctx.disk_width(column.kind) {
                        1 => u32::from(read_le_at::<u8>(&streams.tables, &mut offset)?),
                        2 => read_le_at_dyn(&streams.tables, &mut offset, false)?,
                        _ => read_le_at_dyn(&streams.tables, &mut offset, true)?,
                    };
                    store.set(rid, index, value)?;
                }
            }
        }

        Ok(db)
    }

    /// Encodes the database to its serialized streams, deciding all narrow
    /// column widths and heap flags from the current row counts and heap
    /// sizes.
    ///
    /// Callers wanting the sorted bitmask fully populated run
    /// [`MetaDatabase::presave`] first.
    ///
    /// # Errors
    /// Fails if a stored value no longer fits its computed narrow width,
    /// which indicates internal corruption.
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(&self) -> Result<DatabaseStreams> {
        const LARGE_HEAP: u32 = u16::MAX as u32;

        let mut heap_flags = HeapFlags::empty();
        if self.strings.size() > LARGE_HEAP {
            heap_flags |= HeapFlags::LARGE_STRINGS;
        }
        if self.guids.size() > LARGE_HEAP {
            heap_flags |= HeapFlags::LARGE_GUIDS;
        }
        if self.blobs.size() > LARGE_HEAP {
            heap_flags |= HeapFlags::LARGE_BLOBS;
        }
        if self.extra.is_some() {
            heap_flags |= HeapFlags::EXTRA_DATA;
        }

        let mut row_counts = [0u32; TABLE_COUNT];
        let mut valid = 0u64;
        let mut max_rows = 0u32;
        for (index, store) in self.tables.iter().enumerate() {
            let rows = store.row_count();
            row_counts[index] = rows;
            max_rows = max_rows.max(rows);
            if rows > 0 {
                valid |= 1u64 << index;
            }
        }

        let schema = Schema {
            major: self.major,
            minor: self.minor,
            heap_flags,
            rid_log2: (32 - max_rows.leading_zeros()) as u8,
            valid,
            sorted: self.sorted & valid,
            row_counts,
            extra: self.extra,
        };

        let ctx = WidthContext {
            row_counts,
            heap_flags,
        };
        let mut tables = schema.encode();
        let body: usize = TableId::iter()
            .map(|id| row_counts[id as usize] as usize * ctx.disk_record_size(self.major, id))
            .sum();
        let mut offset = tables.len();
        tables.resize(offset + body, 0);

        for id in TableId::iter() {
            let store = &self.tables[id as usize];
            let def = store.definition();
            for rid in 1..=store.row_count() {
                let record = store.record(rid)?;
                for (index, column) in def.columns.iter().enumerate() {
                    let value = record.get(index);
                    match ctx.disk_width(column.kind) {
                        1 => write_le_at::<u8>(&mut tables, &mut offset, value as u8)?,
                        2 => write_le_at_dyn(&mut tables, &mut offset, value, false)?,
                        _ => write_le_at_dyn(&mut tables, &mut offset, value, true)?,
                    }
                }
            }
        }

        Ok(DatabaseStreams {
            tables,
            strings: self.strings.bytes().to_vec(),
            blob: self.blobs.bytes().to_vec(),
            guid: self.guids.bytes().to_vec(),
            user_strings: self.user_strings.bytes().to_vec(),
        })
    }

    /// Finalizes the database before serialization: physically sorts every
    /// keyed table by its key column and fixes up all references into the
    /// reordered tables.
    ///
    /// `GenericParam` goes first because constraint rows point at it by RID;
    /// `CustomAttribute` goes last because its parent column can point into
    /// several of the other reordered tables.
    ///
    /// # Errors
    /// Fails on a read-only or pinned database.
    pub fn presave(&mut self) -> Result<()> {
        self.check_writable()?;
        if self.pinned {
            return Err(Error::Pinned);
        }

        let generic_params = self.sort_keyed(TableId::GenericParam);
        self.remap_rid_column(
            TableId::GenericParamConstraint,
            col::GPCONSTRAINT_OWNER,
            &generic_params,
        )?;
        self.remap_attribute_parents(TableId::GenericParam, &generic_params)?;

        for id in [
            TableId::Constant,
            TableId::FieldMarshal,
            TableId::DeclSecurity,
            TableId::ClassLayout,
            TableId::FieldLayout,
            TableId::MethodSemantics,
            TableId::MethodImpl,
            TableId::ImplMap,
            TableId::FieldRVA,
            TableId::NestedClass,
            TableId::MethodSpec,
            TableId::InterfaceImpl,
            TableId::GenericParamConstraint,
        ] {
            let map = self.sort_keyed(id);
            if matches!(
                id,
                TableId::InterfaceImpl
                    | TableId::DeclSecurity
                    | TableId::MethodSpec
                    | TableId::GenericParamConstraint
            ) {
                self.remap_attribute_parents(id, &map)?;
            }
        }

        self.sort_keyed(TableId::CustomAttribute);
        Ok(())
    }

    /// Sorts one keyed table by its key column and marks it sorted,
    /// returning the old-to-new RID map.
    fn sort_keyed(&mut self, id: TableId) -> Vec<u32> {
        let store = &mut self.tables[id as usize];
        let Some(key) = store.definition().key else {
            return Vec::new();
        };

        let map = store.sort_physical(key);
        self.sorted |= 1u64 << id as u64;
        map
    }

    /// Rewrites a plain RID column through an old-to-new map.
    fn remap_rid_column(&mut self, id: TableId, column: usize, map: &[u32]) -> Result<()> {
        if map.is_empty() {
            return Ok(());
        }

        let store = &mut self.tables[id as usize];
        for rid in 1..=store.row_count() {
            let old = store.get(rid, column)?;
            if old != 0 {
                store.set(rid, column, map[old as usize - 1])?;
            }
        }
        Ok(())
    }

    /// Rewrites `CustomAttribute.Parent` entries that point into a
    /// reordered `target` table.
    fn remap_attribute_parents(&mut self, target: TableId, map: &[u32]) -> Result<()> {
        if map.is_empty() {
            return Ok(());
        }

        let store = &mut self.tables[TableId::CustomAttribute as usize];
        for rid in 1..=store.row_count() {
            let parent = CodedTokenKind::HasCustomAttribute.decode(store.get(rid, col::CA_PARENT)?);
            if parent.table() == target as u8 && !parent.is_nil() {
                let moved = target.token(map[parent.rid() as usize - 1]);
                store.set_token(rid, col::CA_PARENT, moved)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uguid::guid;

    fn sample_database() -> MetaDatabase {
        let mut db = MetaDatabase::new(2).unwrap();
        let name = db.strings_mut().unwrap().add("test.dll").unwrap();
        let mvid = db
            .guids_mut()
            .unwrap()
            .add(&guid!("01020304-0506-0708-090a-0b0c0d0e0f10"));

        let module = db.add_record(TableId::Module).unwrap();
        db.set(TableId::Module, module, col::MODULE_NAME, name)
            .unwrap();
        db.set(TableId::Module, module, col::MODULE_MVID, mvid)
            .unwrap();

        let type_name = db.strings_mut().unwrap().add("Widget").unwrap();
        let ns = db.strings_mut().unwrap().add("NS").unwrap();
        let rid = db.add_record(TableId::TypeDef).unwrap();
        db.set(TableId::TypeDef, rid, col::TYPEDEF_NAME, type_name)
            .unwrap();
        db.set(TableId::TypeDef, rid, col::TYPEDEF_NAMESPACE, ns)
            .unwrap();
        db
    }

    #[test]
    fn stream_round_trip() {
        let db = sample_database();
        let streams = db.encode().unwrap();
        let copy = MetaDatabase::decode(&streams).unwrap();

        assert_eq!(copy.rows(TableId::Module), 1);
        assert_eq!(copy.rows(TableId::TypeDef), 1);
        let name = copy.get(TableId::TypeDef, 1, col::TYPEDEF_NAME).unwrap();
        assert_eq!(copy.strings().get(name).unwrap(), "Widget");

        // Re-encoding the decoded copy is bit-identical
        let second = copy.encode().unwrap();
        assert_eq!(second.tables, streams.tables);
        assert_eq!(second.strings, streams.strings);
        assert_eq!(second.guid, streams.guid);
    }

    #[test]
    fn read_only_rejects_mutation() {
        let mut db = sample_database();
        db.freeze();
        assert!(matches!(
            db.add_record(TableId::Field),
            Err(Error::ReadOnly)
        ));
        assert!(matches!(
            db.set(TableId::TypeDef, 1, col::TYPEDEF_FLAGS, 1),
            Err(Error::ReadOnly)
        ));
        assert!(matches!(db.strings_mut(), Err(Error::ReadOnly)));
        // Reads still work
        assert!(db.get(TableId::TypeDef, 1, col::TYPEDEF_NAME).is_ok());
    }

    #[test]
    fn pin_blocks_relocation_only() {
        let mut db = sample_database();
        db.pin();
        assert!(matches!(db.add_record(TableId::Field), Err(Error::Pinned)));
        assert!(matches!(db.presave(), Err(Error::Pinned)));
        // Column writes do not move rows
        db.set(TableId::TypeDef, 1, col::TYPEDEF_FLAGS, 0x100).unwrap();

        db.unpin();
        assert!(db.add_record(TableId::Field).is_ok());
    }

    #[test]
    fn v1_refuses_generics_tables() {
        let mut db = MetaDatabase::new(1).unwrap();
        assert!(db.add_record(TableId::GenericParam).is_err());
        assert!(db.add_record(TableId::TypeDef).is_ok());
    }

    #[test]
    fn mutation_clears_sorted_mark() {
        let mut db = MetaDatabase::new(2).unwrap();
        let rid = db.add_record(TableId::InterfaceImpl).unwrap();
        db.set(TableId::InterfaceImpl, rid, col::INTERFACEIMPL_CLASS, 1)
            .unwrap();
        db.presave().unwrap();
        assert!(db.is_sorted(TableId::InterfaceImpl));

        let rid = db.add_record(TableId::InterfaceImpl).unwrap();
        assert!(!db.is_sorted(TableId::InterfaceImpl));
        db.set(TableId::InterfaceImpl, rid, col::INTERFACEIMPL_CLASS, 0)
            .unwrap();
    }

    #[test]
    fn presave_sorts_and_fixes_attribute_parents() {
        let mut db = MetaDatabase::new(2).unwrap();
        // Two InterfaceImpl rows out of order
        for class in [5u32, 2] {
            let rid = db.add_record(TableId::InterfaceImpl).unwrap();
            db.set(TableId::InterfaceImpl, rid, col::INTERFACEIMPL_CLASS, class)
                .unwrap();
        }
        // An attribute hanging off the first (class 5) row
        let ca = db.add_record(TableId::CustomAttribute).unwrap();
        db.set_token(
            TableId::CustomAttribute,
            ca,
            col::CA_PARENT,
            TableId::InterfaceImpl.token(1),
        )
        .unwrap();

        db.presave().unwrap();

        // Class 5 moved to row 2; the attribute parent must follow it
        assert_eq!(
            db.get(TableId::InterfaceImpl, 2, col::INTERFACEIMPL_CLASS)
                .unwrap(),
            5
        );
        let parent = db
            .get_token(TableId::CustomAttribute, 1, col::CA_PARENT)
            .unwrap();
        assert_eq!(parent, TableId::InterfaceImpl.token(2));
        assert!(db.is_sorted(TableId::CustomAttribute));
    }

    #[test]
    fn presave_fixes_constraint_owners() {
        let mut db = MetaDatabase::new(2).unwrap();
        // Generic params owned by two methods, out of owner order
        let owners = [
            CodedTokenKind::TypeOrMethodDef
                .encode(TableId::MethodDef.token(7))
                .unwrap(),
            CodedTokenKind::TypeOrMethodDef
                .encode(TableId::MethodDef.token(3))
                .unwrap(),
        ];
        for owner in owners {
            let rid = db.add_record(TableId::GenericParam).unwrap();
            db.set(TableId::GenericParam, rid, col::GENERICPARAM_OWNER, owner)
                .unwrap();
        }
        // Constraint on the first param (owner method 7)
        let gpc = db.add_record(TableId::GenericParamConstraint).unwrap();
        db.set(TableId::GenericParamConstraint, gpc, col::GPCONSTRAINT_OWNER, 1)
            .unwrap();

        db.presave().unwrap();

        // Param rows swapped by owner; the constraint follows its param
        assert_eq!(
            db.get(TableId::GenericParamConstraint, 1, col::GPCONSTRAINT_OWNER)
                .unwrap(),
            2
        );
    }

    #[test]
    fn lookup_agrees_sorted_and_unsorted() {
        let mut db = MetaDatabase::new(2).unwrap();
        for class in [4u32, 1, 4, 2] {
            let rid = db.add_record(TableId::InterfaceImpl).unwrap();
            db.set(TableId::InterfaceImpl, rid, col::INTERFACEIMPL_CLASS, class)
                .unwrap();
        }

        let via_vsort: Vec<u32> = {
            let mut rids = db.lookup(TableId::InterfaceImpl, col::INTERFACEIMPL_CLASS, 4);
            rids.sort_unstable();
            rids.iter()
                .map(|rid| db.get(TableId::InterfaceImpl, *rid, col::INTERFACEIMPL_CLASS).unwrap())
                .collect()
        };

        db.presave().unwrap();
        let via_search: Vec<u32> = db
            .lookup(TableId::InterfaceImpl, col::INTERFACEIMPL_CLASS, 4)
            .iter()
            .map(|rid| db.get(TableId::InterfaceImpl, *rid, col::INTERFACEIMPL_CLASS).unwrap())
            .collect();

        assert_eq!(via_vsort, [4, 4]);
        assert_eq!(via_search, [4, 4]);
    }
}
