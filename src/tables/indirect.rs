//! Parent-to-child list columns and the lazy Ptr indirection tables.
//!
//! A parent row records only the first logical index of its child run; the
//! run ends where the next parent's run starts. As long as children are
//! appended in parent order the list column points straight into the child
//! table. The first out-of-order insert converts the relation to indirect
//! mode: a Ptr table is seeded with the identity mapping (positions equal
//! RIDs at that moment), after which list columns index Ptr positions and
//! new children can be spliced into any run without moving child rows.
//! The conversion happens at most once per child table.

use crate::{
    database::MetaDatabase,
    schema::{col, TableId},
    Error, Result,
};

struct ChildList {
    parent: TableId,
    list_column: usize,
    child: TableId,
    ptr: TableId,
}

static CHILD_LISTS: [ChildList; 5] = [
    ChildList {
        parent: TableId::TypeDef,
        list_column: col::TYPEDEF_FIELDLIST,
        child: TableId::Field,
        ptr: TableId::FieldPtr,
    },
    ChildList {
        parent: TableId::TypeDef,
        list_column: col::TYPEDEF_METHODLIST,
        child: TableId::MethodDef,
        ptr: TableId::MethodPtr,
    },
    ChildList {
        parent: TableId::MethodDef,
        list_column: col::METHOD_PARAMLIST,
        child: TableId::Param,
        ptr: TableId::ParamPtr,
    },
    ChildList {
        parent: TableId::EventMap,
        list_column: col::EVENTMAP_EVENTLIST,
        child: TableId::Event,
        ptr: TableId::EventPtr,
    },
    ChildList {
        parent: TableId::PropertyMap,
        list_column: col::PROPERTYMAP_PROPERTYLIST,
        child: TableId::Property,
        ptr: TableId::PropertyPtr,
    },
];

fn child_list(child: TableId) -> Result<&'static ChildList> {
    CHILD_LISTS
        .iter()
        .find(|list| list.child == child)
        .ok_or_else(|| malformed_error!("Table {:?} is not a child-list table", child))
}

impl MetaDatabase {
    /// Appends a child row under `parent_rid`, keeping the parent's run
    /// logically contiguous. Appends at the tail of the child table stay
    /// direct; an insert into the middle of the logical order converts the
    /// relation to indirect mode first. Returns the physical child RID.
    ///
    /// # Errors
    /// Fails on a read-only or pinned database, an invalid parent RID, or a
    /// child table that has no parent list.
    pub fn add_child(&mut self, parent: TableId, parent_rid: u32, child: TableId) -> Result<u32> {
        let list = child_list(child)?;
        if list.parent != parent {
            return Err(malformed_error!(
                "{:?} rows are not children of {:?}",
                child,
                parent
            ));
        }

        let start = self.get(parent, parent_rid, list.list_column)?;
        let end = self.list_end(list, parent_rid)?;
        let indirect = self.rows(list.ptr) > 0;

        if !indirect && end == self.rows(list.child) + 1 {
            // The run is at the tail; a plain append keeps it contiguous
            let rid = self.add_record(child)?;
            if start == 0 {
                self.set(parent, parent_rid, list.list_column, rid)?;
            }
            return Ok(rid);
        }

        if !indirect {
            self.make_indirect(list)?;
        }

        let rid = self.add_record(child)?;

        // Runs at or after the insertion position slide down one slot
        for row in 1..=self.rows(list.parent) {
            if row == parent_rid {
                continue;
            }
            let value = self.get(list.parent, row, list.list_column)?;
            if value != 0 && value >= end {
                self.set(list.parent, row, list.list_column, value + 1)?;
            }
        }

        let store = self.table_mut(list.ptr);
        store.insert_record_at(end)?;
        store.set(end, col::PTR_TARGET, rid)?;

        if start == 0 {
            self.set(parent, parent_rid, list.list_column, end)?;
        }
        Ok(rid)
    }

    /// Physical child RIDs of `parent_rid`'s run, in logical order.
    ///
    /// # Errors
    /// Fails on an invalid parent RID or a child table without a parent
    /// list.
    pub fn children_of(
        &self,
        parent: TableId,
        parent_rid: u32,
        child: TableId,
    ) -> Result<Vec<u32>> {
        let list = child_list(child)?;
        let start = self.get(parent, parent_rid, list.list_column)?;
        if start == 0 {
            return Ok(Vec::new());
        }

        let end = self.list_end(list, parent_rid)?;
        (start..end)
            .map(|logical| self.resolve_child(child, logical))
            .collect()
    }

    /// Maps a logical child index (a list-column value) to the physical
    /// child RID, going through the Ptr table when one exists.
    ///
    /// # Errors
    /// Fails if the index is out of range.
    pub fn resolve_child(&self, child: TableId, logical: u32) -> Result<u32> {
        let list = child_list(child)?;
        if self.rows(list.ptr) > 0 {
            return self.get(list.ptr, logical, col::PTR_TARGET);
        }

        if logical == 0 || logical > self.rows(child) {
            return Err(Error::InvalidRid {
                table: child as u8,
                rid: logical,
            });
        }
        Ok(logical)
    }

    /// First logical index after `parent_rid`'s run: the next parent's run
    /// start, or one past the last logical slot when no later parent has
    /// children.
    fn list_end(&self, list: &ChildList, parent_rid: u32) -> Result<u32> {
        for row in parent_rid + 1..=self.rows(list.parent) {
            let value = self.get(list.parent, row, list.list_column)?;
            if value != 0 {
                return Ok(value);
            }
        }

        let slots = if self.rows(list.ptr) > 0 {
            self.rows(list.ptr)
        } else {
            self.rows(list.child)
        };
        Ok(slots + 1)
    }

    /// Seeds the Ptr table with the identity mapping, after which list
    /// columns index Ptr positions instead of child RIDs.
    fn make_indirect(&mut self, list: &ChildList) -> Result<()> {
        for target in 1..=self.rows(list.child) {
            let rid = self.add_record(list.ptr)?;
            self.set(list.ptr, rid, col::PTR_TARGET, target)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::col;

    fn db_with_typedefs(count: u32) -> MetaDatabase {
        let mut db = MetaDatabase::new(2).unwrap();
        for _ in 0..count {
            db.add_record(TableId::TypeDef).unwrap();
        }
        db
    }

    #[test]
    fn tail_appends_stay_direct() {
        let mut db = db_with_typedefs(2);
        let a1 = db.add_child(TableId::TypeDef, 1, TableId::Field).unwrap();
        let a2 = db.add_child(TableId::TypeDef, 1, TableId::Field).unwrap();
        let b1 = db.add_child(TableId::TypeDef, 2, TableId::Field).unwrap();

        assert_eq!((a1, a2, b1), (1, 2, 3));
        assert_eq!(db.rows(TableId::FieldPtr), 0);
        assert_eq!(
            db.children_of(TableId::TypeDef, 1, TableId::Field).unwrap(),
            [1, 2]
        );
        assert_eq!(
            db.children_of(TableId::TypeDef, 2, TableId::Field).unwrap(),
            [3]
        );
    }

    #[test]
    fn out_of_order_insert_converts_once() {
        let mut db = db_with_typedefs(2);
        db.add_child(TableId::TypeDef, 1, TableId::Field).unwrap();
        db.add_child(TableId::TypeDef, 2, TableId::Field).unwrap();

        // Type 1 grows after type 2 started; contiguity breaks
        let rid = db.add_child(TableId::TypeDef, 1, TableId::Field).unwrap();
        assert_eq!(rid, 3);
        assert_eq!(db.rows(TableId::FieldPtr), 3);

        assert_eq!(
            db.children_of(TableId::TypeDef, 1, TableId::Field).unwrap(),
            [1, 3]
        );
        assert_eq!(
            db.children_of(TableId::TypeDef, 2, TableId::Field).unwrap(),
            [2]
        );

        // A further insert reuses the existing Ptr table
        db.add_child(TableId::TypeDef, 1, TableId::Field).unwrap();
        assert_eq!(db.rows(TableId::FieldPtr), 4);
        assert_eq!(
            db.children_of(TableId::TypeDef, 1, TableId::Field).unwrap(),
            [1, 3, 4]
        );
    }

    #[test]
    fn first_child_of_later_parent_shifts_runs() {
        let mut db = db_with_typedefs(3);
        db.add_child(TableId::TypeDef, 1, TableId::MethodDef).unwrap();
        db.add_child(TableId::TypeDef, 3, TableId::MethodDef).unwrap();

        // Type 2 gains its first method between the existing runs
        db.add_child(TableId::TypeDef, 2, TableId::MethodDef).unwrap();

        assert_eq!(
            db.children_of(TableId::TypeDef, 1, TableId::MethodDef).unwrap(),
            [1]
        );
        assert_eq!(
            db.children_of(TableId::TypeDef, 2, TableId::MethodDef).unwrap(),
            [3]
        );
        assert_eq!(
            db.children_of(TableId::TypeDef, 3, TableId::MethodDef).unwrap(),
            [2]
        );
    }

    #[test]
    fn params_hang_off_methods() {
        let mut db = MetaDatabase::new(2).unwrap();
        db.add_record(TableId::TypeDef).unwrap();
        let m1 = db.add_child(TableId::TypeDef, 1, TableId::MethodDef).unwrap();
        let m2 = db.add_child(TableId::TypeDef, 1, TableId::MethodDef).unwrap();

        let p1 = db.add_child(TableId::MethodDef, m1, TableId::Param).unwrap();
        db.add_child(TableId::MethodDef, m2, TableId::Param).unwrap();
        db.set(TableId::Param, p1, col::PARAM_SEQUENCE, 1).unwrap();

        assert_eq!(
            db.children_of(TableId::MethodDef, m1, TableId::Param).unwrap(),
            [1]
        );
        assert_eq!(
            db.children_of(TableId::MethodDef, m2, TableId::Param).unwrap(),
            [2]
        );
    }

    #[test]
    fn non_list_child_rejected() {
        let mut db = db_with_typedefs(1);
        assert!(db
            .add_child(TableId::TypeDef, 1, TableId::Constant)
            .is_err());
        assert!(db
            .add_child(TableId::EventMap, 1, TableId::Field)
            .is_err());
    }
}
