//! Virtual sort: a lazily built secondary sort index.
//!
//! Tables being built incrementally are almost never physically sorted by
//! the key column a lookup needs. Instead of reordering rows, a side array
//! of RIDs ordered by the key column is built on first use and thrown away
//! on any row mutation. Lookups binary-search the side array and map
//! positions back to real RIDs.

use crate::tables::TableStore;

/// Side array of RIDs ordered by one key column.
#[derive(Debug, Clone)]
pub struct VirtualSort {
    column: usize,
    map: Vec<u32>,
}

impl VirtualSort {
    /// Builds the sort index for `column` over the current rows of `store`.
    ///
    /// The sort is stable, so rows with equal keys keep their RID order.
    #[must_use]
    pub fn build(store: &TableStore, column: usize) -> Self {
        let mut map: Vec<u32> = (1..=store.row_count()).collect();
        map.sort_by_key(|rid| store.value(*rid, column));
        VirtualSort { column, map }
    }

    /// The key column this index is ordered by.
    #[must_use]
    pub fn column(&self) -> usize {
        self.column
    }

    /// Half-open position range `[start, end)` of rows whose key equals
    /// `value`. Empty when no row matches.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn equal_range(&self, store: &TableStore, value: u32) -> (u32, u32) {
        let start = self
            .map
            .partition_point(|rid| store.value(*rid, self.column) < value);
        let end = self
            .map
            .partition_point(|rid| store.value(*rid, self.column) <= value);
        (start as u32, end as u32)
    }

    /// Real RID at sorted position `position`.
    #[must_use]
    pub fn rid_at(&self, position: u32) -> u32 {
        self.map.get(position as usize).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::{col, table_definition, TableId};
    use crate::tables::TableStore;

    fn store_with_classes(classes: &[u32]) -> TableStore {
        let def = table_definition(2, TableId::InterfaceImpl).unwrap();
        let mut store = TableStore::new(def);
        for class in classes {
            let rid = store.add_record();
            store.set(rid, col::INTERFACEIMPL_CLASS, *class).unwrap();
        }
        store
    }

    #[test]
    fn lookup_matches_linear_scan() {
        let classes = [5u32, 2, 9, 2, 5, 2, 7];
        let mut store = store_with_classes(&classes);

        for needle in [2u32, 5, 7, 9, 1, 100] {
            let (start, end) = store.sorted_range(col::INTERFACEIMPL_CLASS, needle);
            let mut via_vsort: Vec<u32> =
                (start..end).map(|pos| store.sorted_rid(pos)).collect();
            via_vsort.sort_unstable();

            let via_scan: Vec<u32> = (1..=store.row_count())
                .filter(|rid| {
                    store.get(*rid, col::INTERFACEIMPL_CLASS).unwrap() == needle
                })
                .collect();
            assert_eq!(via_vsort, via_scan, "needle {needle}");
        }
    }

    #[test]
    fn insert_invalidates_index() {
        let mut store = store_with_classes(&[3, 1]);
        let (start, end) = store.sorted_range(col::INTERFACEIMPL_CLASS, 1);
        assert_eq!(end - start, 1);

        let rid = store.add_record();
        store.set(rid, col::INTERFACEIMPL_CLASS, 1).unwrap();

        // The rebuilt index must see the new row
        let (start, end) = store.sorted_range(col::INTERFACEIMPL_CLASS, 1);
        assert_eq!(end - start, 2);
    }

    #[test]
    fn stable_within_equal_keys() {
        let mut store = store_with_classes(&[4, 4, 4]);
        let (start, end) = store.sorted_range(col::INTERFACEIMPL_CLASS, 4);
        let rids: Vec<u32> = (start..end).map(|pos| store.sorted_rid(pos)).collect();
        assert_eq!(rids, [1, 2, 3]);
    }
}
