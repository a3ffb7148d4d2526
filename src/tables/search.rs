//! Binary search over physically sorted key columns.
//!
//! These routines require the table to actually be ordered by the searched
//! column; callers check the schema's sorted bitmask (or use the virtual
//! sort instead) before coming here. All ranges are expressed in RIDs.

use crate::tables::TableStore;

/// Finds any one row whose key column equals `value`.
///
/// The table must be physically sorted by `column`.
#[must_use]
pub fn binary_search(store: &TableStore, column: usize, value: u32) -> Option<u32> {
    let mut low = 1u32;
    let mut high = store.row_count();

    while low <= high {
        let mid = low + (high - low) / 2;
        let key = store.value(mid, column);
        if key == value {
            return Some(mid);
        }
        if key < value {
            low = mid + 1;
        } else {
            if mid == 1 {
                break;
            }
            high = mid - 1;
        }
    }
    None
}

/// Returns the highest RID whose key is `<= value`, or 0 if every key is
/// greater. Used to derive "first child of the next parent" boundaries.
///
/// The table must be physically sorted by `column`.
#[must_use]
pub fn search_not_greater(store: &TableStore, column: usize, value: u32) -> u32 {
    let mut low = 1u32;
    let mut high = store.row_count();
    let mut best = 0u32;

    while low <= high {
        let mid = low + (high - low) / 2;
        if store.value(mid, column) <= value {
            best = mid;
            low = mid + 1;
        } else {
            if mid == 1 {
                break;
            }
            high = mid - 1;
        }
    }
    best
}

/// Finds the contiguous run of rows whose key equals `value`, as a
/// half-open RID range `[start, end)`. Finds one match by binary search,
/// then extends linearly in both directions.
///
/// The table must be physically sorted by `column`. Returns `(0, 0)` when
/// no row matches.
#[must_use]
pub fn search_multi_row(store: &TableStore, column: usize, value: u32) -> (u32, u32) {
    let Some(hit) = binary_search(store, column, value) else {
        return (0, 0);
    };

    let mut start = hit;
    while start > 1 && store.value(start - 1, column) == value {
        start -= 1;
    }

    let mut end = hit + 1;
    while end <= store.row_count() && store.value(end, column) == value {
        end += 1;
    }

    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{col, table_definition, TableId};

    fn sorted_store(keys: &[u32]) -> TableStore {
        let def = table_definition(2, TableId::InterfaceImpl).unwrap();
        let mut store = TableStore::new(def);
        for key in keys {
            let rid = store.add_record();
            store.set(rid, col::INTERFACEIMPL_CLASS, *key).unwrap();
        }
        store
    }

    #[test]
    fn binary_search_hits_and_misses() {
        let store = sorted_store(&[1, 3, 3, 5, 8, 13]);
        assert!(binary_search(&store, col::INTERFACEIMPL_CLASS, 5).is_some());
        assert!(binary_search(&store, col::INTERFACEIMPL_CLASS, 1).is_some());
        assert!(binary_search(&store, col::INTERFACEIMPL_CLASS, 13).is_some());
        assert!(binary_search(&store, col::INTERFACEIMPL_CLASS, 4).is_none());
        assert!(binary_search(&store, col::INTERFACEIMPL_CLASS, 0).is_none());
        assert!(binary_search(&store, col::INTERFACEIMPL_CLASS, 99).is_none());
    }

    #[test]
    fn empty_table() {
        let store = sorted_store(&[]);
        assert!(binary_search(&store, col::INTERFACEIMPL_CLASS, 1).is_none());
        assert_eq!(search_not_greater(&store, col::INTERFACEIMPL_CLASS, 1), 0);
        assert_eq!(search_multi_row(&store, col::INTERFACEIMPL_CLASS, 1), (0, 0));
    }

    #[test]
    fn not_greater() {
        let store = sorted_store(&[2, 4, 4, 9]);
        assert_eq!(search_not_greater(&store, col::INTERFACEIMPL_CLASS, 1), 0);
        assert_eq!(search_not_greater(&store, col::INTERFACEIMPL_CLASS, 2), 1);
        assert_eq!(search_not_greater(&store, col::INTERFACEIMPL_CLASS, 5), 3);
        assert_eq!(search_not_greater(&store, col::INTERFACEIMPL_CLASS, 100), 4);
    }

    #[test]
    fn multi_row_ranges() {
        let store = sorted_store(&[1, 3, 3, 3, 5]);
        assert_eq!(search_multi_row(&store, col::INTERFACEIMPL_CLASS, 3), (2, 5));
        assert_eq!(search_multi_row(&store, col::INTERFACEIMPL_CLASS, 1), (1, 2));
        assert_eq!(search_multi_row(&store, col::INTERFACEIMPL_CLASS, 5), (5, 6));
        assert_eq!(search_multi_row(&store, col::INTERFACEIMPL_CLASS, 2), (0, 0));
    }

    #[test]
    fn whole_table_one_key() {
        let store = sorted_store(&[7, 7, 7]);
        assert_eq!(search_multi_row(&store, col::INTERFACEIMPL_CLASS, 7), (1, 4));
    }
}
