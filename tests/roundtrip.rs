//! Encode/decode round trips over whole databases, exercising the narrow
//! on-disk widths against the wide in-memory layout.

use tablemerge::{col, search, HeapFlags, MetaDatabase, Schema, TableId};

fn sample_database() -> MetaDatabase {
    let mut db = MetaDatabase::new(2).unwrap();

    let module_name = db.strings_mut().unwrap().add("sample.dll").unwrap();
    let module = db.add_record(TableId::Module).unwrap();
    db.set(TableId::Module, module, col::MODULE_NAME, module_name)
        .unwrap();

    let type_name = db.strings_mut().unwrap().add("Widget").unwrap();
    let type_ns = db.strings_mut().unwrap().add("Lib").unwrap();
    let widget = db.add_record(TableId::TypeDef).unwrap();
    db.set(TableId::TypeDef, widget, col::TYPEDEF_FLAGS, 0x0000_0001)
        .unwrap();
    db.set(TableId::TypeDef, widget, col::TYPEDEF_NAME, type_name)
        .unwrap();
    db.set(TableId::TypeDef, widget, col::TYPEDEF_NAMESPACE, type_ns)
        .unwrap();

    let method_name = db.strings_mut().unwrap().add("Run").unwrap();
    let method_sig = db.blobs_mut().unwrap().add(&[0x20, 0x00, 0x01]).unwrap();
    let run = db
        .add_child(TableId::TypeDef, widget, TableId::MethodDef)
        .unwrap();
    db.set(TableId::MethodDef, run, col::METHOD_FLAGS, 0x0006)
        .unwrap();
    db.set(TableId::MethodDef, run, col::METHOD_NAME, method_name)
        .unwrap();
    db.set(TableId::MethodDef, run, col::METHOD_SIGNATURE, method_sig)
        .unwrap();

    db.user_strings_mut().unwrap().add("hello world").unwrap();
    db
}

#[test]
fn database_survives_encode_decode() {
    let db = sample_database();
    let streams = db.encode().unwrap();
    let copy = MetaDatabase::decode(&streams).unwrap();

    assert_eq!(copy.rows(TableId::Module), 1);
    assert_eq!(copy.rows(TableId::TypeDef), 1);
    assert_eq!(copy.rows(TableId::MethodDef), 1);

    let name_ix = copy.get(TableId::TypeDef, 1, col::TYPEDEF_NAME).unwrap();
    assert_eq!(copy.strings().get(name_ix).unwrap(), "Widget");
    let sig_ix = copy.get(TableId::MethodDef, 1, col::METHOD_SIGNATURE).unwrap();
    assert_eq!(copy.blobs().get(sig_ix).unwrap(), &[0x20, 0x00, 0x01]);

    // A decoded database re-encodes to the identical byte image
    let again = copy.encode().unwrap();
    assert_eq!(again.tables, streams.tables);
    assert_eq!(again.strings, streams.strings);
    assert_eq!(again.blob, streams.blob);
    assert_eq!(again.user_strings, streams.user_strings);
}

#[test]
fn coded_tokens_survive_the_disk_format() {
    let mut db = sample_database();
    let extends = db.add_record(TableId::TypeRef).unwrap();
    db.set_token(
        TableId::TypeRef,
        extends,
        col::TYPEREF_SCOPE,
        TableId::Module.token(1),
    )
    .unwrap();
    db.set_token(
        TableId::TypeDef,
        1,
        col::TYPEDEF_EXTENDS,
        TableId::TypeRef.token(extends),
    )
    .unwrap();

    let copy = MetaDatabase::decode(&db.encode().unwrap()).unwrap();
    assert_eq!(
        copy.get_token(TableId::TypeDef, 1, col::TYPEDEF_EXTENDS).unwrap(),
        TableId::TypeRef.token(1)
    );
    assert_eq!(
        copy.get_token(TableId::TypeRef, 1, col::TYPEREF_SCOPE).unwrap(),
        TableId::Module.token(1)
    );
}

#[test]
fn large_string_heap_widens_offsets() {
    let mut db = sample_database();
    let long = "x".repeat(0x1_0008);
    let offset = db.strings_mut().unwrap().add(&long).unwrap();
    db.set(TableId::TypeDef, 1, col::TYPEDEF_NAMESPACE, offset)
        .unwrap();

    let streams = db.encode().unwrap();
    let (schema, _) = Schema::decode(&streams.tables).unwrap();
    assert!(schema.heap_flags.contains(HeapFlags::LARGE_STRINGS));
    assert!(!schema.heap_flags.contains(HeapFlags::LARGE_BLOBS));

    let copy = MetaDatabase::decode(&streams).unwrap();
    let ns_ix = copy.get(TableId::TypeDef, 1, col::TYPEDEF_NAMESPACE).unwrap();
    assert_eq!(copy.strings().get(ns_ix).unwrap(), long);
}

#[test]
fn large_tables_widen_rids() {
    let mut db = sample_database();
    for index in 0..0x1_0001u32 {
        let name = db.strings_mut().unwrap().add(&format!("f{index}")).unwrap();
        let rid = db.add_child(TableId::TypeDef, 1, TableId::Field).unwrap();
        db.set(TableId::Field, rid, col::FIELD_NAME, name).unwrap();
    }

    let streams = db.encode().unwrap();
    let copy = MetaDatabase::decode(&streams).unwrap();
    assert_eq!(copy.rows(TableId::Field), 0x1_0001);
    let name_ix = copy
        .get(TableId::Field, 0x1_0001, col::FIELD_NAME)
        .unwrap();
    assert_eq!(copy.strings().get(name_ix).unwrap(), "f65536");
}

#[test]
fn v1_database_round_trips_without_generics() {
    let mut db = MetaDatabase::new(1).unwrap();
    let name = db.strings_mut().unwrap().add("legacy.dll").unwrap();
    let module = db.add_record(TableId::Module).unwrap();
    db.set(TableId::Module, module, col::MODULE_NAME, name).unwrap();
    assert!(db.add_record(TableId::GenericParam).is_err());

    let streams = db.encode().unwrap();
    let copy = MetaDatabase::decode(&streams).unwrap();
    assert_eq!(copy.major(), 1);
    assert_eq!(copy.rows(TableId::Module), 1);
    assert_eq!(copy.rows(TableId::GenericParam), 0);
}

#[test]
fn store_searches_follow_the_sorted_key_column() {
    let mut db = sample_database();
    for _ in 0..3 {
        db.add_child(TableId::TypeDef, 1, TableId::Field).unwrap();
    }
    for field in 1..=3u32 {
        let value = db.blobs_mut().unwrap().add(&[field as u8]).unwrap();
        let constant = db.add_record(TableId::Constant).unwrap();
        db.set(TableId::Constant, constant, col::CONSTANT_TYPE, 0x08)
            .unwrap();
        db.set_token(
            TableId::Constant,
            constant,
            col::CONSTANT_PARENT,
            TableId::Field.token(field),
        )
        .unwrap();
        db.set(TableId::Constant, constant, col::CONSTANT_VALUE, value)
            .unwrap();
    }
    db.presave().unwrap();

    let store = db.table(TableId::Constant);
    let key = db.get(TableId::Constant, 2, col::CONSTANT_PARENT).unwrap();
    assert_eq!(search::binary_search(store, col::CONSTANT_PARENT, key), Some(2));
    assert_eq!(
        search::search_multi_row(store, col::CONSTANT_PARENT, key),
        (2, 3)
    );

    let top = db.get(TableId::Constant, 3, col::CONSTANT_PARENT).unwrap();
    assert_eq!(search::search_not_greater(store, col::CONSTANT_PARENT, top), 3);
    assert_eq!(search::search_not_greater(store, col::CONSTANT_PARENT, 0), 0);
}

#[test]
fn presave_order_survives_the_disk_format() {
    let mut db = sample_database();
    for _ in 0..3 {
        db.add_child(TableId::TypeDef, 1, TableId::Field).unwrap();
    }
    // Constants keyed by parent, inserted in descending parent order
    for field in (1..=3u32).rev() {
        let value = db.blobs_mut().unwrap().add(&[field as u8]).unwrap();
        let constant = db.add_record(TableId::Constant).unwrap();
        db.set(TableId::Constant, constant, col::CONSTANT_TYPE, 0x08)
            .unwrap();
        db.set_token(
            TableId::Constant,
            constant,
            col::CONSTANT_PARENT,
            TableId::Field.token(field),
        )
        .unwrap();
        db.set(TableId::Constant, constant, col::CONSTANT_VALUE, value)
            .unwrap();
    }

    db.presave().unwrap();
    assert!(db.is_sorted(TableId::Constant));

    let mut copy = MetaDatabase::decode(&db.encode().unwrap()).unwrap();
    assert!(copy.is_sorted(TableId::Constant));

    // The keyed column is ascending after the sort
    let mut last = 0;
    for rid in 1..=3u32 {
        let parent = copy.get(TableId::Constant, rid, col::CONSTANT_PARENT).unwrap();
        assert!(parent >= last);
        last = parent;
    }
    // Sorted binary-search lookup agrees with the physical rows
    for rid in 1..=3u32 {
        let key = copy.get(TableId::Constant, rid, col::CONSTANT_PARENT).unwrap();
        let hits = copy.lookup(TableId::Constant, col::CONSTANT_PARENT, key);
        assert_eq!(hits, vec![rid]);
    }
}
