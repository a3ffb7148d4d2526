use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use tablemerge::{col, hash_bytes, HashIndex, MetaDatabase, TableId};

const ROWS: u32 = 10_000;

fn constants_database(presaved: bool) -> MetaDatabase {
    let mut db = MetaDatabase::new(2).unwrap();

    let name = db.strings_mut().unwrap().add("bench.dll").unwrap();
    let module = db.add_record(TableId::Module).unwrap();
    db.set(TableId::Module, module, col::MODULE_NAME, name).unwrap();

    let holder = db.add_record(TableId::TypeDef).unwrap();
    for rid in 1..=ROWS {
        let field = db.add_child(TableId::TypeDef, holder, TableId::Field).unwrap();
        let value = db.blobs_mut().unwrap().add(&rid.to_le_bytes()).unwrap();
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

    if presaved {
        db.presave().unwrap();
    }
    db
}

fn bench_lookup(c: &mut Criterion) {
    let key_of = |db: &MetaDatabase, rid: u32| {
        db.get(TableId::Constant, rid, col::CONSTANT_PARENT).unwrap()
    };

    let mut sorted = constants_database(true);
    let keys: Vec<u32> = (1..=ROWS).map(|rid| key_of(&sorted, rid)).collect();
    c.bench_function("lookup/sorted_binary_search", |b| {
        let mut cursor = 0usize;
        b.iter(|| {
            cursor = (cursor + 7919) % keys.len();
            black_box(sorted.lookup(TableId::Constant, col::CONSTANT_PARENT, keys[cursor]))
        });
    });

    let mut unsorted = constants_database(false);
    let keys: Vec<u32> = (1..=ROWS).map(|rid| key_of(&unsorted, rid)).collect();
    c.bench_function("lookup/virtual_sort", |b| {
        let mut cursor = 0usize;
        b.iter(|| {
            cursor = (cursor + 7919) % keys.len();
            black_box(unsorted.lookup(TableId::Constant, col::CONSTANT_PARENT, keys[cursor]))
        });
    });

    let mut index = HashIndex::new();
    let names: Vec<String> = (0..ROWS).map(|n| format!("Member{n}")).collect();
    for (position, name) in names.iter().enumerate() {
        index.add(hash_bytes(name.as_bytes()), position as u32 + 1);
    }
    c.bench_function("lookup/hash_index_probe", |b| {
        let mut cursor = 0usize;
        b.iter(|| {
            cursor = (cursor + 7919) % names.len();
            let hash = hash_bytes(names[cursor].as_bytes());
            black_box(index.find(hash).count())
        });
    });
}

criterion_group!(benches, bench_lookup);
criterion_main!(benches);
