use std::hint::black_box;

use cindex_core::semantic::{BuiltinTypes, DeclarationStore, TypeResolver};
use cindex_core::{
    AccessBase, Config, CrossReferencer, DeclRecord, FieldRecord, Input, Location, Position,
    SourceUnit, TypeRef, UseRecord,
};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../tests/fixtures");

fn read_fixture(path: &str) -> Input {
    let text = std::fs::read_to_string(format!("{}/{}", FIXTURES_DIR, path))
        .unwrap_or_else(|_| panic!("Failed to read fixture: {}", path));
    Input::from_json(&text).unwrap_or_else(|e| panic!("Invalid fixture {}: {}", path, e))
}

fn field(name: &str, ty: &str) -> FieldRecord {
    FieldRecord {
        name: name.to_string(),
        ty: ty.parse().unwrap(),
        default: None,
        position: Position::default(),
    }
}

/// One header-like unit per index with a struct pair, a typedef alias, a
/// global and a function, and a user unit that reaches into all of them.
fn generate_units(count: usize) -> Vec<SourceUnit> {
    let mut units = Vec::with_capacity(count * 2);
    for i in 0..count {
        let header = SourceUnit::new(format!("unit_{}.h", i))
            .declare(DeclRecord::Struct {
                name: format!("s_leaf_{}", i),
                fields: Some(vec![field("value", "int"), field("flag", "bool")]),
                position: Position::new(1, 8),
            })
            .declare(DeclRecord::Struct {
                name: format!("s_node_{}", i),
                fields: Some(vec![
                    field("leaf", &format!("s_leaf_{}", i)),
                    field("next", &format!("struct s_node_{}*", i)),
                ]),
                position: Position::new(6, 8),
            })
            .declare(DeclRecord::Typedef {
                name: format!("node_{}_t", i),
                target: TypeRef::tagged(format!("s_node_{}", i)),
                position: Position::new(11, 25),
            })
            .declare(DeclRecord::Global {
                name: format!("g_node_{}", i),
                ty: TypeRef::named(format!("node_{}_t", i)),
                defined: true,
                position: Position::new(13, 10),
            })
            .declare(DeclRecord::Function {
                name: format!("visit_{}", i),
                returns: TypeRef::named("void"),
                params: vec![TypeRef::named(format!("node_{}_t", i)).pointer()],
                defined: true,
                position: Position::new(15, 6),
            });

        let mut user = SourceUnit::new(format!("unit_{}.c", i));
        for line in 0..20u32 {
            let position = Position::new(line * 5 + 1, 5);
            let record = match line % 5 {
                0 => UseRecord::call(format!("visit_{}", i), position),
                1 => UseRecord::field_access(
                    AccessBase::Global(format!("g_node_{}", i)),
                    ".next->next->leaf.value",
                    false,
                    position,
                )
                .unwrap(),
                2 => UseRecord::field_access(
                    AccessBase::Typed(TypeRef::named(format!("node_{}_t", i)).pointer()),
                    "->leaf.flag",
                    true,
                    position,
                )
                .unwrap(),
                3 => UseRecord::global_read(format!("g_node_{}", i), position),
                _ => UseRecord::call(format!("missing_{}", i % 7), position),
            };
            user = user.with_use(record);
        }

        units.push(header);
        units.push(user);
    }
    units
}

fn typedef_chain(length: usize) -> DeclarationStore {
    let mut store = DeclarationStore::new();
    for i in 0..length {
        let target = if i == 0 {
            TypeRef::named("int")
        } else {
            TypeRef::named(format!("alias_{}", i - 1))
        };
        let record = DeclRecord::Typedef {
            name: format!("alias_{}", i),
            target,
            position: Position::new(i as u32 + 1, 1),
        };
        store.declare(
            record.name(),
            record.to_payload("chain.h"),
            Location::new("chain.h", i as u32 + 1, 1),
        );
    }
    store
}

fn bench_typedefs(c: &mut Criterion) {
    let mut group = c.benchmark_group("typedefs");
    let builtins = BuiltinTypes::with_defaults();

    for length in [4, 16, 60] {
        let store = typedef_chain(length);
        let resolver = TypeResolver::new(&store, &builtins);
        let leaf = TypeRef::named(format!("alias_{}", length - 1));

        group.bench_with_input(BenchmarkId::new("resolve_chain", length), &leaf, |b, leaf| {
            b.iter(|| resolver.resolve_canonical(black_box(leaf)))
        });
    }

    group.finish();
}

fn bench_fixtures(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixtures");
    let engine = CrossReferencer::new();

    for fixture in ["c/example.json", "c/parent_chain.json"] {
        let input = read_fixture(fixture);
        group.throughput(Throughput::Elements(input.use_count() as u64));
        group.bench_function(fixture, |b| b.iter(|| engine.analyze(black_box(&input))));
    }

    group.finish();
}

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("analysis");

    let parallel = CrossReferencer::new();
    let sequential = CrossReferencer::with_config(&Config {
        parallel: false,
        ..Config::default()
    });

    for size in [10, 50, 200] {
        let input = Input::new(generate_units(size));
        group.throughput(Throughput::Elements(input.use_count() as u64));

        group.bench_with_input(BenchmarkId::new("parallel", size), &input, |b, input| {
            b.iter(|| parallel.analyze(black_box(input)))
        });
        group.bench_with_input(BenchmarkId::new("sequential", size), &input, |b, input| {
            b.iter(|| sequential.analyze(black_box(input)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_typedefs, bench_fixtures, bench_analysis);
criterion_main!(benches);
