use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reg_access::codec::{decode_multi_string, encode_multi_string};
use reg_access::{Access, Registry, RegistryValueIterator, RootKey, TextEncoding};

fn bench_values(c: &mut Criterion) {
    let registry = Registry::in_memory();
    let key = registry
        .create_key(RootKey::CurrentUser, "Bench", Access::ALL_ACCESS)
        .unwrap();
    key.write_string("s", "some moderately long string value").unwrap();

    c.bench_function("write_u32", |b| b.iter(|| key.write_u32("d", black_box(42)).unwrap()));
    c.bench_function("read_string", |b| b.iter(|| key.read_string(black_box("s")).unwrap()));
}

fn bench_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_iteration");
    for count in [10usize, 100, 1000] {
        let registry = Registry::in_memory();
        let key = registry
            .create_key(RootKey::CurrentUser, "Iter", Access::ALL_ACCESS)
            .unwrap();
        for i in 0..count {
            key.write_u32(&format!("v{}", i), i as u32).unwrap();
        }

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| RegistryValueIterator::new(&registry, RootKey::CurrentUser, "Iter").count())
        });
    }
    group.finish();
}

fn bench_delete_tree(c: &mut Criterion) {
    c.bench_function("delete_tree_depth_50", |b| {
        b.iter_with_setup(
            || {
                let registry = Registry::in_memory();
                let path: Vec<String> = (0..50).map(|i| format!("K{}", i)).collect();
                registry
                    .create_key(RootKey::CurrentUser, &format!("Tree\\{}", path.join("\\")), Access::ALL_ACCESS)
                    .unwrap();
                registry
            },
            |registry| {
                let root = registry.open_key(RootKey::CurrentUser, "", Access::ALL_ACCESS).unwrap();
                root.delete_key("Tree").unwrap();
            },
        )
    });
}

fn bench_multi_string(c: &mut Criterion) {
    let entries: Vec<String> = (0..64).map(|i| format!("entry-{}", i)).collect();
    let encoded = encode_multi_string(&entries, TextEncoding::Utf16Le).unwrap();

    c.bench_function("decode_multi_string_utf16", |b| {
        b.iter(|| decode_multi_string(black_box(&encoded), TextEncoding::Utf16Le))
    });
}

criterion_group!(benches, bench_values, bench_iteration, bench_delete_tree, bench_multi_string);
criterion_main!(benches);
