//! Benchmarks for redis-walker
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn benchmark_key_filter(c: &mut Criterion) {
    use redis_walker::walker::KeyFilter;

    let keys: Vec<String> = (0..10_000)
        .map(|i| format!("tenant:{}:Session:{:08x}", i % 37, i * 7919))
        .collect();

    c.bench_function("filter_case_insensitive_10k", |b| {
        let filter = KeyFilter::new("session:00", false);
        b.iter(|| {
            let hits = keys.iter().filter(|k| filter.matches(k)).count();
            black_box(hits);
        })
    });

    c.bench_function("filter_case_sensitive_10k", |b| {
        let filter = KeyFilter::new("Session:00", true);
        b.iter(|| {
            let hits = keys.iter().filter(|k| filter.matches(k)).count();
            black_box(hits);
        })
    });
}

fn benchmark_estimate(c: &mut Criterion) {
    use redis_walker::store::KeyType;
    use redis_walker::walker::estimate_size;

    let types = [
        KeyType::String,
        KeyType::Hash,
        KeyType::List,
        KeyType::Set,
        KeyType::ZSet,
        KeyType::Unknown,
    ];

    c.bench_function("estimate_size", |b| {
        b.iter(|| {
            let mut total = 0i64;
            for (i, key_type) in types.iter().enumerate() {
                total += estimate_size(*key_type, black_box(Some(i as i64 * 13)));
            }
            black_box(total);
        })
    });
}

fn benchmark_info_parsing(c: &mut Criterion) {
    use redis_walker::info::{parse_info, parse_keyspace};

    let info: String = (0..200)
        .map(|i| format!("field_{}:value_{}\r\n", i, i))
        .collect();
    let keyspace: String = (0..16)
        .map(|db| format!("db{}:keys={},expires=0,avg_ttl=0\r\n", db, db * 1000))
        .collect();

    c.bench_function("parse_info", |b| b.iter(|| black_box(parse_info(&info))));
    c.bench_function("parse_keyspace", |b| {
        b.iter(|| black_box(parse_keyspace(&keyspace)))
    });
}

criterion_group!(benches, benchmark_key_filter, benchmark_estimate, benchmark_info_parsing);
criterion_main!(benches);
