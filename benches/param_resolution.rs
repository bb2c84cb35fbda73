//! Benchmark: Parameter Loading & Storing
//!
//! Measures step `in:` resolution and `out:` binding.
//! Run: cargo bench --bench param_resolution

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use weft::{load_in_params, store_out_params, Env};

fn bench_load_in_params(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_in_params");

    let env: Env = [
        ("seed".to_string(), json!(7)),
        (
            "config".to_string(),
            json!({"threshold": 0.5, "tags": ["a", "b"]}),
        ),
    ]
    .into_iter()
    .collect();

    group.bench_function("absent_spec", |b| {
        b.iter(|| load_in_params(black_box(None), black_box(&env)).unwrap());
    });

    // Small mapping (3 entries, mixed literal/templated)
    {
        let spec = json!({
            "x": "${{ seed }}",
            "threshold": "${{ config.threshold }}",
            "mode": "'fast'"
        });
        group.bench_function("small_mapping_3", |b| {
            b.iter(|| load_in_params(black_box(Some(&spec)), black_box(&env)).unwrap());
        });
    }

    // Medium mapping (10 entries)
    {
        let mut map = serde_json::Map::new();
        for i in 0..10 {
            map.insert(format!("val_{i}"), json!("${{ seed }}"));
        }
        let spec = serde_json::Value::Object(map);
        group.bench_function("medium_mapping_10", |b| {
            b.iter(|| load_in_params(black_box(Some(&spec)), black_box(&env)).unwrap());
        });
    }

    // Single-string spec producing the whole mapping
    {
        let spec = json!("${{ config }}");
        group.bench_function("single_string_spec", |b| {
            b.iter(|| load_in_params(black_box(Some(&spec)), black_box(&env)).unwrap());
        });
    }

    group.finish();
}

fn bench_store_out_params(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_out_params");

    let result = json!({"count": 12, "summary": "ok", "data": {"deep": [1, 2]}});

    // Single-string spec binding the whole result
    {
        let spec = json!("${{ result = value }}");
        group.bench_function("whole_result", |b| {
            b.iter(|| {
                let mut env = Env::new();
                store_out_params(
                    black_box(Some(&spec)),
                    black_box(result.clone()),
                    &mut env,
                )
                .unwrap();
                black_box(env)
            });
        });
    }

    // Mapping spec: one scoped binding per key
    {
        let spec = json!({
            "count": "${{ count = value }}",
            "summary": "${{ summary = value }}",
            "data": "${{ deep = value.deep }}"
        });
        group.bench_function("per_key_3", |b| {
            b.iter(|| {
                let mut env = Env::new();
                store_out_params(
                    black_box(Some(&spec)),
                    black_box(result.clone()),
                    &mut env,
                )
                .unwrap();
                black_box(env)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_load_in_params, bench_store_out_params);
criterion_main!(benches);
