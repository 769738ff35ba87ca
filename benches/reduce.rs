//! Reduction benchmark: a feed snapshot is tens of thousands of events, so
//! per-document cost dominates the reduce stage.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use feedmill::config::ReduceConfig;
use feedmill::reduce::{clean_value, EventReducer};
use feedmill::render::render_markdown;
use serde_json::{json, Value};

fn make_event(attributes: usize) -> Value {
    let attrs: Vec<Value> = (0..attributes)
        .map(|i| {
            json!({
                "category": "Payload delivery",
                "type": if i % 3 == 0 { "filename|sha256" } else { "domain" },
                "value": if i % 3 == 0 {
                    format!("drop{i}.exe|e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                } else {
                    format!("host{i}.example.test")
                },
                "comment": format!("indicator {i}"),
                "to_ids": i % 2 == 0,
                "uuid": "00000000-0000-0000-0000-000000000000",
            })
        })
        .collect();

    json!({"Event": {
        "date": "2025-08-20",
        "info": "benchmark campaign",
        "threat_level_id": 2,
        "uuid": "11111111-1111-1111-1111-111111111111",
        "Orgc": {"name": "bench"},
        "Tag": [{"name": "tlp:white", "colour": "#ffffff"}],
        "Attribute": attrs,
        "Object": [{
            "name": "file",
            "description": "delivered file",
            "meta-category": "file",
            "Attribute": [
                {"type": "md5", "value": "0123456789abcdef0123456789abcdef"},
                {"type": "size-in-bytes", "value": 4096},
            ],
        }],
    }})
}

fn bench_reduce_event(c: &mut Criterion) {
    let reducer = EventReducer::new(ReduceConfig::default());
    let event = make_event(100);

    c.bench_function("reduce_event_100_attrs", |b| {
        b.iter(|| black_box(reducer.reduce(black_box(&event))))
    });
}

fn bench_render_markdown(c: &mut Criterion) {
    let reducer = EventReducer::new(ReduceConfig::default());
    let reduced = reducer.reduce(&make_event(100)).unwrap();

    c.bench_function("render_markdown_100_attrs", |b| {
        b.iter(|| black_box(render_markdown(black_box(&reduced))))
    });
}

fn bench_clean_value(c: &mut Criterion) {
    let event = make_event(100);

    c.bench_function("clean_value_100_attrs", |b| {
        b.iter(|| black_box(clean_value(black_box(&event))))
    });
}

criterion_group!(
    benches,
    bench_reduce_event,
    bench_render_markdown,
    bench_clean_value
);
criterion_main!(benches);
