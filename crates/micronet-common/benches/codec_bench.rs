// Criterion benchmarks for the micronet-common codec
//
// Run benchmarks with:
//   cargo bench -p micronet-common

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use micronet_common::transport::JsonCodec;
use micronet_common::{Address, Request, Response};
use serde_json::json;

fn bench_request_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_encoding");

    let subscribe = Request::new(
        "PublisherHandler.Subscribe",
        json!({
            "subscriber": Address::tcp("localhost", "4321").with_name("subscriber"),
            "publisher": Address::tcp("localhost", "1234").with_name("publisher"),
        }),
    );
    group.bench_function("subscribe", |b| {
        b.iter(|| JsonCodec::encode_request(black_box(&subscribe)))
    });

    let payload: Vec<String> = (0..100).map(|i| format!("item_{}", i)).collect();
    let update = Request::new("SubscriberHandler.Update", json!(payload));
    group.bench_function("update_large", |b| {
        b.iter(|| JsonCodec::encode_request(black_box(&update)))
    });

    group.finish();
}

fn bench_response_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_decoding");

    let pong = JsonCodec::encode_response(&Response::success(1, json!({"data": "PONG"}))).unwrap();
    group.bench_function("pong", |b| {
        b.iter(|| JsonCodec::decode_response(black_box(&pong)))
    });

    let error = JsonCodec::encode_response(&Response::error(1, "Method not found: X.y")).unwrap();
    group.bench_function("error", |b| {
        b.iter(|| JsonCodec::decode_response(black_box(&error)))
    });

    group.finish();
}

criterion_group!(benches, bench_request_encoding, bench_response_decoding);
criterion_main!(benches);
