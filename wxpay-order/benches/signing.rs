//! Benchmarks for signing, finalization and wire encoding.
//!
//! Run with: `cargo bench --bench signing`

#![allow(clippy::let_underscore_must_use, reason = "Criterion benchmarks ignore results")]
#![allow(missing_docs, reason = "Benchmark functions are self-documenting")]

use std::{hint::black_box, net::Ipv4Addr};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use wxpay_order::{
    codec::xml,
    order::{AddressResolver, FieldSet, FieldValue, NonceSource, SignKey, TradeType, UnifiedOrder},
};

const KEY: &str = "192006250b4c09247ec02edce69f6a2d";

struct FixedNonce;

impl NonceSource for FixedNonce {
    fn nonce(&self) -> String {
        "5K8264ILTKCH16CQ2502SI8ZNMTM67".to_owned()
    }
}

struct FixedAddress;

impl AddressResolver for FixedAddress {
    fn local_ipv4(&self) -> Option<Ipv4Addr> {
        Some(Ipv4Addr::new(123, 12, 12, 123))
    }
}

fn setup_order() -> UnifiedOrder {
    let mut order = UnifiedOrder::new(KEY)
        .with_nonce_source(FixedNonce)
        .with_address_resolver(FixedAddress);
    order
        .appid("wxd930ea5d5a258f4f")
        .mch_id("10000100")
        .sub_mch_id("1900000109")
        .body("Ipad mini 16G")
        .attach("Shenzhen branch")
        .out_trade_no("20150806125346")
        .total_fee(888)
        .notify_url("https://example.com/wxpay/notify")
        .trade_type(TradeType::Native)
        .product_id("12235413214070356458058");
    order
}

fn field_set(len: usize) -> FieldSet {
    (0..len).map(|i| (format!("field_{i:03}"), FieldValue::Text(format!("value-{i}")))).collect()
}

fn bench_sign(c: &mut Criterion) {
    let _ = tracing_subscriber::fmt().with_max_level(tracing::Level::ERROR).try_init();

    let mut group = c.benchmark_group("sign");
    let key = SignKey::new(KEY);

    for len in [4, 16, 64] {
        let fields = field_set(len);
        group.bench_with_input(BenchmarkId::new("fields", len), &fields, |b, fields| {
            b.iter(|| black_box(key.sign(black_box(fields))));
        });
    }

    group.finish();
}

fn bench_finalize(c: &mut Criterion) {
    c.bench_function("finalize_unified_order", |b| {
        b.iter_batched(
            setup_order,
            |mut order| black_box(order.finalize()),
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_encode(c: &mut Criterion) {
    let mut order = setup_order();
    let Ok(signed) = order.finalize() else {
        return;
    };

    c.bench_function("encode_xml_root", |b| {
        b.iter(|| black_box(xml::encode(black_box(signed.as_fields()), Some("xml"))));
    });
}

criterion_group!(benches, bench_sign, bench_finalize, bench_encode);
criterion_main!(benches);
