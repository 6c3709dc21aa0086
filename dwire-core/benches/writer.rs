// Writer throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dwire_core::signature::Kind;
use dwire_core::value::Value;
use dwire_core::{MessageWriter, SegmentedBuffer, Signature, VecBuffer};

fn bench_primitive_stream(c: &mut Criterion) {
    c.bench_function("write_10k_u32", |b| {
        b.iter(|| {
            let mut buf = VecBuffer::with_capacity(64 * 1024);
            let mut writer = MessageWriter::new(&mut buf);
            for i in 0..10_000u32 {
                writer.write_u32(black_box(i));
            }
            black_box(buf.into_bytes())
        })
    });
}

fn bench_string_paths(c: &mut Criterion) {
    let short = "x".repeat(1024);
    let long = "x".repeat(64 * 1024);

    c.bench_function("write_short_string", |b| {
        b.iter(|| {
            let mut buf = VecBuffer::with_capacity(2048);
            let mut writer = MessageWriter::new(&mut buf);
            writer.write_string(black_box(&short)).unwrap();
            black_box(buf.into_bytes())
        })
    });

    c.bench_function("write_long_string_streaming", |b| {
        b.iter(|| {
            let mut buf = SegmentedBuffer::new();
            let mut writer = MessageWriter::new(&mut buf);
            writer.write_string(black_box(&long)).unwrap();
            black_box(buf.to_bytes())
        })
    });
}

fn bench_value_tree(c: &mut Criterion) {
    let entries: Vec<(Value, Value)> = (0..256u8)
        .map(|i| (Value::Byte(i), Value::from(format!("value-{i}"))))
        .collect();
    let value = Value::structure(vec![
        Value::array((0..1000i32).map(Value::Int32).collect()).unwrap(),
        Value::dictionary(Kind::Byte, Signature::single("s").unwrap(), entries).unwrap(),
    ])
    .unwrap();

    c.bench_function("write_value_tree", |b| {
        b.iter(|| {
            let mut buf = VecBuffer::with_capacity(16 * 1024);
            let mut writer = MessageWriter::new(&mut buf);
            writer.write_value(black_box(&value)).unwrap();
            black_box(buf.into_bytes())
        })
    });
}

criterion_group!(
    benches,
    bench_primitive_stream,
    bench_string_paths,
    bench_value_tree
);
criterion_main!(benches);
