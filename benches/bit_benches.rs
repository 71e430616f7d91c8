use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use simatic_s7::utils::{expand_bits, pack_bits};
use simatic_s7::ReadDbCommand;

fn bench_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_bits");
    for size in [4usize, 64, 462] {
        let bytes: Vec<u8> = (0..size).map(|i| i as u8).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| expand_bits(black_box(bytes)))
        });
    }
    group.finish();
}

fn bench_pack(c: &mut Criterion) {
    let bits = expand_bits(&[0xA5; 462]);
    c.bench_function("pack_bits_462", |b| b.iter(|| pack_bits(black_box(&bits))));
}

fn bench_read_frame(c: &mut Criterion) {
    c.bench_function("read_db_frame", |b| {
        b.iter(|| {
            ReadDbCommand::new(black_box(1), black_box(10), 0, black_box(64))
                .and_then(|cmd| cmd.to_bytes())
        })
    });
}

criterion_group!(benches, bench_expand, bench_pack, bench_read_frame);
criterion_main!(benches);
