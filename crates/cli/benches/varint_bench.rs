use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use varint::{decode, encode_into, read_vlong, size_of, write_vlong};

const N: usize = 5_000;

fn sample_values() -> Vec<i64> {
    // spread across every encoded length, both signs
    (0..N as i64)
        .map(|i| {
            let shift = (i % 63) as u32;
            let v = (1i64 << shift) + i;
            if i % 2 == 0 {
                v
            } else {
                -v
            }
        })
        .collect()
}

fn varint_size_of(c: &mut Criterion) {
    let values = sample_values();
    c.bench_function("varint_size_of_5k", |b| {
        b.iter(|| {
            let total: usize = values.iter().map(|&v| size_of(black_box(v))).sum();
            black_box(total)
        });
    });
}

fn varint_encode(c: &mut Criterion) {
    let values = sample_values();
    c.bench_function("varint_encode_5k", |b| {
        b.iter_batched(
            || Vec::with_capacity(N * 9),
            |mut buf| {
                for &v in &values {
                    encode_into(&mut buf, v);
                }
                buf
            },
            BatchSize::SmallInput,
        );
    });
}

fn varint_decode(c: &mut Criterion) {
    let values = sample_values();
    let mut buf = Vec::new();
    for &v in &values {
        encode_into(&mut buf, v);
    }

    c.bench_function("varint_decode_5k", |b| {
        b.iter(|| {
            let mut cursor = &buf[..];
            let mut count = 0usize;
            while !cursor.is_empty() {
                let (v, used) = decode(cursor).unwrap();
                black_box(v);
                cursor = &cursor[used..];
                count += 1;
            }
            assert_eq!(count, N);
        });
    });
}

fn varint_stream_roundtrip(c: &mut Criterion) {
    let values = sample_values();
    c.bench_function("varint_stream_roundtrip_5k", |b| {
        b.iter_batched(
            || Vec::with_capacity(N * 9),
            |mut sink| {
                for &v in &values {
                    write_vlong(&mut sink, v).unwrap();
                }
                let mut src = &sink[..];
                for _ in 0..N {
                    black_box(read_vlong(&mut src).unwrap());
                }
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    varint_size_of,
    varint_encode,
    varint_decode,
    varint_stream_roundtrip,
);

criterion_main!(benches);
