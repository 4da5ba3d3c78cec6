use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bpscan_cbor::{Cursor, Limits};

fn encode_sample() -> Vec<u8> {
    // Mixed stream: tagged integers, strings, and a nested array.
    let mut buf = Vec::new();
    for i in 0..1024u64 {
        buf.push(0xC1);
        buf.push(0x1A);
        buf.extend_from_slice(&(i as u32).to_be_bytes());
        buf.extend_from_slice(&[0x45, 1, 2, 3, 4, 5]);
        buf.extend_from_slice(&[0x82, 0x01, 0x63, b'a', b'b', b'c']);
    }
    buf
}

fn bench_read_chunk(c: &mut Criterion) {
    let buf = encode_sample();
    let limits = Limits::default();

    c.bench_function("read_chunk_stream", |b| {
        b.iter(|| {
            let mut cursor = Cursor::new(black_box(&buf));
            let mut count = 0usize;
            while !cursor.is_at_end() {
                let chunk = cursor.read_chunk(&limits).unwrap();
                black_box(chunk.argument);
                count += 1;
            }
            black_box(count)
        })
    });

    c.bench_function("skip_stream", |b| {
        b.iter(|| {
            let mut cursor = Cursor::new(black_box(&buf));
            while !cursor.is_at_end() {
                cursor.skip_item(&limits).unwrap();
            }
        })
    });
}

criterion_group!(benches, bench_read_chunk);
criterion_main!(benches);
