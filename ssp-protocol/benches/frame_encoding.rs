use std::hint::black_box;
use std::io::Cursor;

use criterion::{Criterion, criterion_group, criterion_main};
use ssp_protocol::{Frame, STATUS_OK, Sequence, codec::encode_frame, event::decode_events};

fn encode(c: &mut Criterion) {
    let payload: Vec<u8> = (0..=253).collect();
    c.bench_function("encode max payload", |b| {
        b.iter(|| encode_frame(black_box(Sequence::ONE), black_box(0x02), black_box(&payload)))
    });

    let stuffed = vec![0x7F; 254];
    c.bench_function("encode stuffed payload", |b| {
        b.iter(|| encode_frame(black_box(Sequence::ONE), black_box(0x02), black_box(&stuffed)))
    });
}

fn decode(c: &mut Criterion) {
    let payload: Vec<u8> = (0..=253).collect();
    let encoded = encode_frame(Sequence::ONE, STATUS_OK, &payload).unwrap();
    c.bench_function("decode max payload", |b| {
        b.iter(|| Frame::from_reader(&mut Cursor::new(black_box(&encoded))))
    });

    let events: Vec<u8> = [0xEE, 0x00, 0xF1, 0xE8, 0xCC, 0xEB].repeat(40);
    c.bench_function("decode poll events", |b| {
        b.iter(|| decode_events(black_box(&events), &[]))
    });
}

criterion_group!(benches, encode, decode);
criterion_main!(benches);
