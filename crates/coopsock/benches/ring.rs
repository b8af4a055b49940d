//! Receive ring and completion queue throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use coopsock::completion::CompletionQueue;
use coopsock::ring::RecvRing;
use coopsock_core::{Completion, CompletionSink, CorrId, CreationId, OpKind, SocketHandle};

fn ring_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("recv_ring");
    for &chunk in &[64usize, 536, 1460] {
        group.throughput(Throughput::Bytes(chunk as u64));
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            let mut ring = RecvRing::new(2048);
            let data = vec![0xA5u8; chunk];
            // Odd read size keeps the cursors wrapping
            let mut out = vec![0u8; chunk - 1];
            b.iter(|| {
                ring.push(black_box(&data));
                while ring.len() >= out.len() {
                    ring.pop_into(&mut out);
                }
                black_box(&out);
            });
        });
    }
    group.finish();
}

fn queue_post_drain(c: &mut Criterion) {
    let queue = CompletionQueue::new(256);
    let corr = CorrId::new(SocketHandle::new(1), CreationId::new(1));
    c.bench_function("completion_queue_post_drain_32", |b| {
        b.iter(|| {
            for i in 0..32 {
                let _ = queue.push(Completion::ok(corr, OpKind::Send, i));
            }
            while let Some(done) = queue.pop() {
                black_box(done);
            }
        });
    });
}

criterion_group!(benches, ring_push_pop, queue_post_drain);
criterion_main!(benches);
