/*!
 * Pipe Benchmarks
 *
 * Single-threaded transfer cost and cross-thread throughput
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scull_pipe::{OpenFlags, PipeChannel, RingBuffer};
use std::thread;

fn bench_ring_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_push_pop");

    for chunk in [16usize, 256, 1024] {
        group.throughput(Throughput::Bytes(chunk as u64));
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            let mut ring = RingBuffer::new(4096).unwrap();
            let data = vec![0x5Au8; chunk];
            let mut out = vec![0u8; chunk];
            b.iter(|| {
                let mut pushed = 0;
                while pushed < chunk {
                    pushed += ring.push_span(&data[pushed..]);
                }
                let mut popped = 0;
                while popped < chunk {
                    popped += ring.pop_span(&mut out[popped..]);
                }
                black_box(&out);
            });
        });
    }

    group.finish();
}

fn bench_uncontended_write_read(c: &mut Criterion) {
    let channel = PipeChannel::new(2048).unwrap();
    let writer = channel.open(OpenFlags::write_only()).unwrap();
    let reader = channel.open(OpenFlags::read_only()).unwrap();
    let mut buf = [0u8; 64];

    c.bench_function("uncontended_write_read_64", |b| {
        b.iter(|| {
            writer.write_all(black_box(&[7u8; 64])).unwrap();
            let mut got = 0;
            while got < 64 {
                got += reader.read(&mut buf[got..]).unwrap();
            }
        });
    });
}

fn bench_cross_thread_throughput(c: &mut Criterion) {
    const TOTAL: usize = 256 * 1024;
    let mut group = c.benchmark_group("cross_thread_throughput");
    group.throughput(Throughput::Bytes(TOTAL as u64));
    group.sample_size(20);

    for capacity in [256usize, 2048, 16384] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let channel = PipeChannel::new(capacity).unwrap();
                    let writer = channel.open(OpenFlags::write_only()).unwrap();
                    // Keeps a writer attached so the tail can drain after the
                    // producer hangs up
                    let reader = channel.open(OpenFlags::read_write()).unwrap();

                    let producer = thread::spawn(move || {
                        let data = [1u8; 512];
                        let mut sent = 0;
                        while sent < TOTAL {
                            sent += writer.write_all(&data).unwrap();
                        }
                    });

                    let mut buf = [0u8; 512];
                    let mut received = 0;
                    while received < TOTAL {
                        received += reader.read(&mut buf).unwrap();
                    }
                    producer.join().unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_ring_push_pop,
    bench_uncontended_write_read,
    bench_cross_thread_throughput
);

criterion_main!(benches);
