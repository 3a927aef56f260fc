use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use niflheim_rt::boxed::box_i64_new;
use niflheim_rt::collector::collect;
use niflheim_rt::shadow_stack::RootFrame;
use niflheim_rt::thread_state::{init, shutdown, with_thread_state};
use niflheim_rt::vector::{vec_new, vec_push};
use niflheim_rt::ObjectHeader;

fn bench_allocation_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation");
    for n in [1_000usize, 10_000, 100_000] {
        group.bench_function(BenchmarkId::new("unrooted boxes", n), |b| {
            b.iter_batched(
                || init(),
                |_| {
                    with_thread_state(|ts| {
                        for i in 0..n {
                            box_i64_new(ts, i as i64);
                        }
                    });
                    shutdown();
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_rooted_vector_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector growth");
    for n in [100usize, 1_000, 10_000] {
        group.bench_function(BenchmarkId::new("push", n), |b| {
            b.iter_batched(
                || init(),
                |_| {
                    with_thread_state(|ts| {
                        let mut slots = [std::ptr::null_mut::<ObjectHeader>(); 1];
                        let mut frame = RootFrame::init(&mut slots);
                        ts.shadow_stack().push(&mut frame as *mut _);
                        let v = vec_new(ts);
                        frame.slot_store(0, v);
                        for i in 0..n {
                            let b = box_i64_new(ts, i as i64);
                            vec_push(ts, v, b);
                        }
                        ts.shadow_stack().pop();
                    });
                    collect();
                    shutdown();
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_allocation_throughput, bench_rooted_vector_growth);
criterion_main!(benches);
