use criterion::{Criterion, black_box, criterion_group, criterion_main};
use defer_scheduler::{EffectQueue, HandlerTable, Scheduler};

fn benchmark_calls(c: &mut Criterion) {
    c.bench_function("call + flush 1000", |b| {
        b.iter(|| {
            let scheduler = Scheduler::new(HandlerTable::new().with("inc", |x: u64| Ok(x + 1)));
            let call = scheduler.call();
            let futures: Vec<_> = (0..1000).map(|i| call.call("inc", black_box(i))).collect();
            scheduler.flush();
            futures
        })
    });
}

fn benchmark_effects(c: &mut Criterion) {
    c.bench_function("add_effect + flush 1000", |b| {
        b.iter(|| {
            let queue = EffectQueue::new();
            for _ in 0..1000 {
                queue.add_effect(|| {
                    black_box(1 + 1);
                    Ok(())
                });
            }
            queue.flush();
        })
    });
}

criterion_group!(benches, benchmark_calls, benchmark_effects);
criterion_main!(benches);
