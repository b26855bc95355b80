use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use progression_perf::cache::{CacheConfig, CacheStore};
use progression_perf::pool::{ObjectPool, PoolConfig, StatModifierRecord};
use progression_perf::scheduler::{SchedulerConfig, UpdateScheduler};
use progression_perf::types::{CacheCategory, UpdateKind, UpdatePriority};
use serde_json::json;

fn bench_cache_hits(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_get_hit");

    for size in [100usize, 1000].iter() {
        let mut store: CacheStore<u64> = CacheStore::new(
            CacheConfig::default().with_max_entries(*size),
        )
        .unwrap();
        for i in 0..*size {
            store.insert(CacheCategory::StatModifiers, format!("k{}", i), i as u64);
        }

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, size| {
            let mut i = 0usize;
            b.iter(|| {
                let key = format!("k{}", i % size);
                i += 1;
                black_box(store.get(CacheCategory::StatModifiers, &key))
            });
        });
    }

    group.finish();
}

fn bench_cache_insert_with_eviction(c: &mut Criterion) {
    let mut store: CacheStore<u64> = CacheStore::new(
        CacheConfig::default().with_max_entries(500),
    )
    .unwrap();

    let mut i = 0u64;
    c.bench_function("cache_insert_evicting", |b| {
        b.iter(|| {
            i += 1;
            store.insert(CacheCategory::SkillList, format!("k{}", i), i);
        });
    });
}

fn bench_pool_cycle(c: &mut Criterion) {
    let mut pool: ObjectPool<StatModifierRecord> =
        ObjectPool::new(PoolConfig::default()).unwrap();

    c.bench_function("pool_acquire_release", |b| {
        b.iter(|| {
            let record = pool.acquire();
            pool.release(black_box(record));
        });
    });
}

fn bench_scheduler_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_tick");

    for count in [10usize, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, count| {
            b.iter_with_setup(
                || {
                    let mut scheduler = UpdateScheduler::new(
                        SchedulerConfig::default().without_dirty_check(),
                    )
                    .unwrap();
                    scheduler.register_handler(UpdateKind::StatPanel, Box::new(|_, _| Ok(())));
                    for i in 0..*count {
                        scheduler.request(
                            format!("t{}", i),
                            UpdateKind::StatPanel,
                            UpdatePriority::Normal,
                            json!({}),
                        );
                    }
                    scheduler
                },
                |mut scheduler| black_box(scheduler.run_tick()),
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_cache_hits,
    bench_cache_insert_with_eviction,
    bench_pool_cycle,
    bench_scheduler_tick
);
criterion_main!(benches);
