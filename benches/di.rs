use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrous_container::*;
use std::sync::Arc;

// ===== Micro Benchmarks =====

fn bench_singleton_hit(c: &mut Criterion) {
    let container = Container::new();
    container.add_singleton(42u64).unwrap();

    // Lock and prime the singleton
    let _ = container.get::<u64>().unwrap();

    c.bench_function("singleton_hit_u64", |b| {
        b.iter(|| {
            let v = container.get::<u64>().unwrap();
            black_box(v);
        })
    });
}

fn bench_singleton_cold(c: &mut Criterion) {
    struct ExpensiveToCreate {
        data: Vec<u64>,
    }

    c.bench_function("singleton_cold_expensive", |b| {
        b.iter_batched(
            || {
                let container = Container::new();
                container
                    .add_factory(Lifetime::Singleton, |_| {
                        Ok(ExpensiveToCreate {
                            data: (0..1000).collect(),
                        })
                    })
                    .unwrap();
                container
            },
            |container| {
                let v = container.get::<ExpensiveToCreate>().unwrap();
                black_box(v.data.len());
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_scoped_vs_transient(c: &mut Criterion) {
    struct Service {
        data: [u8; 64],
    }

    let mut group = c.benchmark_group("scoped_vs_transient");

    let scoped = Container::new();
    scoped
        .add_factory(Lifetime::Scoped, |_| Ok(Service { data: [0; 64] }))
        .unwrap();
    let scope = scoped.begin_scope();
    let _ = scope.get::<Service>().unwrap();

    group.bench_function("scoped_hit", |b| {
        b.iter(|| {
            let v = scope.get::<Service>().unwrap();
            black_box(v.data[0]);
        })
    });

    let transient = Container::new();
    transient
        .add_factory(Lifetime::Transient, |_| Ok(Service { data: [0; 64] }))
        .unwrap();
    let _ = transient.get::<Service>().unwrap();

    group.bench_function("transient", |b| {
        b.iter(|| {
            let v = transient.get::<Service>().unwrap();
            black_box(v.data[0]);
        })
    });

    group.finish();
}

fn bench_scope_lifecycle(c: &mut Criterion) {
    struct RequestId(u64);

    let container = Container::new();
    container
        .add_factory(Lifetime::Scoped, |_| Ok(RequestId(7)))
        .unwrap();
    container.lock();

    c.bench_function("scope_begin_resolve_dispose", |b| {
        b.iter(|| {
            let scope = container.begin_scope();
            black_box(scope.get::<RequestId>().unwrap().0);
            scope.dispose().unwrap();
        })
    });
}

// ===== Construction Plans =====

struct Level0;
struct Level1 {
    _inner: Arc<Level0>,
}
struct Level2 {
    _inner: Arc<Level1>,
}
struct Level3 {
    _inner: Arc<Level2>,
}

fn plan_chain(lifetime: Lifetime) -> Container {
    let container = Container::new();
    container
        .add_type(lifetime, Constructor::of::<Level0>().build(|_| Ok(Level0)))
        .unwrap();
    container
        .add_type(
            lifetime,
            Constructor::of::<Level1>()
                .param::<Level0>("inner")
                .build(|args| Ok(Level1 { _inner: args.get("inner")? })),
        )
        .unwrap();
    container
        .add_type(
            lifetime,
            Constructor::of::<Level2>()
                .param::<Level1>("inner")
                .build(|args| Ok(Level2 { _inner: args.get("inner")? })),
        )
        .unwrap();
    container
        .add_type(
            lifetime,
            Constructor::of::<Level3>()
                .param::<Level2>("inner")
                .build(|args| Ok(Level3 { _inner: args.get("inner")? })),
        )
        .unwrap();
    container
}

fn bench_constructor_plans(c: &mut Criterion) {
    let mut group = c.benchmark_group("constructor_plan");

    for (name, lifetime) in [("singleton", Lifetime::Singleton), ("transient", Lifetime::Transient)] {
        let container = plan_chain(lifetime);
        let _ = container.get::<Level3>().unwrap();

        group.bench_with_input(BenchmarkId::new("depth_4", name), &container, |b, container| {
            b.iter(|| black_box(container.get::<Level3>().unwrap()))
        });
    }

    group.bench_function("first_resolution", |b| {
        b.iter_batched(
            || plan_chain(Lifetime::Transient),
            |container| black_box(container.get::<Level3>().unwrap()),
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

// ===== Collections =====

trait Plugin: Send + Sync {
    fn id(&self) -> usize;
}

struct Numbered(usize);

impl Plugin for Numbered {
    fn id(&self) -> usize {
        self.0
    }
}

fn bench_collections(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection");

    for size in [1usize, 8, 32] {
        let container = Container::new();
        for i in 0..size {
            container
                .add_trait_implementation::<dyn Plugin>(Arc::new(Numbered(i)))
                .unwrap();
        }
        let _ = container.get_all_trait::<dyn Plugin>().unwrap();

        group.bench_with_input(BenchmarkId::new("get_all_trait", size), &container, |b, container| {
            b.iter(|| {
                let plugins = container.get_all_trait::<dyn Plugin>().unwrap();
                black_box(plugins.iter().map(|p| p.id()).sum::<usize>())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_singleton_hit,
    bench_singleton_cold,
    bench_scoped_vs_transient,
    bench_scope_lifecycle,
    bench_constructor_plans,
    bench_collections,
);
criterion_main!(benches);
