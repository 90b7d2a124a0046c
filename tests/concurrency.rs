/// Concurrent access tests
///
/// These verify that first resolutions racing on many threads publish exactly one
/// singleton / scoped instance, and that locking does not disturb resolution.
use crossbeam_utils::thread;
use ferrous_container::{Constructor, Container, DiError, Lifetime, Resolver};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

const THREADS: usize = 16;

#[derive(Debug)]
struct CounterService {
    id: u32,
}

struct Consumer {
    counter: Arc<CounterService>,
}

#[test]
fn test_concurrent_first_resolution_yields_one_singleton() {
    let created = Arc::new(AtomicU32::new(0));
    let created_clone = created.clone();

    let container = Container::new();
    container
        .add_factory(Lifetime::Singleton, move |_| {
            let id = created_clone.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            Ok(CounterService { id })
        })
        .unwrap();

    let barrier = Barrier::new(THREADS);
    let resolved: Vec<Arc<CounterService>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    container.get_required::<CounterService>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(resolved.iter().all(|s| Arc::ptr_eq(s, &resolved[0])));
    assert_eq!(resolved[0].id, 0);
}

#[test]
fn test_concurrent_first_resolution_through_constructor_plan() {
    let created = Arc::new(AtomicU32::new(0));
    let created_clone = created.clone();

    let container = Container::new();
    container
        .add_factory(Lifetime::Singleton, move |_| {
            Ok(CounterService {
                id: created_clone.fetch_add(1, Ordering::SeqCst),
            })
        })
        .unwrap();
    container
        .add_type(
            Lifetime::Transient,
            Constructor::of::<Consumer>()
                .param::<CounterService>("counter")
                .build(|args| Ok(Consumer { counter: args.get("counter")? })),
        )
        .unwrap();

    let barrier = Barrier::new(THREADS);
    let consumers: Vec<Arc<Consumer>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    container.get_required::<Consumer>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(consumers
        .iter()
        .all(|c| Arc::ptr_eq(&c.counter, &consumers[0].counter)));
}

#[test]
fn test_concurrent_scoped_resolution_in_one_scope() {
    let created = Arc::new(AtomicU32::new(0));
    let created_clone = created.clone();

    let container = Container::new();
    container
        .add_factory(Lifetime::Scoped, move |_| {
            let id = created_clone.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(2));
            Ok(CounterService { id })
        })
        .unwrap();

    let scope = container.begin_scope();
    let barrier = Barrier::new(THREADS);
    let resolved: Vec<Arc<CounterService>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    scope.get_required::<CounterService>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(resolved.iter().all(|s| Arc::ptr_eq(s, &resolved[0])));
}

#[test]
fn test_scope_per_thread_isolation() {
    let container = Container::new();
    container
        .add_factory(Lifetime::Scoped, |_| {
            Ok(CounterService {
                id: std::process::id(),
            })
        })
        .unwrap();

    let per_thread: Vec<Arc<CounterService>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    let scope = container.begin_scope();
                    let a = scope.get_required::<CounterService>();
                    let b = scope.get_required::<CounterService>();
                    assert!(Arc::ptr_eq(&a, &b));
                    scope.dispose().unwrap();
                    a
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    for (i, a) in per_thread.iter().enumerate() {
        for b in &per_thread[i + 1..] {
            assert!(!Arc::ptr_eq(a, b));
        }
    }
}

#[test]
fn test_registration_after_lock_fails_while_resolution_continues() {
    let container = Container::new();
    container.add_singleton(CounterService { id: 7 }).unwrap();
    container.lock();

    let barrier = Barrier::new(THREADS + 1);
    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                barrier.wait();
                for _ in 0..100 {
                    assert_eq!(container.get_required::<CounterService>().id, 7);
                }
            });
        }
        s.spawn(|_| {
            barrier.wait();
            for i in 0..100u32 {
                let err = container.add_singleton(i).unwrap_err();
                assert!(matches!(err, DiError::ContainerLocked { .. }));
            }
        });
    })
    .unwrap();

    assert!(container.get::<u32>().is_err());
}
