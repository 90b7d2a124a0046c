use ferrous_container::{Constructor, Container, ContainerOptions, DiError, Lifetime, Resolver};
use std::any::type_name;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct ServiceA;
#[derive(Debug)]
struct ServiceB;
#[derive(Debug)]
struct ServiceC;

/// Helper: assert that `result` failed with a cycle carrying `expected_chain`.
fn assert_cycle<T>(result: Result<T, DiError>, expected_chain: &[&'static str]) {
    match result {
        Err(DiError::CyclicDependency { chain }) => {
            assert_eq!(chain, expected_chain, "wrong cycle chain");
        }
        Err(other) => panic!("expected a cyclic dependency, got {}", other),
        Ok(_) => panic!("expected a cyclic dependency, resolution succeeded"),
    }
}

#[test]
fn test_two_factories_referencing_each_other() {
    let container = Container::new();
    container
        .add_factory(Lifetime::Transient, |r| {
            r.get::<ServiceB>()?;
            Ok(ServiceA)
        })
        .unwrap();
    container
        .add_factory(Lifetime::Transient, |r| {
            r.get::<ServiceA>()?;
            Ok(ServiceB)
        })
        .unwrap();

    assert_cycle(
        container.get::<ServiceA>(),
        &[type_name::<ServiceA>(), type_name::<ServiceB>(), type_name::<ServiceA>()],
    );
}

#[test]
fn test_three_step_cycle_through_singletons() {
    let container = Container::new();
    container
        .add_factory(Lifetime::Singleton, |r| {
            r.get::<ServiceB>()?;
            Ok(ServiceA)
        })
        .unwrap();
    container
        .add_factory(Lifetime::Singleton, |r| {
            r.get::<ServiceC>()?;
            Ok(ServiceB)
        })
        .unwrap();
    container
        .add_factory(Lifetime::Singleton, |r| {
            r.get::<ServiceA>()?;
            Ok(ServiceC)
        })
        .unwrap();

    assert_cycle(
        container.get::<ServiceB>(),
        &[
            type_name::<ServiceB>(),
            type_name::<ServiceC>(),
            type_name::<ServiceA>(),
            type_name::<ServiceB>(),
        ],
    );
}

#[test]
fn test_self_dependency() {
    let container = Container::new();
    container
        .add_factory(Lifetime::Scoped, |r| {
            r.get::<ServiceA>()?;
            Ok(ServiceA)
        })
        .unwrap();

    let scope = container.begin_scope();
    assert_cycle(
        scope.get::<ServiceA>(),
        &[type_name::<ServiceA>(), type_name::<ServiceA>()],
    );
}

#[test]
fn test_constructor_cycle() {
    let container = Container::new();
    container
        .add_type(
            Lifetime::Transient,
            Constructor::of::<ServiceA>()
                .param::<ServiceB>("b")
                .build(|_| Ok(ServiceA)),
        )
        .unwrap();
    container
        .add_type(
            Lifetime::Transient,
            Constructor::of::<ServiceB>()
                .param::<ServiceA>("a")
                .build(|_| Ok(ServiceB)),
        )
        .unwrap();

    assert_cycle(
        container.get::<ServiceA>(),
        &[type_name::<ServiceA>(), type_name::<ServiceB>(), type_name::<ServiceA>()],
    );
}

#[test]
fn test_verify_reports_cycle_without_creating_instances() {
    let created = Arc::new(AtomicBool::new(false));
    let created_a = created.clone();
    let created_b = created.clone();

    let container = Container::new();
    container
        .add_type(
            Lifetime::Singleton,
            Constructor::of::<ServiceA>()
                .param::<ServiceB>("b")
                .build(move |_| {
                    created_a.store(true, Ordering::SeqCst);
                    Ok(ServiceA)
                }),
        )
        .unwrap();
    container
        .add_type(
            Lifetime::Singleton,
            Constructor::of::<ServiceB>()
                .param::<ServiceA>("a")
                .build(move |_| {
                    created_b.store(true, Ordering::SeqCst);
                    Ok(ServiceB)
                }),
        )
        .unwrap();

    let err = container.verify().unwrap_err();
    let chain = err.cycle().expect("cycle");
    assert!(chain.contains(&type_name::<ServiceA>()));
    assert!(chain.contains(&type_name::<ServiceB>()));
    assert_eq!(chain.first(), chain.last());
    assert!(!created.load(Ordering::SeqCst));
}

#[test]
fn test_cycle_is_reported_again_on_retry() {
    let container = Container::new();
    container
        .add_factory(Lifetime::Transient, |r| {
            r.get::<ServiceB>()?;
            Ok(ServiceA)
        })
        .unwrap();
    container
        .add_factory(Lifetime::Transient, |r| {
            r.get::<ServiceA>()?;
            Ok(ServiceB)
        })
        .unwrap();

    for _ in 0..3 {
        assert!(container.get::<ServiceA>().unwrap_err().cycle().is_some());
    }
}

#[test]
fn test_guard_reset_after_failure() {
    let fail = Arc::new(AtomicBool::new(true));
    let fail_clone = fail.clone();

    let container = Container::new();
    container
        .add_factory(Lifetime::Transient, move |r| {
            if fail_clone.load(Ordering::SeqCst) {
                r.get::<ServiceA>()?;
            }
            Ok(ServiceA)
        })
        .unwrap();

    assert!(container.get::<ServiceA>().unwrap_err().cycle().is_some());
    fail.store(false, Ordering::SeqCst);
    assert!(container.get::<ServiceA>().is_ok());
}

#[test]
fn test_diamond_is_not_a_cycle() {
    struct Shared;
    struct Left(#[allow(dead_code)] Arc<Shared>);
    struct Right(#[allow(dead_code)] Arc<Shared>);
    struct Top;

    let container = Container::new();
    container.add_factory(Lifetime::Transient, |_| Ok(Shared)).unwrap();
    container
        .add_factory(Lifetime::Transient, |r| Ok(Left(r.get::<Shared>()?)))
        .unwrap();
    container
        .add_factory(Lifetime::Transient, |r| Ok(Right(r.get::<Shared>()?)))
        .unwrap();
    container
        .add_factory(Lifetime::Transient, |r| {
            r.get::<Left>()?;
            r.get::<Right>()?;
            Ok(Top)
        })
        .unwrap();

    assert!(container.get::<Top>().is_ok());
}

struct Level<const N: usize>;

#[test]
fn test_depth_limit_bounds_deep_graphs() {
    let container = Container::with_options(ContainerOptions::default().with_max_resolution_depth(3));
    container
        .add_factory(Lifetime::Transient, |r| {
            r.get::<Level<1>>()?;
            Ok(Level::<0>)
        })
        .unwrap();
    container
        .add_factory(Lifetime::Transient, |r| {
            r.get::<Level<2>>()?;
            Ok(Level::<1>)
        })
        .unwrap();
    container
        .add_factory(Lifetime::Transient, |r| {
            r.get::<Level<3>>()?;
            Ok(Level::<2>)
        })
        .unwrap();
    container
        .add_factory(Lifetime::Transient, |r| {
            r.get::<Level<4>>()?;
            Ok(Level::<3>)
        })
        .unwrap();
    container.add_factory(Lifetime::Transient, |_| Ok(Level::<4>)).unwrap();

    assert!(matches!(container.get::<Level<0>>(), Err(DiError::DepthExceeded(3))));
    // shorter chains still fit
    assert!(container.get::<Level<1>>().is_ok());
}
