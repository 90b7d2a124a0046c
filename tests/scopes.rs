use ferrous_container::{Container, DiError, Lifecycle, Lifetime, Resolver, ThreadLocalScopeLocator};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

struct RequestId(u32);
struct Config;

fn container_with_counter() -> (Container, Arc<AtomicU32>) {
    let counter = Arc::new(AtomicU32::new(0));
    let next = counter.clone();

    let container = Container::new();
    container.add_singleton(Config).unwrap();
    container
        .add_factory(Lifetime::Scoped, move |_| Ok(RequestId(next.fetch_add(1, Ordering::SeqCst))))
        .unwrap();
    (container, counter)
}

#[test]
fn test_scoped_instance_cached_within_scope() {
    let (container, counter) = container_with_counter();
    let scope = container.begin_scope();

    let a = scope.get_required::<RequestId>();
    let b = scope.get_required::<RequestId>();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_sibling_scopes_do_not_share_scoped_instances() {
    let (container, _) = container_with_counter();
    let scope1 = container.begin_scope();
    let scope2 = container.begin_scope();

    let a = scope1.get_required::<RequestId>();
    let b = scope2.get_required::<RequestId>();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_ne!(a.0, b.0);

    // singletons are shared
    assert!(Arc::ptr_eq(
        &scope1.get_required::<Config>(),
        &scope2.get_required::<Config>()
    ));
    assert!(Arc::ptr_eq(
        &scope1.get_required::<Config>(),
        &container.get_required::<Config>()
    ));
}

#[test]
fn test_child_scope_has_its_own_instances() {
    let (container, _) = container_with_counter();
    let parent = container.begin_scope();
    let child = parent.begin_child().unwrap();

    assert_eq!(child.parent().map(|p| p.id()), Some(parent.id()));
    assert!(!Arc::ptr_eq(
        &parent.get_required::<RequestId>(),
        &child.get_required::<RequestId>()
    ));
}

#[test]
fn test_scoped_without_scope_fails() {
    let (container, _) = container_with_counter();
    match container.get::<RequestId>() {
        Err(DiError::NoActiveScope(name)) => assert!(name.contains("RequestId")),
        other => panic!("expected NoActiveScope, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_ambient_scope_from_thread_local_locator() {
    let (container, _) = container_with_counter();
    container.set_scope_locator(ThreadLocalScopeLocator).unwrap();

    let scope = container.begin_scope();
    let explicit = scope.get_required::<RequestId>();
    {
        let _guard = ThreadLocalScopeLocator::enter(scope.clone());
        let ambient = container.get_required::<RequestId>();
        assert!(Arc::ptr_eq(&explicit, &ambient));

        let inner = container.begin_scope();
        let _inner_guard = ThreadLocalScopeLocator::enter(inner.clone());
        assert!(!Arc::ptr_eq(&explicit, &container.get_required::<RequestId>()));
    }
    assert!(matches!(container.get::<RequestId>(), Err(DiError::NoActiveScope(_))));
}

#[test]
fn test_scoped_dependency_resolved_in_calling_scope() {
    struct Handler {
        request: Arc<RequestId>,
    }

    let (container, _) = container_with_counter();
    container
        .add_factory(Lifetime::Transient, |r| {
            Ok(Handler {
                request: r.get::<RequestId>()?,
            })
        })
        .unwrap();

    let scope = container.begin_scope();
    let handler = scope.get_required::<Handler>();
    assert!(Arc::ptr_eq(&handler.request, &scope.get_required::<RequestId>()));
}

#[test]
fn test_scope_lifecycle() {
    let (container, _) = container_with_counter();
    let scope = container.begin_scope();
    assert_eq!(scope.lifecycle(), Lifecycle::Alive);
    assert!(!scope.is_disposed());

    scope.dispose().unwrap();
    assert_eq!(scope.lifecycle(), Lifecycle::Disposed);
    assert!(scope.is_disposed());
}

#[test]
fn test_scope_ids_are_unique() {
    let container = Container::new();
    let a = container.begin_scope();
    let b = container.begin_scope();
    let c = a.begin_child().unwrap();

    assert_ne!(a.id(), b.id());
    assert_ne!(a.id(), c.id());
    assert_ne!(b.id(), c.id());
}

#[test]
fn test_disposing_parent_leaves_child_alive() {
    let (container, _) = container_with_counter();
    let parent = container.begin_scope();
    let child = parent.begin_child().unwrap();

    parent.dispose().unwrap();
    assert!(child.get::<RequestId>().is_ok());
}
