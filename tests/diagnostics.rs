use ferrous_container::{
    key_of_type, Constructor, Container, ContainerOptions, DiError, DiagnosticType, Key, Lifetime,
    MetricsObserver, Registration, Resolver, Severity, Validity,
};
use std::sync::Arc;

struct RequestContext;

struct Cache {
    context: Arc<RequestContext>,
}

fn cache_constructor() -> Constructor {
    Constructor::of::<Cache>()
        .param::<RequestContext>("context")
        .build(|args| Ok(Cache { context: args.get("context")? }))
}

fn register_scoped_context(container: &Container) {
    container
        .add_factory(Lifetime::Scoped, |_| Ok(RequestContext))
        .unwrap();
}

#[test]
fn test_singleton_capturing_scoped_is_rejected() {
    let container = Container::new();
    register_scoped_context(&container);
    container.add_type(Lifetime::Singleton, cache_constructor()).unwrap();

    let scope = container.begin_scope();
    match scope.get::<Cache>() {
        Err(DiError::LifestyleMismatch {
            consumer_lifestyle,
            dependency_lifestyle,
            dependency,
            ..
        }) => {
            assert_eq!(consumer_lifestyle, "Singleton");
            assert_eq!(dependency_lifestyle, "Scoped");
            assert_eq!(dependency, std::any::type_name::<RequestContext>());
        }
        other => panic!("expected LifestyleMismatch, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_verify_reports_lifestyle_mismatch() {
    let container = Container::new();
    register_scoped_context(&container);
    container.add_type(Lifetime::Singleton, cache_constructor()).unwrap();

    assert!(matches!(container.verify(), Err(DiError::LifestyleMismatch { .. })));

    let producer = container.producer(&key_of_type::<Cache>()).unwrap().unwrap();
    assert!(matches!(producer.validity(), Validity::Invalid(DiError::LifestyleMismatch { .. })));
    assert!(producer.failure().is_some());
    assert!(!producer.is_valid(&container));
}

#[test]
fn test_mismatch_downgraded_to_warning() {
    let container =
        Container::with_options(ContainerOptions::default().with_lifestyle_mismatch(Severity::Warn));
    register_scoped_context(&container);
    container.add_type(Lifetime::Singleton, cache_constructor()).unwrap();

    let scope = container.begin_scope();
    let cache = scope.get_required::<Cache>();
    // the captured scoped instance is the one of the first resolving scope
    assert!(Arc::ptr_eq(&cache.context, &scope.get_required::<RequestContext>()));
}

#[test]
fn test_mismatch_suppressed_on_consumer() {
    let container = Container::new();
    register_scoped_context(&container);
    container
        .register(
            key_of_type::<Cache>(),
            Registration::constructor(cache_constructor())
                .with_lifestyle(Lifetime::Singleton)
                .suppress_diagnostic(DiagnosticType::LifestyleMismatch),
        )
        .unwrap();

    let scope = container.begin_scope();
    assert!(scope.get::<Cache>().is_ok());
}

#[test]
fn test_mismatch_suppressed_on_dependency() {
    let container = Container::new();
    container
        .register(
            key_of_type::<RequestContext>(),
            Registration::factory(|_| Ok(RequestContext))
                .with_lifestyle(Lifetime::Scoped)
                .suppress_diagnostic(DiagnosticType::LifestyleMismatch),
        )
        .unwrap();
    container.add_type(Lifetime::Singleton, cache_constructor()).unwrap();

    let scope = container.begin_scope();
    assert!(scope.get::<Cache>().is_ok());
}

#[test]
fn test_longer_lived_dependencies_are_fine() {
    struct Handler {
        #[allow(dead_code)]
        cache: Arc<Cache>,
    }

    let container = Container::new();
    container.add_factory(Lifetime::Singleton, |_| Ok(RequestContext)).unwrap();
    container.add_type(Lifetime::Scoped, cache_constructor()).unwrap();
    container
        .add_type(
            Lifetime::Transient,
            Constructor::of::<Handler>()
                .param::<Cache>("cache")
                .build(|args| Ok(Handler { cache: args.get("cache")? })),
        )
        .unwrap();

    container.verify().unwrap();
    let scope = container.begin_scope();
    assert!(scope.get::<Handler>().is_ok());
}

#[test]
fn test_verify_succeeds_and_memoizes() {
    let container = Container::new();
    container.add_singleton(RequestContext).unwrap();
    container.add_type(Lifetime::Singleton, cache_constructor()).unwrap();

    container.verify().unwrap();
    let producer = container.producer(&key_of_type::<Cache>()).unwrap().unwrap();
    assert!(matches!(producer.validity(), Validity::Valid));
    // verification compiles but creates nothing
    assert!(producer.is_compiled());
}

#[test]
fn test_metrics_observer_counts_resolutions() {
    let metrics = Arc::new(MetricsObserver::new());

    let container = Container::new();
    container.add_observer(metrics.clone()).unwrap();
    container.add_singleton(RequestContext).unwrap();

    let _ = container.get_required::<RequestContext>();
    let _ = container.get_required::<RequestContext>();
    let _ = container.resolve(&Key::Trait("dyn Missing"));

    assert_eq!(metrics.resolution_count(), 2);
    assert_eq!(metrics.failure_count(), 1);
}

#[test]
fn test_observers_see_top_level_requests_only() {
    let metrics = Arc::new(MetricsObserver::new());

    let container = Container::new();
    container.add_observer(metrics.clone()).unwrap();
    register_scoped_context(&container);
    container.add_type(Lifetime::Scoped, cache_constructor()).unwrap();

    let scope = container.begin_scope();
    let cache = scope.get_required::<Cache>();
    assert!(Arc::ptr_eq(&cache.context, &scope.get_required::<RequestContext>()));

    // the plan-wired RequestContext is not reported on its own
    assert_eq!(metrics.resolution_count(), 2);
}
