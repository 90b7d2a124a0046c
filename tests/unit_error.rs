/// Unit tests for DiError and DiResult types
use ferrous_container::{Container, DiError, DiResult};
use std::error::Error;

#[test]
fn test_error_display_not_found() {
    let error = DiError::NotFound("TestService");
    let display_str = format!("{}", error);
    assert_eq!(display_str, "Service not found: TestService");
    assert!(!display_str.is_empty());
}

#[test]
fn test_error_display_type_mismatch() {
    let error = DiError::TypeMismatch("std::string::String");
    assert_eq!(error.to_string(), "Type mismatch for: std::string::String");
}

#[test]
fn test_error_display_cycle() {
    let error = DiError::CyclicDependency {
        chain: vec!["ServiceA", "ServiceB", "ServiceA"],
    };
    assert_eq!(error.to_string(), "Cyclic dependency: ServiceA -> ServiceB -> ServiceA");
    assert_eq!(error.cycle(), Some(&["ServiceA", "ServiceB", "ServiceA"][..]));
    assert_eq!(DiError::NotFound("A").cycle(), None);
}

#[test]
fn test_error_display_depth_exceeded() {
    assert_eq!(DiError::DepthExceeded(256).to_string(), "Max depth 256 exceeded");
}

#[test]
fn test_error_display_missing_dependency() {
    let error = DiError::MissingDependency {
        consumer: "Repository",
        parameter: "db",
        dependency: "Database",
    };
    assert_eq!(
        error.to_string(),
        "Unresolvable parameter `db` of Repository: no registration for Database"
    );
}

#[test]
fn test_error_display_lifestyle_mismatch() {
    let error = DiError::LifestyleMismatch {
        consumer: "Cache",
        consumer_lifestyle: "Singleton",
        dependency: "RequestContext",
        dependency_lifestyle: "Scoped",
    };
    assert_eq!(
        error.to_string(),
        "Lifestyle mismatch: Cache (Singleton) depends on RequestContext (Scoped)"
    );
}

#[test]
fn test_error_display_scope_errors() {
    assert_eq!(
        DiError::NoActiveScope("RequestId").to_string(),
        "No active scope to resolve scoped service RequestId"
    );
    assert!(DiError::ObjectDisposed { scope: 3 }.to_string().contains("3"));
    assert_eq!(
        DiError::AsyncDisposalRequired("Pool").to_string(),
        "Pool only supports asynchronous disposal, use dispose_async"
    );
    assert_eq!(
        DiError::RecursionLimit { scope: 1, limit: 100 }.to_string(),
        "Disposal of scope 1 exceeded the recursion limit of 100"
    );
}

#[test]
fn test_activation_errors_keep_their_source() {
    let error = DiError::Activation {
        service: "Repository",
        source: Box::new(DiError::message("connection refused")),
    };
    assert_eq!(error.to_string(), "Activation of Repository failed: connection refused");
    assert!(error.is_activation());
    assert_eq!(error.source().unwrap().to_string(), "connection refused");

    let delegate = DiError::DelegateFailed {
        service: "Repository",
        source: Box::new(DiError::NotFound("Database")),
    };
    assert!(delegate.is_activation());
    assert!(!DiError::NotFound("Database").is_activation());
}

#[test]
fn test_user_errors() {
    let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
    let error = DiError::user(io);
    assert_eq!(error.to_string(), "disk full");

    let message = DiError::message("plain message");
    assert_eq!(message.to_string(), "plain message");

    // cloneable so cached verdicts can be handed out repeatedly
    let cloned = message.clone();
    assert_eq!(cloned.to_string(), message.to_string());
}

#[test]
fn test_aggregate_display() {
    let error = DiError::Aggregate(vec![DiError::NotFound("A"), DiError::message("boom")]);
    assert_eq!(error.to_string(), "2 errors occurred: Service not found: A; boom");
}

#[test]
fn test_locked_error_names_site() {
    let container = Container::new();
    container.lock();
    match container.add_singleton(1u8) {
        Err(DiError::ContainerLocked { lock_site, .. }) => {
            assert!(lock_site.file().ends_with("unit_error.rs"));
            assert!(lock_site.to_string().contains("unit_error.rs:"));
        }
        other => panic!("expected ContainerLocked, got {:?}", other),
    }
}

#[test]
fn test_di_result_alias() {
    fn ok_result() -> DiResult<u32> {
        Ok(42)
    }
    fn err_result() -> DiResult<u32> {
        Err(DiError::NotFound("Missing"))
    }

    assert_eq!(ok_result().unwrap(), 42);
    assert!(matches!(err_result(), Err(DiError::NotFound("Missing"))));
}
