/// Property-based tests for scope teardown
///
/// Whatever the number of disposables and whichever of them fail, every one is
/// disposed exactly once, last registered first, and each failure is reported.
use ferrous_container::{Container, DiError, DiResult, Dispose, Lifetime, Resolver};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};

struct Recorded {
    index: usize,
    fail: bool,
    log: Arc<Mutex<Vec<usize>>>,
}

impl Dispose for Recorded {
    fn dispose(&self) -> DiResult<()> {
        self.log.lock().unwrap().push(self.index);
        if self.fail {
            Err(DiError::message(format!("disposable {} failed", self.index)))
        } else {
            Ok(())
        }
    }
}

proptest! {
    #[test]
    fn disposal_is_lifo_and_total(failures in prop::collection::vec(any::<bool>(), 0..24)) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let container = Container::new();
        let scope = container.begin_scope();

        for (index, fail) in failures.iter().enumerate() {
            scope
                .register_disposer(Arc::new(Recorded { index, fail: *fail, log: log.clone() }))
                .unwrap();
        }

        let result = scope.dispose();

        let expected: Vec<usize> = (0..failures.len()).rev().collect();
        prop_assert_eq!(&*log.lock().unwrap(), &expected);

        let failed: Vec<usize> = (0..failures.len()).rev().filter(|i| failures[*i]).collect();
        match (failed.len(), result) {
            (0, Ok(())) => {}
            (1, Err(DiError::Disposal { source, .. })) => {
                prop_assert_eq!(source.to_string(), format!("disposable {} failed", failed[0]));
            }
            (n, Err(DiError::Aggregate(errors))) => {
                prop_assert!(n > 1);
                prop_assert_eq!(errors.len(), n);
                for (error, index) in errors.iter().zip(&failed) {
                    let expected_message = format!("disposable {} failed", index);
                    prop_assert!(error.to_string().contains(&expected_message));
                }
            }
            (n, other) => prop_assert!(false, "{} failures but got {:?}", n, other),
        }

        // a second dispose changes nothing
        prop_assert!(scope.dispose().is_ok());
        prop_assert_eq!(log.lock().unwrap().len(), failures.len());
    }
}

proptest! {
    #[test]
    fn scoped_instances_are_per_scope(scopes in 1usize..8, resolutions in 1usize..8) {
        let container = Container::new();
        container.add_factory(Lifetime::Scoped, |_| Ok(Mutex::new(0u32))).unwrap();

        let mut firsts = Vec::new();
        for _ in 0..scopes {
            let scope = container.begin_scope();
            let first = scope.get_required::<Mutex<u32>>();
            for _ in 1..resolutions {
                prop_assert!(Arc::ptr_eq(&first, &scope.get_required::<Mutex<u32>>()));
            }
            firsts.push(first);
        }

        for (i, a) in firsts.iter().enumerate() {
            for b in &firsts[i + 1..] {
                prop_assert!(!Arc::ptr_eq(a, b));
            }
        }
    }
}
