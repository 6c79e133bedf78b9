//! Stress tests for handles used from several threads at once.

#[cfg(test)]
mod concurrency_tests {
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;
    use std::time::Duration;

    use portable_atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

    use crate::errors::HandleError;
    use crate::guard::GlobalLock;
    use crate::handle::{HandleBuilder, Outcome, ThreadHandle};
    use crate::tests::helpers::{counting, Gate};
    use crate::value::Value;

    #[test]
    fn test_shared_counter_no_lost_updates() {
        let thread_count = 16;
        let counter = Arc::new(Mutex::new(0_i64));

        let handles: Vec<ThreadHandle> = (0..thread_count)
            .map(|i| {
                let counter = counter.clone();
                HandleBuilder::new(Value::function(move |_| {
                    let mut guard = counter.lock().unwrap();
                    *guard += 1;
                    Ok(Value::Int(*guard))
                }))
                .name(format!("counter_{i}"))
                .build()
                .expect("Failed to build handle")
            })
            .collect();

        for handle in &handles {
            handle.start().expect("Failed to start handle");
        }
        for handle in &handles {
            assert!(handle.join().expect("Failed to join handle").is_returned());
        }

        assert_eq!(*counter.lock().unwrap(), thread_count);
        assert!(handles.iter().all(ThreadHandle::completed));
    }

    #[test]
    fn test_global_lock_serializes_targets() {
        let lock = GlobalLock::new();
        let inside = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicU64::new(0));
        let thread_count = 8;

        let handles: Vec<ThreadHandle> = (0..thread_count)
            .map(|_| {
                let inside = inside.clone();
                let overlaps = overlaps.clone();
                HandleBuilder::new(Value::function(move |_| {
                    if inside.swap(true, Ordering::SeqCst) {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(2));
                    inside.store(false, Ordering::SeqCst);
                    Ok(Value::None)
                }))
                .guard(lock.clone())
                .build()
                .unwrap()
            })
            .collect();

        for handle in &handles {
            handle.start().unwrap();
        }
        for handle in &handles {
            handle.join().unwrap();
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(lock.entries(), thread_count);
    }

    #[test]
    fn test_concurrent_joiners_see_same_outcome() {
        let gate = Gate::new();
        let handle = Arc::new(ThreadHandle::new(gate.target(Value::Int(99))).unwrap());
        handle.start().unwrap();
        gate.wait_entered();

        let joiners: Vec<_> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                thread::spawn(move || handle.join().cloned())
            })
            .collect();

        gate.open();
        for joiner in joiners {
            let outcome = joiner.join().expect("joiner panicked");
            assert_eq!(outcome, Ok(Outcome::Returned(Value::Int(99))));
        }
        assert!(handle.completed());
    }

    #[test]
    fn test_racing_starts_admit_exactly_one() {
        let calls = Arc::new(AtomicU64::new(0));
        let handle = Arc::new(ThreadHandle::new(counting(calls.clone())).unwrap());
        let racers = 8;
        let barrier = Arc::new(Barrier::new(racers));
        let won = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..racers)
            .map(|_| {
                let handle = handle.clone();
                let barrier = barrier.clone();
                let won = won.clone();
                thread::spawn(move || {
                    barrier.wait();
                    match handle.start() {
                        Ok(()) => {
                            won.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(err) => assert_eq!(err, HandleError::AlreadyStarted),
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().expect("racer panicked");
        }

        handle.join().unwrap();
        assert_eq!(won.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handles_outlive_creating_scope() {
        let handle = thread::spawn(|| {
            let handle = ThreadHandle::new(Value::function(|_| {
                thread::sleep(Duration::from_millis(5));
                Ok(Value::from("done"))
            }))
            .unwrap();
            handle.start().unwrap();
            handle
        })
        .join()
        .expect("creator panicked");

        assert_eq!(handle.join_value(), Ok(Value::from("done")));
    }
}
