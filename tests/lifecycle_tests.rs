//! Tests for shared-resource retain/release lifecycle

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    };
    use std::thread;

    use unref::{
        CountingAllocator, FnPolicy, PageAllocator, PageHandle, PageRelease, Ref, SharedResource,
    };

    fn init_test_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn counting_policy(hits: &Arc<AtomicUsize>) -> FnPolicy<impl Fn(u64) + Send + Sync> {
        let hits = Arc::clone(hits);
        FnPolicy::new(move |_payload: u64| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_policy_runs_exactly_once_across_threads() {
        init_test_logging();
        const THREADS: usize = 12;

        for _ in 0..50 {
            let hits = Arc::new(AtomicUsize::new(0));
            let resource =
                SharedResource::with_initial_refs(1u64, THREADS as u32, counting_policy(&hits));
            let barrier = Arc::new(Barrier::new(THREADS));

            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let resource = Arc::clone(&resource);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        resource.release_slow().unwrap();
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(hits.load(Ordering::SeqCst), 1);
            assert!(resource.is_released());
        }
    }

    #[test]
    fn test_balanced_retains_and_releases() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 500;

        let hits = Arc::new(AtomicUsize::new(0));
        let resource = SharedResource::new(1u64, counting_policy(&hits));
        let barrier = Arc::new(Barrier::new(THREADS));

        // Each thread repeatedly takes and drops an extra reference while
        // the constructor's reference pins the payload alive.
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let resource = Arc::clone(&resource);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..ROUNDS {
                        resource.retain_raw();
                        assert!(!resource.release_slow().unwrap());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(resource.ref_count(), 1);

        assert!(resource.release().unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_raii_handles_across_threads() {
        let hits = Arc::new(AtomicUsize::new(0));
        let resource = SharedResource::new(1u64, counting_policy(&hits));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let reference = Ref::retain(&resource);
                thread::spawn(move || {
                    assert_eq!(reference.payload(), Some(1));
                    // Dropped at end of scope.
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(resource.ref_count(), 1);
        assert!(resource.release().unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_page_release_reclaims_through_allocator() {
        let allocator = Arc::new(CountingAllocator::new());
        let policy = PageRelease::new(Arc::clone(&allocator) as Arc<dyn PageAllocator>, 2);
        let resource = SharedResource::new(PageHandle(0x1000), policy);

        resource.retain_raw();
        assert!(!resource.release().unwrap());
        assert_eq!(allocator.free_count(), 0);

        assert!(resource.release().unwrap());
        assert_eq!(allocator.calls(), vec![(PageHandle(0x1000), 2)]);
    }

    #[test]
    fn test_release_after_free_is_integrity_violation() {
        init_test_logging();
        let hits = Arc::new(AtomicUsize::new(0));
        let resource = SharedResource::new(1u64, counting_policy(&hits));

        assert!(resource.release().unwrap());
        let err = resource.release_slow().unwrap_err();
        assert!(err.is_integrity_violation());
        // The payload was reclaimed exactly once.
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
