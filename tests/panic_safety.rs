use rustjob::{Context, Scheduler, SchedulerConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[test]
fn test_panic_safety_context_released() {
    let scheduler = Scheduler::new(SchedulerConfig::default().with_worker_threads(1)).unwrap();
    let ctx = Context::new();

    scheduler.execute(&ctx, |_| panic!("Intentional panic for testing"));

    // Wait must not hang on a job that panicked.
    scheduler.wait(&ctx);
    assert!(!ctx.is_busy(), "Context should be idle even after panic");
}

#[test]
fn test_worker_recovery_after_panic() {
    let scheduler = Scheduler::new(SchedulerConfig::default().with_worker_threads(1)).unwrap();
    let ctx = Context::new();

    // 1. Panicking job, polled so that the worker (not this thread) runs it.
    scheduler.execute(&ctx, |_| panic!("Boom"));
    let start = std::time::Instant::now();
    while ctx.is_busy() {
        assert!(start.elapsed() < Duration::from_secs(5), "panicking job never finished");
        std::thread::sleep(Duration::from_millis(1));
    }

    // 2. Normal job to verify the worker is still alive.
    let success = Arc::new(AtomicBool::new(false));
    let success_clone = success.clone();
    scheduler.execute(&ctx, move |_| {
        success_clone.store(true, Ordering::SeqCst);
    });

    let start = std::time::Instant::now();
    while ctx.is_busy() {
        if start.elapsed() > Duration::from_secs(5) {
            panic!("Worker did not process subsequent job!");
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(success.load(Ordering::SeqCst), "Subsequent job failed to run");

    let handle = scheduler.handle();
    scheduler.shutdown().expect("worker should not have died");
    assert_eq!(handle.stats().task_panics, 1);
}

#[test]
fn test_panic_in_group_skips_rest_of_group_only() {
    let scheduler = Scheduler::new(SchedulerConfig::default().with_worker_threads(2)).unwrap();
    let ctx = Context::new();
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_clone = ran.clone();

    // Group 1 covers indices 4..8 and panics at index 5.
    scheduler.dispatch(&ctx, 12, 4, move |args| {
        if args.job_index == 5 {
            panic!("bad index");
        }
        ran_clone.fetch_add(1, Ordering::SeqCst);
    });
    scheduler.wait(&ctx);

    // 4 + 1 + 4: indices 6 and 7 never run.
    assert_eq!(ran.load(Ordering::SeqCst), 9);
    assert!(!ctx.is_busy());
}
