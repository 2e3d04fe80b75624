//! Crate-level tests exercising the scheduler through its public surface.

use crate::{Context, Scheduler, SchedulerConfig, StealOrder};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

fn scheduler(workers: usize) -> Scheduler {
    Scheduler::new(SchedulerConfig::default().with_worker_threads(workers))
        .expect("failed to start scheduler")
}

#[test]
fn test_basic_job_execution() {
    let scheduler = scheduler(2);
    let ctx = Context::new();
    let value = Arc::new(AtomicUsize::new(0));
    let value_clone = value.clone();

    scheduler.execute(&ctx, move |_| {
        value_clone.store(42, Ordering::SeqCst);
    });

    scheduler.wait(&ctx);
    assert_eq!(value.load(Ordering::SeqCst), 42);
    scheduler.shutdown().expect("Shutdown failed");
}

#[test]
fn test_parallel_job_execution() {
    let scheduler = scheduler(4);
    let ctx = Context::new();
    let sum = Arc::new(AtomicUsize::new(0));

    let num_jobs = 100;
    for i in 0..num_jobs {
        let sum_clone = sum.clone();
        scheduler.execute(&ctx, move |_| {
            sum_clone.fetch_add(i, Ordering::SeqCst);
        });
    }

    scheduler.wait(&ctx);

    let expected_sum: usize = (0..num_jobs).sum();
    assert_eq!(sum.load(Ordering::SeqCst), expected_sum);
    scheduler.shutdown().expect("Shutdown failed");
}

#[test]
fn test_move_only_task_state() {
    let scheduler = scheduler(2);
    let ctx = Context::new();
    let result = Arc::new(AtomicUsize::new(0));
    let result_clone = result.clone();

    // The Vec is moved into the task and consumed there.
    let owned: Vec<usize> = (1..=10).collect();
    scheduler.execute(&ctx, move |_| {
        let total: usize = owned.into_iter().sum();
        result_clone.store(total, Ordering::SeqCst);
    });

    scheduler.wait(&ctx);
    assert_eq!(result.load(Ordering::SeqCst), 55);
}

#[test]
fn test_context_reusable_across_epochs() {
    let scheduler = scheduler(3);
    let ctx = Context::new();
    let total = Arc::new(AtomicUsize::new(0));

    for round in 1..=5 {
        let total_clone = total.clone();
        scheduler.dispatch(&ctx, 50, 8, move |_| {
            total_clone.fetch_add(1, Ordering::Relaxed);
        });
        scheduler.wait(&ctx);
        assert!(!ctx.is_busy());
        assert_eq!(total.load(Ordering::Relaxed), 50 * round);
    }
}

#[test]
fn test_rotating_steal_order() {
    let scheduler = Scheduler::new(
        SchedulerConfig::default()
            .with_worker_threads(4)
            .with_steal_order(StealOrder::Rotating),
    )
    .unwrap();
    let ctx = Context::new();
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();

    scheduler.dispatch(&ctx, 1000, 10, move |_| {
        count_clone.fetch_add(1, Ordering::Relaxed);
    });
    scheduler.wait(&ctx);
    assert_eq!(count.load(Ordering::Relaxed), 1000);
}

#[test]
fn test_polling_is_busy() {
    let scheduler = scheduler(2);
    let ctx = Context::new();

    scheduler.execute(&ctx, |_| thread::sleep(Duration::from_millis(30)));
    assert!(scheduler.is_busy(&ctx));

    // A caller may poll instead of blocking, e.g. to keep a UI responsive.
    while scheduler.is_busy(&ctx) {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(ctx.pending(), 0);
}
