use parking_lot::Mutex;
use rand::Rng;
use rustjob::{Context, JobArgs, Scheduler, SchedulerConfig, dispatch_group_count};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

fn scheduler(workers: usize) -> Scheduler {
    Scheduler::new(SchedulerConfig::default().with_worker_threads(workers))
        .expect("failed to start scheduler")
}

#[test]
fn test_dispatch_six_by_two() {
    let scheduler = scheduler(4);
    let ctx = Context::new();
    let calls = Arc::new(Mutex::new(Vec::<JobArgs>::new()));
    let calls_clone = calls.clone();

    let groups = scheduler.dispatch(&ctx, 6, 2, move |args| {
        calls_clone.lock().push(args);
    });
    scheduler.wait(&ctx);
    assert_eq!(groups, 3);

    let mut calls = calls.lock().clone();
    calls.sort_by_key(|a| a.job_index);
    assert_eq!(calls.len(), 6);
    assert_eq!(
        calls.iter().map(|a| a.job_index).collect::<Vec<_>>(),
        vec![0, 1, 2, 3, 4, 5]
    );

    for args in &calls {
        let first = matches!(args.job_index, 0 | 2 | 4);
        assert_eq!(args.is_first_job_in_group, first, "{args:?}");
        assert_eq!(args.is_last_job_in_group, !first, "{args:?}");
        assert_eq!(args.group_id, args.job_index / 2);
        assert_eq!(args.group_index, args.job_index % 2);
    }
}

#[test]
fn test_groups_partition_index_space() {
    let scheduler = scheduler(3);
    let mut rng = rand::thread_rng();

    for _ in 0..50 {
        let job_count = rng.gen_range(1..2000u32);
        let group_size = rng.gen_range(1..300u32);
        let ctx = Context::new();
        let hits: Arc<Vec<AtomicUsize>> =
            Arc::new((0..job_count).map(|_| AtomicUsize::new(0)).collect());
        let hits_clone = hits.clone();

        let groups = scheduler.dispatch(&ctx, job_count, group_size, move |args| {
            hits_clone[args.job_index as usize].fetch_add(1, Ordering::Relaxed);
        });
        scheduler.wait(&ctx);

        assert_eq!(groups, job_count.div_ceil(group_size));
        assert_eq!(groups, dispatch_group_count(job_count, group_size));
        assert!(
            hits.iter().all(|h| h.load(Ordering::Relaxed) == 1),
            "job_count={job_count} group_size={group_size}"
        );
    }
}

#[test]
fn test_group_runs_in_order_on_one_thread() {
    let scheduler = scheduler(4);
    let ctx = Context::new();
    let log = Arc::new(Mutex::new(Vec::<(u32, u32, ThreadId)>::new()));
    let log_clone = log.clone();

    scheduler.dispatch(&ctx, 1000, 16, move |args| {
        log_clone
            .lock()
            .push((args.group_id, args.group_index, thread::current().id()));
    });
    scheduler.wait(&ctx);

    let log = log.lock();
    let mut per_group: HashMap<u32, Vec<(u32, ThreadId)>> = HashMap::new();
    for &(group, index, tid) in log.iter() {
        per_group.entry(group).or_default().push((index, tid));
    }

    assert_eq!(per_group.len(), 63);
    for (group, entries) in per_group {
        let tid = entries[0].1;
        assert!(entries.iter().all(|(_, t)| *t == tid), "group {group} split across threads");
        let indices: Vec<u32> = entries.iter().map(|(i, _)| *i).collect();
        let expected: Vec<u32> = (0..indices.len() as u32).collect();
        assert_eq!(indices, expected, "group {group} out of order");
    }
}

#[test]
fn test_degenerate_dispatch_is_noop() {
    let scheduler = scheduler(2);
    let ctx = Context::new();

    assert_eq!(scheduler.dispatch(&ctx, 0, 8, |_| panic!("never runs")), 0);
    assert_eq!(scheduler.dispatch(&ctx, 8, 0, |_| panic!("never runs")), 0);
    assert!(!scheduler.is_busy(&ctx));
    scheduler.wait(&ctx);
}

#[test]
fn test_group_larger_than_job_count() {
    let scheduler = scheduler(2);
    let ctx = Context::new();
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();

    let groups = scheduler.dispatch(&ctx, 5, 100, move |args| {
        assert_eq!(args.group_id, 0);
        count_clone.fetch_add(1, Ordering::Relaxed);
    });
    scheduler.wait(&ctx);

    assert_eq!(groups, 1);
    assert_eq!(count.load(Ordering::Relaxed), 5);
}
