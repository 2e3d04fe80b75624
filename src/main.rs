use rustjob::global;
use rustjob::{Context, ParallelSliceMut, SchedulerConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = global::initialize_with(SchedulerConfig::default()) {
        eprintln!("Failed to start scheduler: {e}");
        std::process::exit(1);
    }
    println!("rustjob - fork-join job scheduler");
    println!("Initialized with {} worker threads\n", global::thread_count());

    // Example 1: independent startup tasks, waited on once.
    println!("Example 1: Startup tasks");
    let ctx = Context::new();
    for name in ["resources", "input", "renderer", "audio"] {
        global::execute(&ctx, move |_| {
            std::thread::sleep(Duration::from_millis(5));
            println!("  {name} ready");
        });
    }
    global::wait(&ctx);
    println!();

    // Example 2: one dispatch group per batch of entities.
    println!("Example 2: Batched entity update");
    let entities = 100_000u32;
    let visited = Arc::new(AtomicUsize::new(0));
    let visited_clone = visited.clone();
    let start = Instant::now();
    let groups = global::dispatch(&ctx, entities, 512, move |args| {
        std::hint::black_box(args.job_index);
        if args.is_last_job_in_group {
            visited_clone.fetch_add(args.group_index as usize + 1, Ordering::Relaxed);
        }
    });
    global::wait(&ctx);
    println!(
        "  {} entities in {} groups, {:?}\n",
        visited.load(Ordering::Relaxed),
        groups,
        start.elapsed()
    );

    // Example 3: borrowing stack data through scoped dispatch.
    println!("Example 3: Parallel slice update");
    let handle = global::handle();
    let mut heights: Vec<f32> = (0..4096).map(|i| i as f32).collect();
    heights.par_iter_mut(&handle).for_each(|h| *h = (*h * 0.01).sin());
    println!("  heights[100] = {:.3}\n", heights[100]);

    // Example 4: cancellable background work. The scheduler has no
    // cancellation; the task polls a flag the caller owns.
    println!("Example 4: Cancellable background job");
    let background = Context::new();
    let cancel = Arc::new(AtomicBool::new(false));
    let chunks = Arc::new(AtomicU64::new(0));
    {
        let cancel = cancel.clone();
        let chunks = chunks.clone();
        global::execute(&background, move |_| {
            while !cancel.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(1));
                chunks.fetch_add(1, Ordering::Relaxed);
            }
        });
    }
    std::thread::sleep(Duration::from_millis(20));
    println!("  busy: {}", global::is_busy(&background));
    cancel.store(true, Ordering::Relaxed);
    global::wait(&background);
    println!(
        "  cancelled after {} chunks, busy: {}",
        chunks.load(Ordering::Relaxed),
        global::is_busy(&background)
    );

    let stats = global::handle().stats();
    println!(
        "\n{} jobs executed, {:.1}% stolen",
        stats.jobs_executed,
        stats.steal_ratio() * 100.0
    );
}
