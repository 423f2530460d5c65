use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use nap::{block_on, init, sleep, spawn, Config};

// Runs in its own test binary so the pool can be started with a single worker.
#[test]
fn panicking_task_does_not_take_down_its_worker() {
    init(Config::default().worker_threads(1).thread_name("nap-panic")).unwrap();

    spawn(async {
        panic!("task failure");
    })
    .detach();

    let awaited = panic::catch_unwind(AssertUnwindSafe(|| {
        block_on(spawn(async {
            sleep(1).await;
            panic!("task failure after sleeping");
        }))
    }));
    assert!(awaited.is_err(), "panic should reach the JoinHandle");

    let start = Instant::now();
    let elapsed = block_on(spawn(async move {
        sleep(10).await;
        start.elapsed()
    }));
    assert!(elapsed >= Duration::from_millis(10));
}
