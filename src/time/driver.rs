use std::collections::BTreeMap;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::task::Waker;
use std::thread;
use std::time::Instant;

use concurrent_queue::ConcurrentQueue;
use once_cell::sync::Lazy;
use tracing::{debug, trace, warn};

use crate::parking::{self, Parker, Unparker};

const TIMER_OP_CAPACITY: usize = 1000;

type Timers = BTreeMap<(Instant, usize), Waker>;

/// Owns every registered timer and fires them from a dedicated thread.
pub(crate) struct Driver {
    /// Registrations not yet applied to `timers`.
    timer_ops: ConcurrentQueue<TimerOp>,
    timers: Mutex<Timers>,
    /// Wakes the driver thread when an earlier deadline may have been registered.
    unparker: Unparker,
}

/// A single timer operation.
enum TimerOp {
    Insert(Instant, usize, Waker),
    Remove(Instant, usize),
}

impl Driver {
    pub(crate) fn get() -> &'static Driver {
        static DRIVER: Lazy<Driver> = Lazy::new(|| {
            let (parker, unparker) = parking::pair();
            thread::Builder::new()
                .name("nap-timer".to_string())
                .spawn(move || Driver::get().run(parker))
                .unwrap_or_else(|err| panic!("failed to spawn timer driver thread: {}", err));
            debug!("timer driver started");
            Driver::new(unparker)
        });
        &DRIVER
    }

    fn new(unparker: Unparker) -> Driver {
        Driver {
            timer_ops: ConcurrentQueue::bounded(TIMER_OP_CAPACITY),
            timers: Mutex::new(BTreeMap::new()),
            unparker,
        }
    }

    fn run(&self, parker: Parker) {
        let mut wakers = Vec::new();
        loop {
            let next = self.process_timers(&mut wakers, Instant::now());
            if !wakers.is_empty() {
                trace!(fired = wakers.len(), "timers fired");
            }
            wake_all(&mut wakers);
            parker.park_deadline(next);
        }
    }

    /// Registers a one-shot timer and returns its id.
    pub(crate) fn insert_timer(&self, when: Instant, waker: &Waker) -> usize {
        static ID_GENERATOR: AtomicUsize = AtomicUsize::new(1);
        let id = ID_GENERATOR.fetch_add(1, Ordering::Relaxed);

        self.push_op(TimerOp::Insert(when, id, waker.clone()));
        trace!(id, "timer registered");
        self.unparker.unpark();
        id
    }

    /// Removes a timer. Removing one that already fired is a no-op.
    pub(crate) fn remove_timer(&self, when: Instant, id: usize) {
        self.push_op(TimerOp::Remove(when, id));
    }

    fn push_op(&self, op: TimerOp) {
        if let Err(err) = self.timer_ops.push(op) {
            // The queue is full: apply the backlog, then this op, under the lock.
            let mut timers = self.timers.lock().unwrap();
            self.process_timer_ops(&mut timers);
            apply(&mut timers, err.into_inner());
        }
    }

    /// Moves every timer due at `now` into `wakers` and returns the next deadline.
    fn process_timers(&self, wakers: &mut Vec<Waker>, now: Instant) -> Option<Instant> {
        let mut timers = self.timers.lock().unwrap();
        self.process_timer_ops(&mut timers);

        // Split timers into ready and pending timers.
        let pending = timers.split_off(&(now, 0));
        let ready = mem::replace(&mut *timers, pending);
        let next = timers.keys().next().map(|(when, _)| *when);
        drop(timers);

        wakers.extend(ready.into_values());
        next
    }

    /// Applies queued ops and reports whether the timer is still registered.
    #[cfg(test)]
    pub(crate) fn contains_timer(&self, when: Instant, id: usize) -> bool {
        let mut timers = self.timers.lock().unwrap();
        self.process_timer_ops(&mut timers);
        timers.contains_key(&(when, id))
    }

    fn process_timer_ops(&self, timers: &mut MutexGuard<'_, Timers>) {
        // Bounded so a steady stream of registrations cannot starve the caller.
        for _ in 0..TIMER_OP_CAPACITY {
            match self.timer_ops.pop() {
                Ok(op) => apply(timers, op),
                Err(_) => break,
            }
        }
    }
}

/// Wakes every waker, isolating panics so one bad waker cannot stop the driver.
fn wake_all(wakers: &mut Vec<Waker>) {
    for waker in wakers.drain(..) {
        if panic::catch_unwind(AssertUnwindSafe(|| waker.wake())).is_err() {
            warn!("timer waker panicked");
        }
    }
}

fn apply(timers: &mut Timers, op: TimerOp) {
    match op {
        TimerOp::Insert(when, id, waker) => {
            timers.insert((when, id), waker);
        }
        TimerOp::Remove(when, id) => {
            timers.remove(&(when, id));
        }
    }
}
