use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

const EMPTY: usize = 0;
const PARKED: usize = 1;
const NOTIFIED: usize = 2;

/// Creates a parker and an unparker sharing one notification slot.
pub(crate) fn pair() -> (Parker, Unparker) {
    let parker = Parker::new();
    let unparker = parker.unparker();
    (parker, unparker)
}

/// Blocks the current thread until notified or until a deadline passes.
pub(crate) struct Parker {
    inner: Arc<Inner>,
}

/// Wakes up a thread blocked on the matching [`Parker`].
#[derive(Clone)]
pub(crate) struct Unparker {
    inner: Arc<Inner>,
}

struct Inner {
    state: AtomicUsize,
    lock: Mutex<()>,
    cvar: Condvar,
}

impl Parker {
    pub(crate) fn new() -> Parker {
        Parker {
            inner: Arc::new(Inner {
                state: AtomicUsize::new(EMPTY),
                lock: Mutex::new(()),
                cvar: Condvar::new(),
            }),
        }
    }

    pub(crate) fn park(&self) {
        self.inner.park(None);
    }

    /// Parks until notified or `deadline` is reached. `None` parks indefinitely.
    ///
    /// Returns `true` if a notification was consumed.
    pub(crate) fn park_deadline(&self, deadline: Option<Instant>) -> bool {
        self.inner.park(deadline)
    }

    pub(crate) fn unparker(&self) -> Unparker {
        Unparker {
            inner: self.inner.clone(),
        }
    }
}

impl Unparker {
    pub(crate) fn unpark(&self) {
        self.inner.unpark()
    }
}

impl Inner {
    fn park(&self, deadline: Option<Instant>) -> bool {
        // Fast path: a notification is already pending.
        if self
            .state
            .compare_exchange(NOTIFIED, EMPTY, SeqCst, SeqCst)
            .is_ok()
        {
            return true;
        }

        if let Some(deadline) = deadline {
            if deadline <= Instant::now() {
                return false;
            }
        }

        let mut guard = self.lock.lock().unwrap();

        match self.state.compare_exchange(EMPTY, PARKED, SeqCst, SeqCst) {
            Ok(_) => {}
            Err(NOTIFIED) => {
                self.state.store(EMPTY, SeqCst);
                return true;
            }
            Err(n) => panic!("inconsistent park state: {}", n),
        }

        loop {
            guard = match deadline {
                None => self.cvar.wait(guard).unwrap(),
                Some(deadline) => {
                    let now = Instant::now();
                    if deadline <= now {
                        // Either consume a late notification or stop being parked.
                        return self.state.swap(EMPTY, SeqCst) == NOTIFIED;
                    }
                    self.cvar.wait_timeout(guard, deadline - now).unwrap().0
                }
            };

            if self
                .state
                .compare_exchange(NOTIFIED, EMPTY, SeqCst, SeqCst)
                .is_ok()
            {
                return true;
            }
            // Spurious wakeup or timeout; the deadline check above decides.
        }
    }

    fn unpark(&self) {
        // Always write NOTIFIED so the parked side synchronizes with our prior writes.
        match self.state.swap(NOTIFIED, SeqCst) {
            EMPTY | NOTIFIED => return,
            PARKED => {}
            n => panic!("inconsistent unpark state: {}", n),
        }

        // The parked thread holds `lock` between setting PARKED and waiting on `cvar`.
        drop(self.lock.lock().unwrap());
        self.cvar.notify_one();
    }
}
