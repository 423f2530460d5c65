use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use super::driver::Driver;

/// Roughly 30 years, used when a deadline would overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Suspends the current task for `millis` milliseconds.
///
/// The task never resumes before the duration has elapsed, but may resume later
/// depending on scheduler load. `sleep(0)` yields once and resumes on the next poll.
///
/// ```no_run
/// nap::block_on(async {
///     nap::sleep(100).await;
/// });
/// ```
pub fn sleep(millis: u64) -> Sleep {
    sleep_for(Duration::from_millis(millis))
}

/// Like [`sleep`], taking a [`Duration`].
pub fn sleep_for(duration: Duration) -> Sleep {
    let now = Instant::now();
    let deadline = now
        .checked_add(duration)
        .unwrap_or_else(|| now + FAR_FUTURE);
    sleep_until(deadline)
}

/// Suspends the current task until `deadline`.
pub fn sleep_until(deadline: Instant) -> Sleep {
    Sleep {
        deadline,
        state: State::Idle,
    }
}

/// Future returned by [`sleep`], [`sleep_for`] and [`sleep_until`].
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Sleep {
    deadline: Instant,
    state: State,
}

#[derive(Debug)]
enum State {
    /// Not polled yet.
    Idle,
    /// A timer is registered with the driver.
    Waiting { id: usize, waker: Waker },
    /// The deadline has passed; every poll from now on is ready.
    Fired,
}

impl Sleep {
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_elapsed(&self) -> bool {
        self.deadline <= Instant::now()
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let deadline = this.deadline;
        let elapsed = deadline <= Instant::now();

        match &this.state {
            State::Fired => Poll::Ready(()),
            State::Idle if elapsed => {
                // Always suspend once so a zero delay still yields to the scheduler.
                this.state = State::Fired;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            State::Idle => {
                let id = Driver::get().insert_timer(deadline, cx.waker());
                this.state = State::Waiting {
                    id,
                    waker: cx.waker().clone(),
                };
                Poll::Pending
            }
            State::Waiting { id, .. } if elapsed => {
                Driver::get().remove_timer(deadline, *id);
                this.state = State::Fired;
                Poll::Ready(())
            }
            State::Waiting { id, waker } => {
                if !waker.will_wake(cx.waker()) {
                    let driver = Driver::get();
                    driver.remove_timer(deadline, *id);
                    let id = driver.insert_timer(deadline, cx.waker());
                    this.state = State::Waiting {
                        id,
                        waker: cx.waker().clone(),
                    };
                }
                Poll::Pending
            }
        }
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let State::Waiting { id, .. } = self.state {
            Driver::get().remove_timer(self.deadline, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::block_on;

    fn counting_waker() -> (Waker, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let waker = waker_fn::waker_fn(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (waker, count)
    }

    #[test]
    fn zero_delay_yields_once() {
        let (waker, count) = counting_waker();
        let cx = &mut Context::from_waker(&waker);
        let mut sleep = sleep(0);

        assert!(Pin::new(&mut sleep).poll(cx).is_pending());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(Pin::new(&mut sleep).poll(cx).is_ready());
        // Completion is sticky.
        assert!(Pin::new(&mut sleep).poll(cx).is_ready());
    }

    #[test]
    fn pending_until_deadline() {
        let (waker, _) = counting_waker();
        let cx = &mut Context::from_waker(&waker);
        let mut sleep = sleep(60_000);

        assert!(Pin::new(&mut sleep).poll(cx).is_pending());
        assert!(Pin::new(&mut sleep).poll(cx).is_pending());
        assert!(!sleep.is_elapsed());
        assert!(matches!(sleep.state, State::Waiting { .. }));
    }

    fn registration(sleep: &Sleep) -> usize {
        match sleep.state {
            State::Waiting { id, .. } => id,
            _ => panic!("sleep is not registered: {:?}", sleep.state),
        }
    }

    #[test]
    fn new_waker_replaces_registration() {
        let (first, first_count) = counting_waker();
        let (second, second_count) = counting_waker();
        let mut sleep = sleep(30);

        assert!(Pin::new(&mut sleep)
            .poll(&mut Context::from_waker(&first))
            .is_pending());
        let first_id = registration(&sleep);

        assert!(Pin::new(&mut sleep)
            .poll(&mut Context::from_waker(&second))
            .is_pending());
        let second_id = registration(&sleep);
        assert_ne!(first_id, second_id);

        let driver = Driver::get();
        assert!(!driver.contains_timer(sleep.deadline(), first_id));

        thread::sleep(Duration::from_millis(200));
        assert_eq!(first_count.load(Ordering::SeqCst), 0);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
        assert!(Pin::new(&mut sleep)
            .poll(&mut Context::from_waker(&second))
            .is_ready());
    }

    #[test]
    fn drop_removes_registration() {
        let (waker, count) = counting_waker();
        let mut sleep = sleep(60_000);
        assert!(Pin::new(&mut sleep)
            .poll(&mut Context::from_waker(&waker))
            .is_pending());

        let deadline = sleep.deadline();
        let id = registration(&sleep);
        let driver = Driver::get();
        assert!(driver.contains_timer(deadline, id));

        drop(sleep);
        assert!(!driver.contains_timer(deadline, id));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn deadline_is_fixed_at_creation() {
        let before = Instant::now();
        let sleep = sleep(50);
        let after = Instant::now();
        assert!(sleep.deadline() >= before + Duration::from_millis(50));
        assert!(sleep.deadline() <= after + Duration::from_millis(50));
    }

    #[test]
    fn past_deadline_behaves_like_zero() {
        let start = Instant::now();
        block_on(sleep_until(start - Duration::from_millis(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn overflowing_duration_is_clamped() {
        let sleep = sleep_for(Duration::MAX);
        assert!(sleep.deadline() > Instant::now() + Duration::from_secs(86400));
    }

    #[test]
    fn fires_through_driver() {
        let start = Instant::now();
        block_on(sleep(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
