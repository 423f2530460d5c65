use std::cell::RefCell;
use std::future::Future;
use std::pin::pin;
use std::task::{Context, Poll, Waker};

use crate::parking::{self, Parker};

fn parker_and_waker() -> (Parker, Waker) {
    let (parker, unparker) = parking::pair();
    let waker = waker_fn::waker_fn(move || unparker.unpark());
    (parker, waker)
}

/// Runs a future to completion on the current thread.
///
/// The thread is parked while the future is pending and unparked by its waker.
pub fn block_on<T>(future: impl Future<Output = T>) -> T {
    let mut future = pin!(future);

    thread_local! {
        // Cached parker and waker for efficiency.
        static CACHE: RefCell<(Parker, Waker)> = RefCell::new(parker_and_waker());
    }

    let mut run = |parker: &Parker, waker: &Waker| {
        let cx = &mut Context::from_waker(waker);
        loop {
            match future.as_mut().poll(cx) {
                Poll::Ready(output) => return output,
                Poll::Pending => parker.park(),
            }
        }
    };

    CACHE.with(|cache| match cache.try_borrow_mut() {
        Ok(cache) => {
            let (parker, waker) = &*cache;
            run(parker, waker)
        }
        // Nested `block_on`: the cached pair is in use further up the stack.
        Err(_) => {
            let (parker, waker) = parker_and_waker();
            run(&parker, &waker)
        }
    })
}
