use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread;

use async_task::Runnable;
use crossbeam_channel::{Receiver, Sender};
use once_cell::sync::OnceCell;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::Error;

/// Queue of scheduled tasks, drained by the worker threads.
static POOL: OnceCell<Pool> = OnceCell::new();

struct Pool {
    sender: Sender<Runnable>,
}

impl Pool {
    fn start(config: &Config) -> Result<Pool, Error> {
        config.validate()?;
        let (sender, receiver) = crossbeam_channel::unbounded::<Runnable>();

        for i in 0..config.worker_threads {
            let receiver = receiver.clone();
            thread::Builder::new()
                .name(format!("{}-{}", config.thread_name, i))
                .spawn(move || worker(receiver))
                .map_err(Error::Spawn)?;
        }
        debug!(
            worker_threads = config.worker_threads,
            thread_name = %config.thread_name,
            "worker pool started"
        );

        Ok(Pool { sender })
    }

    fn get() -> &'static Pool {
        POOL.get_or_init(|| {
            let config = Config::from_env().unwrap_or_else(|err| {
                warn!(error = %err, "ignoring malformed runtime configuration");
                Config::default()
            });
            Pool::start(&config)
                .unwrap_or_else(|err| panic!("failed to start worker pool: {}", err))
        })
    }
}

fn worker(receiver: Receiver<Runnable>) {
    receiver.iter().for_each(|runnable| {
        runnable.run();
    });
}

/// Starts the worker pool with `config`.
///
/// Must be called before the first [`spawn`]; afterwards the pool is fixed and
/// [`Error::AlreadyInitialized`] is returned.
pub fn init(config: Config) -> Result<(), Error> {
    let mut started = false;
    POOL.get_or_try_init(|| {
        started = true;
        Pool::start(&config)
    })?;
    if started {
        Ok(())
    } else {
        Err(Error::AlreadyInitialized)
    }
}

/// Spawns a future on the worker pool.
pub fn spawn<F, T>(future: F) -> JoinHandle<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let sender = &Pool::get().sender;
    let schedule = move |runnable: Runnable| {
        if sender.send(runnable).is_err() {
            // Dropping the returned runnable cancels the task.
            error!("no worker thread left to run a scheduled task");
        }
    };

    // A panicking task resumes its panic in the `JoinHandle` instead of unwinding the worker.
    let (runnable, task) = async_task::Builder::new()
        .propagate_panic(true)
        .spawn(move |_: &()| future, schedule);
    runnable.schedule();

    JoinHandle(task)
}

/// Awaits the output of a spawned future.
///
/// Dropping the handle cancels the task unless it was detached. If the task
/// panicked, awaiting the handle resumes that panic.
#[must_use = "dropping a JoinHandle cancels the task"]
#[derive(Debug)]
pub struct JoinHandle<T>(async_task::Task<T>);

impl<T> JoinHandle<T> {
    /// Lets the task run to completion in the background.
    pub fn detach(self) {
        self.0.detach();
    }

    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_on;

    #[test]
    fn spawn_returns_output() {
        let v = block_on(async {
            let handle = spawn(async { 1 + 2 });
            handle.await
        });
        assert_eq!(v, 3);
    }

    #[test]
    fn init_after_start_is_rejected() {
        let _ = block_on(spawn(async {}));
        assert!(matches!(
            init(Config::default()),
            Err(Error::AlreadyInitialized)
        ));
    }

    #[test]
    fn init_validates_before_anything_else() {
        assert!(matches!(
            Pool::start(&Config::default().worker_threads(0)),
            Err(Error::ZeroWorkerThreads)
        ));
    }
}
