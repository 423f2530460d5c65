use std::env;

use crate::error::Error;

const WORKER_THREADS_ENV: &str = "NAP_WORKER_THREADS";
const THREAD_NAME_ENV: &str = "NAP_THREAD_NAME";
const DEFAULT_THREAD_NAME: &str = "nap-worker";

/// Settings for the worker pool that runs spawned tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of worker threads.
    pub worker_threads: usize,
    /// Name prefix of worker threads; the worker index is appended.
    pub thread_name: String,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            worker_threads: num_cpus::get().max(1),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl Config {
    /// Reads `NAP_WORKER_THREADS` and `NAP_THREAD_NAME`, defaulting what is unset.
    pub fn from_env() -> Result<Config, Error> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, Error> {
        let mut config = Config::default();

        if let Some(value) = lookup(WORKER_THREADS_ENV) {
            config = config.worker_threads(parse_worker_threads(&value)?);
        }
        if let Some(name) = lookup(THREAD_NAME_ENV).filter(|n| !n.is_empty()) {
            config.thread_name = name;
        }
        Ok(config)
    }

    pub fn worker_threads(mut self, n: usize) -> Config {
        self.worker_threads = n;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Config {
        self.thread_name = name.into();
        self
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.worker_threads == 0 {
            return Err(Error::ZeroWorkerThreads);
        }
        Ok(())
    }
}

fn parse_worker_threads(value: &str) -> Result<usize, Error> {
    let n = value
        .trim()
        .parse::<usize>()
        .map_err(|source| Error::InvalidWorkerThreads {
            value: value.to_string(),
            source,
        })?;
    if n == 0 {
        return Err(Error::ZeroWorkerThreads);
    }
    Ok(n)
}
