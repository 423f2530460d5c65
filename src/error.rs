use std::io;
use std::num::ParseIntError;

/// Errors returned while configuring or starting the runtime.
///
/// Sleeping itself never fails.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid worker thread count {value:?}")]
    InvalidWorkerThreads {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("worker thread count must be at least 1")]
    ZeroWorkerThreads,

    #[error("runtime is already initialized")]
    AlreadyInitialized,

    #[error("failed to spawn runtime thread")]
    Spawn(#[source] io::Error),
}
