mod block_on;
mod config;
mod error;
mod executor;
mod parking;
pub mod time;

pub use block_on::block_on;
pub use config::Config;
pub use error::Error;
pub use executor::{init, spawn, JoinHandle};
pub use time::{sleep, sleep_for, sleep_until, Sleep};
