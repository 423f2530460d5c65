mod driver;
mod sleep;

pub use sleep::{sleep, sleep_for, sleep_until, Sleep};
