//! Logging bootstrap
//!
//! The library only ever talks to the `log` facade; binaries and tests
//! install `env_logger` through these helpers.

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize logging for tests, tolerating repeated calls
pub fn init_for_tests() {
    let _ = env_logger::builder().is_test(true).try_init();
}
