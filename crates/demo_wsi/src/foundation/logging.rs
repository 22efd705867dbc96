//! Logging setup for drivers built on this crate

pub use log::{debug, error, info, trace, warn};

/// Initialize logging from `RUST_LOG`, falling back to `default_filter` when unset
///
/// Safe to call more than once; later calls are ignored.
pub fn init_with_default(default_filter: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init();
}
