//! Logging setup
//!
//! The crate logs through the `log` facade: `trace!` for traversal detail,
//! `debug!` for tree mutations, `warn!` for rejected operations and `error!`
//! for faults caught during a frame.

pub use log::{debug, info, warn, error, trace};

/// Install `env_logger`, honouring `RUST_LOG`
///
/// Without `RUST_LOG`, this crate logs at `info` and everything else at `warn`.
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn,sprite_scene=info")).init();
}

/// Install a test logger
///
/// Safe to call from every test; only the first call installs the logger.
pub fn init_for_tests() {
    let _ = env_logger::builder().is_test(true).try_init();
}
