//! Logging setup
//!
//! The crate logs through the `log` facade only. Level transitions are
//! `info!`, cache inserts and recomputes are `debug!`/`trace!`, capacity
//! truncation and inconsistent source data are `warn!`.

pub use log::{debug, error, info, trace, warn, LevelFilter};

/// Install `env_logger`, using `default_level` unless `RUST_LOG` is set
///
/// Returns `false` if a logger was already installed: the host may load the
/// driver more than once per process.
pub fn init_with_level(default_level: LevelFilter) -> bool {
    let env = env_logger::Env::default().default_filter_or(default_level.to_string());
    env_logger::Builder::from_env(env).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_tolerated() {
        init_with_level(LevelFilter::Warn);
        assert!(!init_with_level(LevelFilter::Debug));
    }
}
