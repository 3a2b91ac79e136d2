use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing logger
///
/// `RUST_LOG` takes precedence over `log_level`. Leaves an already installed
/// global subscriber in place.
pub fn init_logger(log_level: &str, json_logs: bool) {
    if try_init_logger(log_level, json_logs).is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Initialize tracing logger, failing if one is already installed
pub fn try_init_logger(log_level: &str, json_logs: bool) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        let _ = try_init_logger("debug", false);
        assert!(try_init_logger("debug", true).is_err());
    }
}
