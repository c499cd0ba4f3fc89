//! Tracing subscriber setup for hosts embedding the engine.
//!
//! Library code logs through the `log` facade and opens `tracing` spans; this
//! helper wires both into one subscriber. The filter string comes from the
//! host, the engine reads no environment variables.

use tracing_log::LogTracer;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

use crate::error::{EngineError, Result};

/// Installs the global subscriber.
///
/// `filter` uses `EnvFilter` directive syntax (`info`, `ddmap=debug,warn`).
/// With `json` set, events are written as JSON lines. Fails when a global
/// subscriber or logger is already installed.
pub fn init_logging(filter: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_new(filter)
        .map_err(|e| EngineError::Configuration(format!("invalid log filter '{}': {}", filter, e)))?;

    let json_layer = json.then(|| fmt::layer().json().with_target(true));
    let text_layer = (!json).then(fmt::layer);
    let subscriber = Registry::default()
        .with(filter)
        .with(json_layer)
        .with(text_layer);

    LogTracer::init()
        .map_err(|e| EngineError::Configuration(format!("log bridge already installed: {}", e)))?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| EngineError::Configuration(format!("subscriber already installed: {}", e)))?;

    log::debug!("logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_filter() {
        let err = init_logging("ddmap=notalevel", false).unwrap_err();
        assert!(err.to_string().contains("invalid log filter"));
    }

    #[test]
    fn test_second_init_fails_instead_of_panicking() {
        // Only one global subscriber per process: the second call must error.
        let _ = init_logging("info", false);
        assert!(init_logging("info", true).is_err());
    }
}
