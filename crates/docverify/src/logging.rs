//! Global tracing subscriber setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

use crate::config::{LogFormat, LogSettings};
use crate::error::ConfigError;

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Records emitted through the `log` facade (by dependencies or by this
/// crate's database layer) are forwarded into tracing.
pub fn init(settings: &LogSettings) -> Result<(), ConfigError> {
    let filter = build_filter(&settings.level)?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match settings.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_current_span(true)),
        ),
        LogFormat::Pretty => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().with_target(true)))
        }
    };
    installed.map_err(|e| ConfigError::Logging(e.to_string()))?;

    tracing_log::LogTracer::init().map_err(|e| ConfigError::Logging(e.to_string()))
}

fn build_filter(level: &str) -> Result<EnvFilter, ConfigError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|e| ConfigError::Invalid {
            name: "LOG_LEVEL".into(),
            value: level.to_string(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn test_invalid_level_is_rejected() {
        std::env::remove_var("RUST_LOG");
        let err = build_filter("docverify=notalevel").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    #[serial_test::serial]
    fn test_directive_level_is_accepted() {
        std::env::remove_var("RUST_LOG");
        assert!(build_filter("docverify=debug,tower_http=info").is_ok());
    }
}
