use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub enum TelemetryError {
    EnvFilter { value: String, source: ParseError },
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::EnvFilter { value, .. } => {
                write!(f, "APP_LOG_LEVEL '{value}' is not a valid tracing filter")
            }
            TelemetryError::Subscriber(err) => write!(f, "telemetry error: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::EnvFilter { source, .. } => Some(source),
            TelemetryError::Subscriber(err) => Some(&**err),
        }
    }
}

/// Install the global fmt subscriber. `RUST_LOG` wins over the configured level.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = resolve_filter(std::env::var("RUST_LOG").ok(), &config.log_level)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

fn resolve_filter(
    override_filter: Option<String>,
    log_level: &str,
) -> Result<EnvFilter, TelemetryError> {
    if let Some(filter) = override_filter.filter(|value| !value.trim().is_empty()) {
        if let Ok(filter) = EnvFilter::try_new(&filter) {
            return Ok(filter);
        }
    }

    EnvFilter::try_new(log_level).map_err(|source| TelemetryError::EnvFilter {
        value: log_level.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_accepts_per_module_directives() {
        let filter = resolve_filter(None, "info,admissions::workflows=debug").expect("filter");
        assert!(filter
            .to_string()
            .to_ascii_lowercase()
            .contains("admissions::workflows=debug"));
    }

    #[test]
    fn rust_log_overrides_configured_level() {
        let filter = resolve_filter(Some("warn".to_string()), "debug").expect("filter");
        assert_eq!(filter.to_string().to_ascii_lowercase(), "warn");
    }

    #[test]
    fn unparseable_override_falls_back_to_configured_level() {
        let filter =
            resolve_filter(Some("admissions=loudest".to_string()), "info").expect("filter");
        assert_eq!(filter.to_string().to_ascii_lowercase(), "info");
    }

    #[test]
    fn rejects_unparseable_configured_level() {
        match resolve_filter(None, "admissions=loudest") {
            Err(TelemetryError::EnvFilter { value, .. }) => assert_eq!(value, "admissions=loudest"),
            other => panic!("expected filter parse error, got {other:?}"),
        }
    }
}
