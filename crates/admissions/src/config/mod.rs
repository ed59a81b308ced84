use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::workflows::admissions::documents::{
    DocumentRequirements, DEFAULT_MAX_DOCUMENT_BYTES, DEFAULT_REQUIRED_DOCUMENTS,
};
use crate::workflows::admissions::domain::{DocumentType, ProgramId};
use crate::workflows::admissions::notifications::RetryPolicy;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub admissions: AdmissionsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            admissions: AdmissionsConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Admissions policy dials: document requirements, upload limits, notification delivery.
#[derive(Debug, Clone)]
pub struct AdmissionsConfig {
    pub requirements: DocumentRequirements,
    pub max_document_bytes: u64,
    pub notifications: NotificationConfig,
}

impl AdmissionsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let default_required = match env::var("ADMISSIONS_REQUIRED_DOCUMENTS") {
            Ok(raw) => parse_document_list("ADMISSIONS_REQUIRED_DOCUMENTS", &raw)?,
            Err(_) => DEFAULT_REQUIRED_DOCUMENTS.to_vec(),
        };

        let mut requirements = DocumentRequirements::new(default_required);
        if let Ok(raw) = env::var("ADMISSIONS_PROGRAM_DOCUMENTS") {
            for (program, required) in parse_program_documents(&raw)? {
                requirements = requirements.with_program(program, required);
            }
        }

        Ok(Self {
            requirements,
            max_document_bytes: parse_number(
                "ADMISSIONS_MAX_DOCUMENT_BYTES",
                DEFAULT_MAX_DOCUMENT_BYTES,
            )?,
            notifications: NotificationConfig {
                queue_capacity: parse_number("ADMISSIONS_NOTIFY_QUEUE_CAPACITY", 256)?,
                max_attempts: parse_number("ADMISSIONS_NOTIFY_MAX_ATTEMPTS", 5)?,
                backoff_ms: parse_number("ADMISSIONS_NOTIFY_BACKOFF_MS", 200)?,
            },
        })
    }
}

impl Default for AdmissionsConfig {
    fn default() -> Self {
        Self {
            requirements: DocumentRequirements::default(),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            notifications: NotificationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl NotificationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_attempts: 5,
            backoff_ms: 200,
        }
    }
}

fn parse_number<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

/// Parses `type,type`. At least one type is required.
fn parse_document_list(key: &'static str, raw: &str) -> Result<Vec<DocumentType>, ConfigError> {
    let documents = raw
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value.parse::<DocumentType>().map_err(|_| ConfigError::InvalidDocumentType {
                key,
                value: value.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if documents.is_empty() {
        return Err(ConfigError::EmptyDocumentList { key });
    }
    Ok(documents)
}

/// Parses `program=type,type;program=type`.
fn parse_program_documents(raw: &str) -> Result<Vec<(ProgramId, Vec<DocumentType>)>, ConfigError> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (program, list) =
                entry
                    .split_once('=')
                    .ok_or_else(|| ConfigError::InvalidProgramDocuments {
                        entry: entry.to_string(),
                    })?;
            let program = program.trim();
            if program.is_empty() {
                return Err(ConfigError::InvalidProgramDocuments {
                    entry: entry.to_string(),
                });
            }
            let required = parse_document_list("ADMISSIONS_PROGRAM_DOCUMENTS", list)?;
            Ok((ProgramId(program.to_string()), required))
        })
        .collect()
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    InvalidDocumentType { key: &'static str, value: String },
    InvalidProgramDocuments { entry: String },
    EmptyDocumentList { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a non-negative integer")
            }
            ConfigError::InvalidDocumentType { key, value } => {
                write!(f, "{key} contains unknown document type '{value}'")
            }
            ConfigError::InvalidProgramDocuments { entry } => write!(
                f,
                "ADMISSIONS_PROGRAM_DOCUMENTS entry '{entry}' must look like program=type,type"
            ),
            ConfigError::EmptyDocumentList { key } => {
                write!(f, "{key} must name at least one document type")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "ADMISSIONS_REQUIRED_DOCUMENTS",
            "ADMISSIONS_PROGRAM_DOCUMENTS",
            "ADMISSIONS_MAX_DOCUMENT_BYTES",
            "ADMISSIONS_NOTIFY_QUEUE_CAPACITY",
            "ADMISSIONS_NOTIFY_MAX_ATTEMPTS",
            "ADMISSIONS_NOTIFY_BACKOFF_MS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(
            config
                .admissions
                .requirements
                .default_required()
                .iter()
                .copied()
                .collect::<Vec<_>>(),
            DEFAULT_REQUIRED_DOCUMENTS.to_vec()
        );
        assert_eq!(config.admissions.notifications, NotificationConfig::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn program_overrides_replace_default_requirements() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ADMISSIONS_REQUIRED_DOCUMENTS", "passport, transcript");
        env::set_var(
            "ADMISSIONS_PROGRAM_DOCUMENTS",
            "msc-cs=passport,diploma,language_certificate; phd-bio=cv",
        );
        let config = AppConfig::load().expect("config loads");
        reset_env();

        let requirements = &config.admissions.requirements;
        assert_eq!(requirements.default_required().len(), 2);
        let msc = requirements.required_for(&ProgramId("msc-cs".to_string()));
        assert!(msc.contains(&DocumentType::LanguageCertificate));
        assert!(!msc.contains(&DocumentType::Transcript));
        let other = requirements.required_for(&ProgramId("ba-history".to_string()));
        assert_eq!(other, requirements.default_required());
    }

    #[test]
    fn rejects_unknown_document_types() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ADMISSIONS_REQUIRED_DOCUMENTS", "passport,selfie");
        let result = AppConfig::load();
        reset_env();

        match result {
            Err(ConfigError::InvalidDocumentType { value, .. }) => assert_eq!(value, "selfie"),
            other => panic!("expected invalid document type, got {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_required_document_list() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ADMISSIONS_REQUIRED_DOCUMENTS", " , ");
        let result = AppConfig::load();
        env::set_var("ADMISSIONS_REQUIRED_DOCUMENTS", "");
        let blank = AppConfig::load();
        reset_env();

        for outcome in [result, blank] {
            assert!(matches!(
                outcome,
                Err(ConfigError::EmptyDocumentList {
                    key: "ADMISSIONS_REQUIRED_DOCUMENTS"
                })
            ));
        }
    }

    #[test]
    fn rejects_program_entry_without_documents() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ADMISSIONS_PROGRAM_DOCUMENTS", "msc-cs=passport;phd-bio=");
        let result = AppConfig::load();
        reset_env();

        assert!(matches!(
            result,
            Err(ConfigError::EmptyDocumentList {
                key: "ADMISSIONS_PROGRAM_DOCUMENTS"
            })
        ));
    }

    #[test]
    fn rejects_malformed_numbers() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ADMISSIONS_NOTIFY_MAX_ATTEMPTS", "lots");
        let result = AppConfig::load();
        reset_env();

        assert!(matches!(
            result,
            Err(ConfigError::InvalidNumber {
                key: "ADMISSIONS_NOTIFY_MAX_ATTEMPTS"
            })
        ));
    }
}
