//! Server configuration: file loading, environment overrides, validation.
//!
//! The effective configuration is produced once at startup by [`load`]:
//!
//! 1. [`load_file`] parses the TOML document (default
//!    `/etc/hpcadmin-server/config.toml`).
//! 2. [`apply_environment`] overwrites fields from `HPCADMIN_SERVER_*`
//!    variables. Bad numeric values are logged and ignored.
//! 3. [`validate`] rejects the first missing required field.
//!
//! The result is never modified afterwards.

use hpcadmin_db::{DbRequest, DbRuntimeSettings};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Location read when no configuration path is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hpcadmin-server/config.toml";

/// Placeholder written to logs in place of secret values.
const REDACTED: &str = "REDACTED";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// OAuth tenant and client credentials.
    pub oauth: OauthConfig,

    /// Database connection settings.
    pub database: DatabaseConfig,
}

/// OAuth client registration against the identity tenant.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OauthConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for OauthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OauthConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// PostgreSQL connection settings.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,

    /// Connect with `sslmode=disable` instead of `prefer`.
    pub disable_ssl: bool,

    /// Pool size. Falls back to [`DbRuntimeSettings::default`].
    pub max_connections: Option<u32>,

    /// Connection acquire timeout in milliseconds.
    pub acquire_timeout_ms: Option<u64>,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("dbname", &self.dbname)
            .field("disable_ssl", &self.disable_ssl)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_ms", &self.acquire_timeout_ms)
            .finish()
    }
}

impl DatabaseConfig {
    /// Connection parameters for [`hpcadmin_db::connect`].
    pub fn to_request(&self) -> DbRequest {
        DbRequest {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            dbname: self.dbname.clone(),
            disable_ssl: self.disable_ssl,
        }
    }

    /// Pool tunables, with defaults for anything not configured.
    pub fn runtime_settings(&self) -> DbRuntimeSettings {
        let defaults = DbRuntimeSettings::default();
        DbRuntimeSettings {
            max_connections: self.max_connections.unwrap_or(defaults.max_connections),
            acquire_timeout_ms: self
                .acquire_timeout_ms
                .unwrap_or(defaults.acquire_timeout_ms),
        }
    }
}

/// Errors that can occur when resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be opened or read.
    #[error("failed to read configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not valid TOML or has incompatible types.
    #[error("failed to parse configuration file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A required field is empty or zero.
    #[error("missing {0}")]
    MissingField(&'static str),
}

/// Loads, overrides, and validates the configuration.
///
/// # Errors
///
/// Returns the first error from [`load_file`] or [`validate`].
pub fn load(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let config = apply_environment(load_file(path)?);
    validate(&config)?;
    Ok(config)
}

/// Reads and parses the configuration file.
///
/// An absent or empty `path` selects [`DEFAULT_CONFIG_PATH`]. A missing file
/// is an error; there is no fallback to built-in defaults.
///
/// # Errors
///
/// Returns `ConfigError::Read` if the file cannot be read and
/// `ConfigError::Parse` if it is not a valid configuration document.
pub fn load_file(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let path = match path {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from(DEFAULT_CONFIG_PATH),
    };

    tracing::debug!(path = %path.display(), "reading config file");
    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    tracing::debug!(path = %path.display(), "parsing config file");
    toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}

/// Which configuration field an environment variable targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Host,
    Port,
    DatabaseHost,
    DatabasePort,
    DatabaseUser,
    DatabasePassword,
    DatabaseName,
    OauthTenantId,
    OauthClientId,
    OauthClientSecret,
}

enum Slot<'a> {
    Text(&'a mut String),
    Number(&'a mut u16),
}

impl Target {
    fn slot(self, config: &mut ServerConfig) -> Slot<'_> {
        match self {
            Target::Host => Slot::Text(&mut config.host),
            Target::Port => Slot::Number(&mut config.port),
            Target::DatabaseHost => Slot::Text(&mut config.database.host),
            Target::DatabasePort => Slot::Number(&mut config.database.port),
            Target::DatabaseUser => Slot::Text(&mut config.database.user),
            Target::DatabasePassword => Slot::Text(&mut config.database.password),
            Target::DatabaseName => Slot::Text(&mut config.database.dbname),
            Target::OauthTenantId => Slot::Text(&mut config.oauth.tenant_id),
            Target::OauthClientId => Slot::Text(&mut config.oauth.client_id),
            Target::OauthClientSecret => Slot::Text(&mut config.oauth.client_secret),
        }
    }

    fn is_secret(self) -> bool {
        matches!(self, Target::DatabasePassword | Target::OauthClientSecret)
    }
}

/// Environment variables that override file values, in application order.
const ENV_OVERRIDES: [(&str, &str, Target); 10] = [
    ("HPCADMIN_SERVER_HOST", "host", Target::Host),
    ("HPCADMIN_SERVER_PORT", "port", Target::Port),
    ("HPCADMIN_SERVER_DATABASE_HOST", "database host", Target::DatabaseHost),
    ("HPCADMIN_SERVER_DATABASE_PORT", "database port", Target::DatabasePort),
    ("HPCADMIN_SERVER_DATABASE_USER", "database user", Target::DatabaseUser),
    ("HPCADMIN_SERVER_DATABASE_PASSWORD", "database password", Target::DatabasePassword),
    ("HPCADMIN_SERVER_DATABASE_DBNAME", "database name", Target::DatabaseName),
    ("HPCADMIN_SERVER_OAUTH_TENANT_ID", "oauth tenant ID", Target::OauthTenantId),
    ("HPCADMIN_SERVER_OAUTH_CLIENT_ID", "oauth client ID", Target::OauthClientId),
    ("HPCADMIN_SERVER_OAUTH_CLIENT_SECRET", "oauth client secret", Target::OauthClientSecret),
];

/// Applies `HPCADMIN_SERVER_*` overrides from the process environment.
pub fn apply_environment(config: ServerConfig) -> ServerConfig {
    apply_overrides(config, |name| std::env::var(name).ok())
}

/// Applies overrides using `lookup` to resolve variable names.
///
/// Set variables always win over file values. A numeric variable that does
/// not parse is reported with a warning and leaves the field unchanged; the
/// remaining variables are still applied. Secret values are never logged.
pub fn apply_overrides<F>(mut config: ServerConfig, lookup: F) -> ServerConfig
where
    F: Fn(&str) -> Option<String>,
{
    for (var, field, target) in ENV_OVERRIDES {
        let Some(raw) = lookup(var) else {
            continue;
        };
        let shown = if target.is_secret() { REDACTED } else { raw.as_str() };

        match target.slot(&mut config) {
            Slot::Text(value) => {
                tracing::debug!(var, field, value = shown, "applying environment override");
                *value = raw;
            }
            Slot::Number(value) => match raw.trim().parse::<u16>() {
                Ok(parsed) => {
                    tracing::debug!(var, field, value = shown, "applying environment override");
                    *value = parsed;
                }
                Err(e) => {
                    tracing::warn!(
                        var,
                        field,
                        value = shown,
                        error = %e,
                        "ignoring invalid port override, keeping configured value"
                    );
                }
            },
        }
    }
    config
}

/// Checks that every required field is set.
///
/// Fields are checked in a fixed order and only the first violation is
/// reported.
///
/// # Errors
///
/// Returns `ConfigError::MissingField` naming the first empty or zero field.
pub fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    let checks: [(bool, &'static str); 10] = [
        (config.host.is_empty(), "host"),
        (config.port == 0, "port"),
        (config.database.host.is_empty(), "database host"),
        (config.database.port == 0, "database port"),
        (config.database.user.is_empty(), "database user"),
        (config.database.password.is_empty(), "database password"),
        (config.database.dbname.is_empty(), "database name"),
        (config.oauth.tenant_id.is_empty(), "oauth tenant ID"),
        (config.oauth.client_id.is_empty(), "oauth client ID"),
        (config.oauth.client_secret.is_empty(), "oauth client secret"),
    ];

    match checks.iter().find(|(missing, _)| *missing) {
        Some(&(_, field)) => Err(ConfigError::MissingField(field)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    const FULL_CONFIG: &str = r#"
host = "0.0.0.0"
port = 3333

[oauth]
tenant_id = "tenant"
client_id = "client"
client_secret = "s3cret"

[database]
host = "db.internal"
port = 5432
user = "hpcadmin"
password = "hunter2"
dbname = "hpcadmin"
"#;

    fn full_config() -> ServerConfig {
        toml::from_str(FULL_CONFIG).expect("fixture parses")
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn full_config_validates() {
        assert!(validate(&full_config()).is_ok());
    }

    #[test]
    fn each_missing_field_is_reported_by_name() {
        type Clear = fn(&mut ServerConfig);
        let cases: [(Clear, &str); 10] = [
            (|c| c.host.clear(), "host"),
            (|c| c.port = 0, "port"),
            (|c| c.database.host.clear(), "database host"),
            (|c| c.database.port = 0, "database port"),
            (|c| c.database.user.clear(), "database user"),
            (|c| c.database.password.clear(), "database password"),
            (|c| c.database.dbname.clear(), "database name"),
            (|c| c.oauth.tenant_id.clear(), "oauth tenant ID"),
            (|c| c.oauth.client_id.clear(), "oauth client ID"),
            (|c| c.oauth.client_secret.clear(), "oauth client secret"),
        ];

        for (clear, field) in cases {
            let mut config = full_config();
            clear(&mut config);
            match validate(&config) {
                Err(ConfigError::MissingField(name)) => assert_eq!(name, field),
                other => panic!("expected missing {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn validation_reports_only_the_first_violation() {
        let err = validate(&ServerConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), "missing host");

        let mut config = full_config();
        config.database.user.clear();
        config.oauth.client_id.clear();
        assert_eq!(validate(&config).unwrap_err().to_string(), "missing database user");
    }

    #[test]
    fn omitted_client_secret_names_only_that_field() {
        let file = write_config(&FULL_CONFIG.replace("client_secret = \"s3cret\"\n", ""));
        let config = load_file(Some(file.path())).unwrap();
        let message = validate(&config).unwrap_err().to_string();
        assert_eq!(message, "missing oauth client secret");
    }

    #[test]
    fn load_file_reads_nested_sections() {
        let file = write_config(FULL_CONFIG);
        let config = load_file(Some(file.path())).unwrap();
        assert_eq!(config, full_config());
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.oauth.tenant_id, "tenant");
        assert!(!config.database.disable_ssl);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file(Some(dir.path().join("absent.toml").as_path())).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }), "got {err:?}");
    }

    #[test]
    fn absent_or_empty_path_reads_the_default_location() {
        // A host that actually has the file installed can't exercise the error.
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            return;
        }
        for path in [None, Some(Path::new(""))] {
            match load_file(path) {
                Err(ConfigError::Read { path, .. }) => {
                    assert_eq!(path, PathBuf::from(DEFAULT_CONFIG_PATH));
                }
                other => panic!("expected read error for {DEFAULT_CONFIG_PATH}, got {other:?}"),
            }
        }
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let file = write_config("host = \"unterminated\n[database");
        let err = load_file(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn incompatible_types_are_a_parse_error() {
        let file = write_config("host = \"h\"\nport = \"not-a-number\"\n");
        let err = load_file(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");

        let file = write_config("port = 70000\n");
        let err = load_file(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn runtime_settings_fall_back_to_defaults() {
        let mut config = full_config();
        assert_eq!(config.database.runtime_settings(), DbRuntimeSettings::default());

        config.database.max_connections = Some(3);
        let settings = config.database.runtime_settings();
        assert_eq!(settings.max_connections, 3);
        assert_eq!(
            settings.acquire_timeout_ms,
            DbRuntimeSettings::default().acquire_timeout_ms
        );
    }

    #[test]
    fn to_request_copies_database_fields() {
        let mut config = full_config();
        config.database.disable_ssl = true;
        let request = config.database.to_request();
        assert_eq!(request.host, "db.internal");
        assert_eq!(request.port, 5432);
        assert_eq!(request.password, "hunter2");
        assert!(request.disable_ssl);
    }

    #[test]
    fn environment_port_overrides_file_port() {
        let config = apply_overrides(
            full_config(),
            env(&[("HPCADMIN_SERVER_DATABASE_PORT", "6000")]),
        );
        assert_eq!(config.database.port, 6000);
    }

    #[test]
    fn every_variable_overrides_its_field() {
        let config = apply_overrides(
            full_config(),
            env(&[
                ("HPCADMIN_SERVER_HOST", "127.0.0.1"),
                ("HPCADMIN_SERVER_PORT", "8080"),
                ("HPCADMIN_SERVER_DATABASE_HOST", "pg"),
                ("HPCADMIN_SERVER_DATABASE_PORT", "6432"),
                ("HPCADMIN_SERVER_DATABASE_USER", "env-user"),
                ("HPCADMIN_SERVER_DATABASE_PASSWORD", "env-pass"),
                ("HPCADMIN_SERVER_DATABASE_DBNAME", "env-db"),
                ("HPCADMIN_SERVER_OAUTH_TENANT_ID", "env-tenant"),
                ("HPCADMIN_SERVER_OAUTH_CLIENT_ID", "env-client"),
                ("HPCADMIN_SERVER_OAUTH_CLIENT_SECRET", "env-secret"),
            ]),
        );

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.database.host, "pg");
        assert_eq!(config.database.port, 6432);
        assert_eq!(config.database.user, "env-user");
        assert_eq!(config.database.password, "env-pass");
        assert_eq!(config.database.dbname, "env-db");
        assert_eq!(config.oauth.tenant_id, "env-tenant");
        assert_eq!(config.oauth.client_id, "env-client");
        assert_eq!(config.oauth.client_secret, "env-secret");
    }

    #[test]
    fn database_user_does_not_leak_into_password() {
        let config = apply_overrides(
            full_config(),
            env(&[("HPCADMIN_SERVER_DATABASE_USER", "env-user")]),
        );
        assert_eq!(config.database.user, "env-user");
        assert_eq!(config.database.password, "hunter2");
    }

    #[test]
    fn invalid_port_keeps_prior_value_and_continues() {
        let config = apply_overrides(
            full_config(),
            env(&[
                ("HPCADMIN_SERVER_PORT", "eighty"),
                ("HPCADMIN_SERVER_DATABASE_PORT", "99999"),
                ("HPCADMIN_SERVER_DATABASE_DBNAME", "after-bad-port"),
            ]),
        );
        assert_eq!(config.port, 3333);
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.dbname, "after-bad-port");
    }

    #[test]
    fn unset_variables_leave_file_values() {
        let config = apply_overrides(full_config(), env(&[]));
        assert_eq!(config, full_config());
    }

    #[test]
    fn environment_can_fill_fields_missing_from_file() {
        let file = write_config("host = \"h\"\nport = 1\n");
        let config = apply_overrides(
            load_file(Some(file.path())).unwrap(),
            env(&[("HPCADMIN_SERVER_DATABASE_HOST", "pg")]),
        );
        assert_eq!(config.database.host, "pg");
        assert_eq!(validate(&config).unwrap_err().to_string(), "missing database port");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!("{:?}", full_config());
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn override_diagnostics_never_contain_secrets() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            apply_overrides(
                full_config(),
                env(&[
                    ("HPCADMIN_SERVER_DATABASE_PASSWORD", "pg-password-value"),
                    ("HPCADMIN_SERVER_OAUTH_CLIENT_SECRET", "oauth-secret-value"),
                    ("HPCADMIN_SERVER_PORT", "bogus"),
                ]),
            );
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("REDACTED"));
        assert!(output.contains("ignoring invalid port override"));
        assert!(!output.contains("pg-password-value"));
        assert!(!output.contains("oauth-secret-value"));
    }
}
