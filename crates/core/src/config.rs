use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_DIR_ENV: &str = "OJOL_CONFIG_DIR";
pub const DB_HOST_ENV: &str = "OJOL_DB_HOST";
pub const DB_PORT_ENV: &str = "OJOL_DB_PORT";
pub const DB_USER_ENV: &str = "OJOL_DB_USER";
pub const DB_NAME_ENV: &str = "OJOL_DB_NAME";
pub const DB_PASSWORD_ENV: &str = "OJOL_DB_PASSWORD";

const APP_DIR_NAME: &str = "ojol-admin";
const CONFIG_FILE_NAME: &str = "config.toml";
const LOG_FILE_NAME: &str = "ojol-admin.log";

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TlsMode {
    #[default]
    Disabled,
    Prefer,
    Require,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PasswordSource {
    #[default]
    EnvVar,
    Keyring,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: String,
    pub tls_mode: TlsMode,
    pub password_source: PasswordSource,
    pub keyring_service: Option<String>,
    pub keyring_account: Option<String>,
    pub tls_ca_cert_path: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            database: "ojol".to_string(),
            tls_mode: TlsMode::Disabled,
            password_source: PasswordSource::EnvVar,
            keyring_service: None,
            keyring_account: None,
            tls_ca_cert_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub export_dir: Option<PathBuf>,
    pub pdf_font: Option<PathBuf>,
    pub log: LogConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config directory is unavailable for this platform")]
    ConfigDirUnavailable,
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value `{value}` in {variable}")]
    InvalidOverride { variable: &'static str, value: String },
}

impl AppConfig {
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path()?;
        let mut config = Self::load_from_path(path)?;
        config.apply_overrides(|name| env::var(name).ok())?;
        Ok(config)
    }

    pub fn load_from_path(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        toml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(DB_HOST_ENV) {
            self.database.host = host;
        }
        if let Some(port) = lookup(DB_PORT_ENV) {
            self.database.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidOverride {
                    variable: DB_PORT_ENV,
                    value: port.clone(),
                })?;
        }
        if let Some(user) = lookup(DB_USER_ENV) {
            self.database.user = user;
        }
        if let Some(database) = lookup(DB_NAME_ENV) {
            self.database.database = database;
        }
        Ok(())
    }

    #[must_use]
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    #[must_use]
    pub fn log_file(&self, config_dir: &Path) -> PathBuf {
        self.log
            .file
            .clone()
            .unwrap_or_else(|| config_dir.join(LOG_FILE_NAME))
    }
}

pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    if let Some(custom) = env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(custom));
    }

    let base_dir = if cfg!(target_os = "windows") {
        env::var_os("APPDATA")
            .map(PathBuf::from)
            .ok_or(ConfigError::ConfigDirUnavailable)?
    } else if let Some(xdg_config_home) = env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config_home)
    } else {
        let home = env::var_os("HOME").ok_or(ConfigError::ConfigDirUnavailable)?;
        PathBuf::from(home).join(".config")
    };

    Ok(base_dir.join(APP_DIR_NAME))
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(default_config_dir()?.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;
    use std::path::{Path, PathBuf};

    use tempfile::TempDir;

    use super::{
        AppConfig, ConfigError, PasswordSource, TlsMode, DB_HOST_ENV, DB_NAME_ENV, DB_PORT_ENV,
    };

    #[test]
    fn missing_config_file_loads_defaults() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");

        let config = AppConfig::load_from_path(temp_dir.path().join("config.toml"))
            .expect("failed to load config");

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.database.host, "127.0.0.1");
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.database.database, "ojol");
        assert_eq!(config.export_dir(), PathBuf::from("."));
        assert_eq!(
            config.log_file(Path::new("/etc/ojol-admin")),
            Path::new("/etc/ojol-admin/ojol-admin.log")
        );
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "export_dir = \"/srv/reports\"\n\
             pdf_font = \"/usr/share/fonts/DejaVuSans.ttf\"\n\
             \n\
             [database]\n\
             host = \"db.internal\"\n\
             tls_mode = \"require\"\n\
             password_source = \"keyring\"\n\
             \n\
             [log]\n\
             level = \"debug\"\n",
        )
        .expect("failed to write config");

        let config = AppConfig::load_from_path(&path).expect("failed to load config");

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.user, "root");
        assert_eq!(config.database.tls_mode, TlsMode::Require);
        assert_eq!(config.database.password_source, PasswordSource::Keyring);
        assert_eq!(config.export_dir(), PathBuf::from("/srv/reports"));
        assert_eq!(
            config.pdf_font.as_deref(),
            Some(Path::new("/usr/share/fonts/DejaVuSans.ttf"))
        );
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn malformed_file_reports_path() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[database\nhost = 1").expect("failed to write config");

        let err = AppConfig::load_from_path(&path).expect_err("parse should fail");
        assert!(matches!(err, ConfigError::Parse { path: reported, .. } if reported == path));
    }

    #[test]
    fn environment_overrides_file_values() {
        let vars = HashMap::from([
            (DB_HOST_ENV, "10.0.0.5".to_string()),
            (DB_PORT_ENV, "3307".to_string()),
            (DB_NAME_ENV, "ojol_test".to_string()),
        ]);
        let mut config = AppConfig::default();

        config
            .apply_overrides(|name| vars.get(name).cloned())
            .expect("overrides apply");

        assert_eq!(config.database.host, "10.0.0.5");
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.database.database, "ojol_test");
        assert_eq!(config.database.user, "root");
    }

    #[test]
    fn invalid_port_override_is_rejected() {
        let mut config = AppConfig::default();

        let err = config
            .apply_overrides(|name| (name == DB_PORT_ENV).then(|| "mysql".to_string()))
            .expect_err("port must be numeric");

        assert!(matches!(
            err,
            ConfigError::InvalidOverride {
                variable: DB_PORT_ENV,
                ..
            }
        ));
    }
}
