use async_trait::async_trait;
use mysql_async::prelude::{Protocol, Queryable};
use mysql_async::{Conn, OptsBuilder, Params, Pool, QueryResult, Row, SslOpts, Value};
use ojol_core::config::{DatabaseConfig, PasswordSource, TlsMode, DB_PASSWORD_ENV};
use ojol_core::data_access::{DataAccessError, DataBackend, Record, ResultSet, SqlValue};
use tracing::{debug, warn};

const DEFAULT_KEYRING_SERVICE: &str = "ojol-admin";

#[derive(Debug, Clone)]
pub struct MysqlDataBackend {
    pool: Pool,
}

impl MysqlDataBackend {
    // Must be called inside a tokio runtime context.
    #[must_use]
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            pool: Pool::new(opts_from_config(config)),
        }
    }

    pub async fn disconnect(&self) -> Result<(), DataAccessError> {
        self.pool
            .clone()
            .disconnect()
            .await
            .map_err(to_access_error)
    }

    async fn checkout(&self) -> Result<Conn, DataAccessError> {
        self.pool.get_conn().await.map_err(|error| {
            warn!(%error, "could not check out a connection");
            DataAccessError::Connectivity(error.to_string())
        })
    }
}

#[async_trait]
impl DataBackend for MysqlDataBackend {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<ResultSet, DataAccessError> {
        debug!(sql, params = params.len(), "running query");
        let mut conn = self.checkout().await?;
        let result = if params.is_empty() {
            match conn.query_iter(sql).await {
                Ok(result) => collect_result(result).await,
                Err(error) => Err(error),
            }
        } else {
            match conn.exec_iter(sql, to_params(params)).await {
                Ok(result) => collect_result(result).await,
                Err(error) => Err(error),
            }
        };

        let result = result.map_err(|error| statement_failed(sql, error))?;
        debug!(rows = result.records.len(), "query finished");
        Ok(result)
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, DataAccessError> {
        debug!(sql, params = params.len(), "executing statement");
        let mut conn = self.checkout().await?;
        conn.exec_drop(sql, to_params(params))
            .await
            .map_err(|error| statement_failed(sql, error))?;
        let affected = conn.affected_rows();
        debug!(affected, "statement executed");
        Ok(affected)
    }

    async fn ping(&self) -> Result<(), DataAccessError> {
        let mut conn = self.checkout().await?;
        conn.ping()
            .await
            .map_err(|error| DataAccessError::Connectivity(error.to_string()))
    }
}

async fn collect_result<P: Protocol>(
    mut result: QueryResult<'_, 'static, P>,
) -> Result<ResultSet, mysql_async::Error> {
    let columns = result
        .columns_ref()
        .iter()
        .map(|column| column.name_str().into_owned())
        .collect::<Vec<_>>();
    let rows = result.collect::<Row>().await?;
    let records = rows
        .into_iter()
        .map(|row| row_to_record(&columns, row))
        .collect();
    Ok(ResultSet::new(columns, records))
}

fn row_to_record(columns: &[String], row: Row) -> Record {
    let mut record = Record::new();
    for (name, value) in columns.iter().zip(row.unwrap()) {
        record.insert(name.as_str(), from_mysql_value(value));
    }
    record
}

fn to_params(params: &[SqlValue]) -> Params {
    if params.is_empty() {
        return Params::Empty;
    }
    Params::Positional(params.iter().map(to_mysql_value).collect())
}

fn to_mysql_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::Int(value) => Value::Int(*value),
        SqlValue::UInt(value) => Value::UInt(*value),
        SqlValue::Double(value) => Value::Double(*value),
        SqlValue::Text(value) => Value::Bytes(value.clone().into_bytes()),
    }
}

fn from_mysql_value(value: Value) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Bytes(bytes) => SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned()),
        Value::Int(value) => SqlValue::Int(value),
        Value::UInt(value) => SqlValue::UInt(value),
        Value::Float(value) => SqlValue::Double(f64::from(value)),
        Value::Double(value) => SqlValue::Double(value),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let date = format!("{year:04}-{month:02}-{day:02}");
            if (hour, minute, second, micros) == (0, 0, 0, 0) {
                SqlValue::Text(date)
            } else {
                SqlValue::Text(format!("{date} {hour:02}:{minute:02}:{second:02}"))
            }
        }
        Value::Time(is_negative, days, hours, minutes, seconds, _micros) => {
            let sign = if is_negative { "-" } else { "" };
            let hours = days * 24 + u32::from(hours);
            SqlValue::Text(format!("{sign}{hours:02}:{minutes:02}:{seconds:02}"))
        }
    }
}

fn statement_failed(sql: &str, error: mysql_async::Error) -> DataAccessError {
    warn!(sql, %error, "statement failed");
    to_access_error(error)
}

fn to_access_error(error: mysql_async::Error) -> DataAccessError {
    match error {
        mysql_async::Error::Server(_) | mysql_async::Error::Driver(_) => {
            DataAccessError::Statement(error.to_string())
        }
        _ => DataAccessError::Connectivity(error.to_string()),
    }
}

fn opts_from_config(config: &DatabaseConfig) -> OptsBuilder {
    let mut builder = OptsBuilder::default()
        .ip_or_hostname(config.host.clone())
        .tcp_port(config.port)
        .user(Some(config.user.clone()))
        .db_name(Some(config.database.clone()));

    if let Some(password) = resolve_password(config) {
        builder = builder.pass(Some(password));
    }

    if let Some(ssl_opts) = ssl_opts_from_config(config) {
        builder = builder.ssl_opts(ssl_opts);
    }

    if matches!(config.tls_mode, TlsMode::Disabled) {
        builder = builder.prefer_socket(false);
    }

    builder
}

fn resolve_password(config: &DatabaseConfig) -> Option<String> {
    let env_password = std::env::var(DB_PASSWORD_ENV)
        .ok()
        .filter(|pw| !pw.is_empty());

    match config.password_source {
        PasswordSource::EnvVar => env_password,
        PasswordSource::Keyring => {
            if let Some(password) = load_keyring_password(config) {
                return Some(password);
            }

            if let Some(password) = env_password {
                store_keyring_password(config, &password);
                return Some(password);
            }

            warn!("no database password in keyring or environment");
            None
        }
    }
}

fn ssl_opts_from_config(config: &DatabaseConfig) -> Option<SslOpts> {
    if !config_requests_tls(config) {
        return None;
    }

    let mut ssl_opts = SslOpts::default();
    if let Some(ca_cert_path) = &config.tls_ca_cert_path {
        ssl_opts = ssl_opts.with_root_certs(vec![ca_cert_path.clone().into()]);
    }
    Some(ssl_opts)
}

// `prefer` only switches TLS on when a CA certificate is configured.
fn config_requests_tls(config: &DatabaseConfig) -> bool {
    match config.tls_mode {
        TlsMode::Disabled => false,
        TlsMode::Prefer => config.tls_ca_cert_path.is_some(),
        TlsMode::Require => true,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}

fn keyring_account(config: &DatabaseConfig) -> String {
    non_empty(config.keyring_account.as_deref()).map_or_else(
        || format!("{}@{}", config.user, config.host),
        ToString::to_string,
    )
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn load_keyring_password(config: &DatabaseConfig) -> Option<String> {
    let entry = keyring_entry(config)?;
    entry.get_password().ok().filter(|pw| !pw.is_empty())
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn load_keyring_password(_config: &DatabaseConfig) -> Option<String> {
    None
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn store_keyring_password(config: &DatabaseConfig, password: &str) {
    if password.is_empty() {
        return;
    }
    if let Some(entry) = keyring_entry(config) {
        if let Err(error) = entry.set_password(password) {
            warn!(%error, "failed to store database password in keyring");
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn store_keyring_password(_config: &DatabaseConfig, _password: &str) {}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn keyring_entry(config: &DatabaseConfig) -> Option<keyring::Entry> {
    let service =
        non_empty(config.keyring_service.as_deref()).unwrap_or(DEFAULT_KEYRING_SERVICE);
    keyring::Entry::new(service, &keyring_account(config)).ok()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use mysql_async::{Params, Value};
    use ojol_core::config::{DatabaseConfig, TlsMode};
    use ojol_core::data_access::SqlValue;

    use super::{
        config_requests_tls, from_mysql_value, keyring_account, opts_from_config, to_params,
    };

    #[test]
    fn driver_values_map_to_grid_values() {
        assert_eq!(from_mysql_value(Value::NULL), SqlValue::Null);
        assert_eq!(
            from_mysql_value(Value::Bytes(b"15000.00".to_vec())),
            SqlValue::text("15000.00")
        );
        assert_eq!(from_mysql_value(Value::Int(-8)), SqlValue::Int(-8));
        assert_eq!(from_mysql_value(Value::UInt(8)), SqlValue::UInt(8));
        assert_eq!(
            from_mysql_value(Value::Date(2024, 5, 1, 0, 0, 0, 0)),
            SqlValue::text("2024-05-01")
        );
        assert_eq!(
            from_mysql_value(Value::Date(2024, 5, 1, 13, 4, 9, 0)),
            SqlValue::text("2024-05-01 13:04:09")
        );
    }

    #[test]
    fn parameters_bind_positionally() {
        let params = to_params(&[
            SqlValue::text("Andi"),
            SqlValue::Int(7),
            SqlValue::Double(12.5),
            SqlValue::Null,
        ]);

        assert_eq!(
            params,
            Params::Positional(vec![
                Value::Bytes(b"Andi".to_vec()),
                Value::Int(7),
                Value::Double(12.5),
                Value::NULL,
            ])
        );
        assert_eq!(to_params(&[]), Params::Empty);
    }

    #[test]
    fn opts_builder_accepts_defaults() {
        let _opts = opts_from_config(&DatabaseConfig::default());
    }

    #[test]
    fn tls_mode_prefer_requires_a_ca_certificate() {
        let mut config = DatabaseConfig {
            tls_mode: TlsMode::Prefer,
            ..DatabaseConfig::default()
        };
        assert!(!config_requests_tls(&config));

        config.tls_ca_cert_path = Some(PathBuf::from("/tmp/ca.pem"));
        assert!(config_requests_tls(&config));

        config.tls_mode = TlsMode::Disabled;
        assert!(!config_requests_tls(&config));
    }

    #[test]
    fn tls_mode_require_always_uses_tls() {
        let config = DatabaseConfig {
            tls_mode: TlsMode::Require,
            ..DatabaseConfig::default()
        };
        assert!(config_requests_tls(&config));
    }

    #[test]
    fn keyring_account_defaults_to_user_at_host() {
        let mut config = DatabaseConfig::default();
        assert_eq!(keyring_account(&config), "root@127.0.0.1");

        config.keyring_account = Some("  ops  ".to_string());
        assert_eq!(keyring_account(&config), "ops");
    }
}
