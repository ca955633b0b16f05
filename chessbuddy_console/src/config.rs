use std::env;

use thiserror::Error;


pub const DEFAULT_BATCH_LABEL: &str = "manual";
pub const DEFAULT_MAX_POOL_SIZE: u32 = 10;

// Fatal at startup: the process prints one structured line and exits non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing database URI: pass --db or set CHESSBUDDY_DB_URI / DATABASE_URL")]
    MissingDbUri,
    #[error("invalid value for {name}: {value:?}")]
    BadValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub db_uri: String,
    pub max_pool_size: u32,
}

pub fn resolve_db_config(
    cli_db_uri: Option<&str>, cli_max_pool_size: Option<&str>,
) -> Result<DbConfig, ConfigError> {
    let db_uri = cli_db_uri
        .map(str::to_owned)
        .or_else(|| env::var("CHESSBUDDY_DB_URI").ok())
        .or_else(|| env::var("DATABASE_URL").ok())
        .ok_or(ConfigError::MissingDbUri)?;
    let max_pool_size = match cli_max_pool_size {
        None => DEFAULT_MAX_POOL_SIZE,
        Some(value) => value.parse().map_err(|_| ConfigError::BadValue {
            name: "--max-pool-size",
            value: value.to_owned(),
        })?,
    };
    Ok(DbConfig { db_uri, max_pool_size })
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn cli_value_wins() {
        let config = resolve_db_config(Some("postgres://cli"), Some("4")).unwrap();
        assert_eq!(config.db_uri, "postgres://cli");
        assert_eq!(config.max_pool_size, 4);
    }

    #[test]
    fn pool_size_defaults() {
        let config = resolve_db_config(Some("postgres://cli"), None).unwrap();
        assert_eq!(config.max_pool_size, DEFAULT_MAX_POOL_SIZE);
    }

    #[test]
    fn bad_pool_size_is_a_config_error() {
        let err = resolve_db_config(Some("postgres://cli"), Some("lots")).unwrap_err();
        assert_eq!(
            err,
            ConfigError::BadValue { name: "--max-pool-size", value: "lots".to_owned() }
        );
    }
}
