//! Parses the node's line-oriented configuration file into a typed
//! [`RawConfig`], independent of the node identity it's later combined with.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Parsed, typed contents of a node's config file.
#[derive(Debug, Clone)]
pub struct RawConfig {
    pub ip: String,
    pub port: u16,
    pub max_connections: usize,
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub health_check_port: u16,
    pub log_file: Option<PathBuf>,
    pub wal_path: PathBuf,
}

const DEFAULT_WAL_PATH: &str = "/var/lib/kvstore/wal.log";

/// Reads and parses the config file at `path`.
///
/// Lines starting with `#`, and blank lines, are skipped. Each remaining
/// line is a `key value` pair split on the first run of whitespace.
/// Unrecognized keys are ignored so the format can grow without breaking
/// older nodes reading a newer file.
pub fn load(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&contents)
}

fn parse(contents: &str) -> Result<RawConfig, ConfigError> {
    let mut ip: Option<String> = None;
    let mut port: Option<u16> = None;
    let mut max_connections: usize = 0;
    let mut username: Option<String> = None;
    let mut password_hash: Option<String> = None;
    let mut health_check_port: u16 = 0;
    let mut log_file: Option<PathBuf> = None;
    let mut wal_path = PathBuf::from(DEFAULT_WAL_PATH);

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = match line.split_once(char::is_whitespace) {
            Some((k, v)) => (k, v.trim()),
            None => continue,
        };

        match key {
            "ip" => ip = Some(value.to_string()),
            "port" => port = Some(parse_u16(key, value)?),
            "max_connections" => max_connections = parse_usize(key, value)?,
            "username" => username = Some(value.to_string()),
            "password" => {
                password_hash = Some(bcrypt::hash(value, bcrypt::DEFAULT_COST)?);
            }
            "health_check_port" => health_check_port = parse_u16(key, value)?,
            "log_file" => log_file = Some(PathBuf::from(value)),
            "wal_path" => wal_path = PathBuf::from(value),
            _ => {
                tracing::debug!(key, "ignoring unrecognized config key");
            }
        }
    }

    Ok(RawConfig {
        ip: ip.ok_or(ConfigError::MissingField("ip"))?,
        port: port.ok_or(ConfigError::MissingField("port"))?,
        max_connections,
        username,
        password_hash,
        health_check_port,
        log_file,
        wal_path,
    })
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_config() {
        let contents = "\
# comment
ip 127.0.0.1
port 9000
max_connections 64
health_check_port 9001
wal_path /tmp/wal.log
";
        let config = parse(contents).unwrap();
        assert_eq!(config.ip, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.max_connections, 64);
        assert_eq!(config.health_check_port, 9001);
        assert_eq!(config.wal_path, PathBuf::from("/tmp/wal.log"));
    }

    #[test]
    fn defaults_wal_path_when_absent() {
        let contents = "ip 127.0.0.1\nport 9000\n";
        let config = parse(contents).unwrap();
        assert_eq!(config.wal_path, PathBuf::from(DEFAULT_WAL_PATH));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let contents = "ip 127.0.0.1\nport 9000\nfrobnicate true\n";
        assert!(parse(contents).is_ok());
    }

    #[test]
    fn malformed_numeric_field_errors() {
        let contents = "ip 127.0.0.1\nport not-a-number\n";
        assert!(matches!(
            parse(contents),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn missing_ip_errors() {
        let contents = "port 9000\n";
        assert!(matches!(
            parse(contents),
            Err(ConfigError::MissingField("ip"))
        ));
    }

    #[test]
    fn password_is_stored_as_a_bcrypt_hash_not_plaintext() {
        let contents = "ip 127.0.0.1\nport 9000\nusername admin\npassword hunter2\n";
        let config = parse(contents).unwrap();
        let hash = config.password_hash.unwrap();
        assert_ne!(hash, "hunter2");
        assert!(bcrypt::verify("hunter2", &hash).unwrap());
    }

    #[test]
    fn missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = load(&dir.path().join("missing.conf"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
