use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use toml::Value;

use crate::logging::LogLevel;
use crate::task::TaskConfig;
use crate::wire::types::Version;

pub const DEFAULT_CONFIG_FILE: &str = "acsgate.toml";

const BUILTIN_DEFAULTS: &str = r#"
[logging]
level = "info"
human_friendly = false

[server]
host = "0.0.0.0"
port = 50004
max_frame_bytes = 65536

[protocol]
min_client_version = 0

[queues]
max_queues = 16
task_slots = 256

[tasks]
busy_retry_secs = 15
lh_timeout_secs = 300
max_retries = 3

[ticker]
interval_ms = 250
"#;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub protocol: ProtocolConfig,
    pub queues: QueuesConfig,
    pub tasks: TasksConfig,
    pub ticker: TickerConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub human_friendly: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_frame_bytes: usize,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Oldest packet version accepted from clients.
    pub min_client_version: u16,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct QueuesConfig {
    pub max_queues: usize,
    pub task_slots: usize,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct TasksConfig {
    pub busy_retry_secs: u64,
    pub lh_timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct TickerConfig {
    pub interval_ms: u64,
}

/// Where the effective configuration came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    BuiltinDefaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::BuiltinDefaults => write!(f, "built-in defaults"),
        }
    }
}

impl AppConfig {
    /// Reads `--config <path>` when given, otherwise `./acsgate.toml` when
    /// present, otherwise the built-in defaults. Remaining arguments are
    /// `--section.key value` overrides.
    pub fn load_with_discovery(
        args: impl IntoIterator<Item = String>,
    ) -> Result<(Self, ConfigSource), ConfigError> {
        let (explicit, overrides) = split_config_arg(args)?;
        let path = explicit.or_else(|| {
            let local = PathBuf::from(DEFAULT_CONFIG_FILE);
            local.is_file().then_some(local)
        });
        match path {
            Some(path) => {
                let config = Self::load_from_toml_with_args(&path, overrides)?;
                Ok((config, ConfigSource::File(path)))
            }
            None => {
                let config = Self::from_toml_str_with_args("", overrides)?;
                Ok((config, ConfigSource::BuiltinDefaults))
            }
        }
    }

    pub fn load_from_toml_with_args(
        path: impl AsRef<Path>,
        args: impl IntoIterator<Item = String>,
    ) -> Result<Self, ConfigError> {
        let display = path.as_ref().to_string_lossy().to_string();
        let toml_content = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_toml_str_with_args(&toml_content, args).map_err(|err| match err {
            ConfigError::TomlParse { source, .. } => ConfigError::TomlParse {
                path: display,
                source,
            },
            other => other,
        })
    }

    /// Layers `content` over the built-in defaults, then applies overrides.
    pub fn from_toml_str_with_args(
        content: &str,
        args: impl IntoIterator<Item = String>,
    ) -> Result<Self, ConfigError> {
        let mut root_value: Value =
            BUILTIN_DEFAULTS
                .parse()
                .map_err(|source| ConfigError::TomlParse {
                    path: "<built-in>".to_owned(),
                    source,
                })?;
        let file_value: Value = content.parse().map_err(|source| ConfigError::TomlParse {
            path: "<inline>".to_owned(),
            source,
        })?;
        merge(&mut root_value, file_value);

        for (key_path, raw_value) in parse_cli_overrides(args)? {
            apply_override(&mut root_value, &key_path, &raw_value)?;
        }

        let config: Self = root_value.try_into().map_err(ConfigError::Deserialize)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.log_level()?;
        self.min_client_version()?;
        if self.server.max_frame_bytes == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "server.max_frame_bytes",
                reason: "must be positive".to_owned(),
            });
        }
        if self.queues.max_queues == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "queues.max_queues",
                reason: "must leave room for the task slot queue".to_owned(),
            });
        }
        Ok(())
    }

    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        LogLevel::parse(&self.logging.level).ok_or_else(|| ConfigError::InvalidSetting {
            key: "logging.level",
            reason: format!("unknown level '{}'", self.logging.level),
        })
    }

    pub fn min_client_version(&self) -> Result<Version, ConfigError> {
        Version::from_code(self.protocol.min_client_version).ok_or_else(|| {
            ConfigError::InvalidSetting {
                key: "protocol.min_client_version",
                reason: format!("{} is not a packet version", self.protocol.min_client_version),
            }
        })
    }

    pub fn task_config(&self) -> TaskConfig {
        TaskConfig {
            busy_retry: Duration::from_secs(self.tasks.busy_retry_secs),
            lh_timeout: Duration::from_secs(self.tasks.lh_timeout_secs),
            max_retries: self.tasks.max_retries,
            task_slots: self.queues.task_slots,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: String,
        source: std::io::Error,
    },
    TomlParse {
        path: String,
        source: toml::de::Error,
    },
    Deserialize(toml::de::Error),
    MissingValueForArg {
        key: String,
    },
    InvalidArgFormat {
        arg: String,
    },
    InvalidPath {
        key: String,
    },
    UnknownPath {
        key: String,
    },
    UnsupportedOverrideType {
        key: String,
    },
    InvalidValueForType {
        key: String,
        expected: &'static str,
        value: String,
    },
    InvalidSetting {
        key: &'static str,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config file '{path}': {source}")
            }
            Self::TomlParse { path, source } => {
                write!(f, "failed to parse TOML config '{path}': {source}")
            }
            Self::Deserialize(source) => write!(f, "failed to deserialize config: {source}"),
            Self::MissingValueForArg { key } => {
                write!(f, "missing value for CLI override '--{key}'")
            }
            Self::InvalidArgFormat { arg } => write!(
                f,
                "invalid CLI argument format '{arg}', expected '--section.key value'"
            ),
            Self::InvalidPath { key } => write!(f, "invalid override key path '{key}'"),
            Self::UnknownPath { key } => write!(f, "unknown override key path '{key}'"),
            Self::UnsupportedOverrideType { key } => {
                write!(f, "override not supported for complex TOML type at '{key}'")
            }
            Self::InvalidValueForType {
                key,
                expected,
                value,
            } => write!(
                f,
                "invalid value '{value}' for '{key}', expected type {expected}"
            ),
            Self::InvalidSetting { key, reason } => write!(f, "invalid '{key}': {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::TomlParse { source, .. } | Self::Deserialize(source) => Some(source),
            _ => None,
        }
    }
}

/// Pulls `--config <path>` out of the argument list.
fn split_config_arg(
    args: impl IntoIterator<Item = String>,
) -> Result<(Option<PathBuf>, Vec<String>), ConfigError> {
    let mut path = None;
    let mut rest = Vec::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let value = iter.next().ok_or_else(|| ConfigError::MissingValueForArg {
                key: "config".to_owned(),
            })?;
            path = Some(PathBuf::from(value));
        } else {
            rest.push(arg);
        }
    }
    Ok((path, rest))
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base), Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn parse_cli_overrides(
    args: impl IntoIterator<Item = String>,
) -> Result<Vec<(String, String)>, ConfigError> {
    let mut parsed = Vec::new();
    let mut iter = args.into_iter();

    while let Some(arg) = iter.next() {
        let Some(stripped) = arg.strip_prefix("--") else {
            return Err(ConfigError::InvalidArgFormat { arg });
        };

        if stripped.is_empty() {
            return Err(ConfigError::InvalidArgFormat { arg });
        }

        let value = iter.next().ok_or_else(|| ConfigError::MissingValueForArg {
            key: stripped.to_owned(),
        })?;

        parsed.push((stripped.to_owned(), value));
    }

    Ok(parsed)
}

fn apply_override(root: &mut Value, key_path: &str, raw_value: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = key_path.split('.').collect();
    if parts.len() < 2 || parts.iter().any(|part| part.is_empty()) {
        return Err(ConfigError::InvalidPath {
            key: key_path.to_owned(),
        });
    }
    let unknown = || ConfigError::UnknownPath {
        key: key_path.to_owned(),
    };

    let mut current = root;
    for section in &parts[..parts.len() - 1] {
        current = current
            .as_table_mut()
            .and_then(|table| table.get_mut(*section))
            .ok_or_else(unknown)?;
    }

    let current_value = current
        .as_table_mut()
        .and_then(|table| table.get_mut(parts[parts.len() - 1]))
        .ok_or_else(unknown)?;
    *current_value = parse_value_using_current_type(key_path, raw_value, current_value)?;

    Ok(())
}

fn parse_value_using_current_type(
    key_path: &str,
    raw_value: &str,
    current_value: &Value,
) -> Result<Value, ConfigError> {
    let invalid = |expected: &'static str| ConfigError::InvalidValueForType {
        key: key_path.to_owned(),
        expected,
        value: raw_value.to_owned(),
    };
    match current_value {
        Value::String(_) => Ok(Value::String(raw_value.to_owned())),
        Value::Integer(_) => raw_value
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| invalid("integer")),
        Value::Float(_) => raw_value
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| invalid("float")),
        Value::Boolean(_) => raw_value
            .parse::<bool>()
            .map(Value::Boolean)
            .map_err(|_| invalid("boolean")),
        Value::Datetime(_) | Value::Array(_) | Value::Table(_) => {
            Err(ConfigError::UnsupportedOverrideType {
                key: key_path.to_owned(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::{AppConfig, ConfigError, ConfigSource};
    use crate::logging::LogLevel;
    use crate::wire::types::Version;

    fn write_temp_config(content: &str, suffix: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "acsgate-config-test-{suffix}-{}.toml",
            std::process::id()
        ));
        fs::write(&path, content).expect("failed to write temp config");
        path
    }

    fn no_args() -> Vec<String> {
        Vec::new()
    }

    #[test]
    fn partial_file_is_layered_over_defaults() {
        let path = write_temp_config(
            r#"
[logging]
level = "debug"

[tasks]
busy_retry_secs = 20
"#,
            "partial",
        );

        let config =
            AppConfig::load_from_toml_with_args(&path, no_args()).expect("config should load");
        fs::remove_file(path).expect("temp config cleanup should succeed");

        assert_eq!(config.log_level().expect("level"), LogLevel::Debug);
        assert!(!config.logging.human_friendly);
        assert_eq!(config.server.port, 50004);
        let tasks = config.task_config();
        assert_eq!(tasks.busy_retry, Duration::from_secs(20));
        assert_eq!(tasks.max_retries, 3);
        assert_eq!(tasks.task_slots, 256);
    }

    #[test]
    fn argv_overrides_matching_toml_paths() {
        let config = AppConfig::from_toml_str_with_args(
            "",
            vec![
                "--logging.level".to_owned(),
                "verbose".to_owned(),
                "--logging.human_friendly".to_owned(),
                "true".to_owned(),
                "--server.port".to_owned(),
                "6000".to_owned(),
                "--protocol.min_client_version".to_owned(),
                "2".to_owned(),
            ],
        )
        .expect("config with overrides should load");

        assert_eq!(config.log_level().expect("level"), LogLevel::Verbose);
        assert!(config.logging.human_friendly);
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.min_client_version().expect("version"), Version::V2);
    }

    #[test]
    fn rejects_unknown_override_path_and_mistyped_values() {
        let err = AppConfig::from_toml_str_with_args(
            "",
            vec!["--logging.nonexistent".to_owned(), "x".to_owned()],
        )
        .expect_err("unknown override key should fail");
        assert!(matches!(err, ConfigError::UnknownPath { .. }));

        let err = AppConfig::from_toml_str_with_args(
            "",
            vec!["--ticker.interval_ms".to_owned(), "fast".to_owned()],
        )
        .expect_err("integer expected");
        assert!(matches!(
            err,
            ConfigError::InvalidValueForType {
                expected: "integer",
                ..
            }
        ));
    }

    #[test]
    fn invalid_settings_are_reported_by_key() {
        let err = AppConfig::from_toml_str_with_args(
            "[protocol]\nmin_client_version = 9\n",
            no_args(),
        )
        .expect_err("no version 9");
        assert!(matches!(
            err,
            ConfigError::InvalidSetting {
                key: "protocol.min_client_version",
                ..
            }
        ));

        let err = AppConfig::from_toml_str_with_args("[logging]\nlevel = \"loud\"\n", no_args())
            .expect_err("unknown level");
        assert!(matches!(err, ConfigError::InvalidSetting { key: "logging.level", .. }));
    }

    #[test]
    fn discovery_prefers_the_explicit_path() {
        let path = write_temp_config("[server]\nport = 7001\n", "explicit");
        let (config, source) = AppConfig::load_with_discovery(vec![
            "--config".to_owned(),
            path.to_string_lossy().to_string(),
            "--server.host".to_owned(),
            "127.0.0.1".to_owned(),
        ])
        .expect("explicit config loads");
        fs::remove_file(&path).expect("temp config cleanup should succeed");

        assert_eq!(source, ConfigSource::File(path));
        assert_eq!(config.server.port, 7001);
        assert_eq!(config.server.host, "127.0.0.1");

        let err = AppConfig::load_with_discovery(vec!["--config".to_owned()])
            .expect_err("path missing");
        assert!(matches!(err, ConfigError::MissingValueForArg { .. }));
    }
}
