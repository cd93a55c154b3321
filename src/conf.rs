use crate::index::{IndexDescriptor, IndexDirection};

use config::{Config, File, Map, Value, ValueKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_DATABASE_NAME: &str = "furretweet";
pub const DEFAULT_USERNAME: &str = "furretweet";
pub const DEFAULT_PASSWORD_ENV: &str = "MONGO_DB_PASSWORD";
pub const DEFAULT_COLLECTION: &str = "not_retweeted_tweets";
pub const DEFAULT_FIELD: &str = "author_id";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}:]+)(?::-(.*?))?\}").expect("valid placeholder regex"));

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config")]
    InvalidConfigError(#[from] config::ConfigError),
    #[error("could not find config file {0}")]
    ConfigFileNotFound(String),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("environment variable expansion error")]
    EnvExpansionError(#[from] ExpandError),
    #[error("environment variable {var} is not set or empty")]
    MissingPassword { var: String },
}

#[derive(thiserror::Error, Debug)]
pub enum ExpandError {
    #[error("Missing environment variable '{var_name}' for placeholder '{placeholder}'")]
    MissingVariable {
        var_name: String,
        placeholder: String,
    },
}

/// Loads environment variables from a .env file if it exists.
///
/// Looks in the current working directory first, then in the parent
/// directory. Without either, the process environment is used as is.
pub fn load_dotenv() {
    if Path::new(".env").exists() {
        match dotenvy::dotenv() {
            Ok(_) => info!("Loaded environment variables from .env file"),
            Err(e) => warn!("Found .env file but failed to load it: {}", e),
        }
        return;
    }

    if Path::new("../.env").exists() {
        match dotenvy::from_path("../.env") {
            Ok(_) => info!("Loaded environment variables from ../.env file"),
            Err(e) => warn!("Found ../.env file but failed to load it: {}", e),
        }
        return;
    }

    debug!("No .env file found, using system environment variables only");
}

/// Expands environment variable placeholders in a string.
/// Supports both ${VAR_NAME} and ${VAR_NAME:-default_value} syntax.
///
/// Examples:
/// - "${MONGO_HOST}" -> reads from MONGO_HOST env var
/// - "${MONGO_HOST:-localhost}" -> reads from MONGO_HOST, falls back to "localhost"
pub fn expand_env_vars(input: &str) -> Result<String, ExpandError> {
    let mut result = input.to_string();
    let mut replacements: HashMap<String, String> = HashMap::new();

    for capture in PLACEHOLDER_RE.captures_iter(input) {
        let full_match = &capture[0];
        let var_name = &capture[1];
        let default_value = capture.get(2).map(|m| m.as_str());

        if replacements.contains_key(full_match) {
            continue;
        }

        let env_value = match env::var(var_name) {
            Ok(value) => {
                debug!("Expanded environment variable: {} = [REDACTED]", var_name);
                value
            }
            Err(_) => match default_value {
                Some(default) => {
                    warn!(
                        "Environment variable {} not found, using default value",
                        var_name
                    );
                    default.to_string()
                }
                None => {
                    return Err(ExpandError::MissingVariable {
                        var_name: var_name.to_string(),
                        placeholder: full_match.to_string(),
                    });
                }
            },
        };

        result = result.replace(full_match, &env_value);
        replacements.insert(full_match.to_string(), env_value);
    }

    Ok(result)
}

/// Reads a YAML config file, expanding environment placeholders first.
#[instrument(err)]
pub fn load_config(filepath: &str) -> Result<Config, ConfigError> {
    let path = Path::new(filepath);

    if !path.exists() {
        return Err(ConfigError::ConfigFileNotFound(filepath.to_string()));
    }

    // expand placeholders on the raw text, then hand the result to `config`
    let file_content =
        std::fs::read_to_string(path).map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;

    let expanded_content = expand_env_vars(&file_content)?;

    let temp_file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;

    std::fs::write(temp_file.path(), expanded_content)
        .map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;

    let conf = Config::builder()
        .add_source(File::from(temp_file.path()))
        .build()?;

    Ok(conf)
}

/// A top-level table; an absent section is empty, anything else that is not a
/// table is an error.
fn get_section(config: &Config, key: &str) -> Result<Map<String, Value>, ConfigError> {
    match config.get_table(key) {
        Ok(table) => Ok(table),
        Err(config::ConfigError::NotFound(_)) => Ok(Map::new()),
        Err(e) => Err(e.into()),
    }
}

fn get_string(table: &Map<String, Value>, key: &str) -> Result<Option<String>, ConfigError> {
    match table.get(key) {
        // `key: null` in yaml counts as unset
        None
        | Some(Value {
            kind: ValueKind::Nil,
            ..
        }) => Ok(None),
        Some(value) => Ok(Some(value.clone().into_string()?)),
    }
}

/// Reads the password from the environment variable `var`.
///
/// An unset or empty variable is an error: the bootstrap never attempts to
/// authenticate with an empty credential.
pub fn password_from_env(var: &str) -> Result<String, ConfigError> {
    match env::var(var) {
        Ok(password) if !password.is_empty() => Ok(password),
        _ => Err(ConfigError::MissingPassword {
            var: var.to_string(),
        }),
    }
}

/// Configuration for the database connection
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub auth_source: String,
    pub replica_set: Option<String>,
    pub srv: bool,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("auth_source", &self.auth_source)
            .field("replica_set", &self.replica_set)
            .field("srv", &self.srv)
            .finish()
    }
}

impl DatabaseConfig {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let db_conf = get_section(config, "database")?;

        let host = get_string(&db_conf, "host")?.unwrap_or_else(|| "localhost".to_string());

        let port = match db_conf.get("port") {
            Some(port) => {
                let port = port.clone().into_int()?;
                u16::try_from(port).map_err(|_| ConfigError::InvalidValue {
                    key: "database.port".to_string(),
                    reason: format!("{} is not a valid port", port),
                })?
            }
            None => 27017,
        };

        let name =
            get_string(&db_conf, "name")?.unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string());

        let username =
            get_string(&db_conf, "username")?.unwrap_or_else(|| DEFAULT_USERNAME.to_string());

        let auth_source = get_string(&db_conf, "auth_source")?.unwrap_or_else(|| name.clone());

        let password_env = get_string(&db_conf, "password_env")?
            .unwrap_or_else(|| DEFAULT_PASSWORD_ENV.to_string());
        let password = password_from_env(&password_env)?;

        let replica_set = get_string(&db_conf, "replica_set")?;

        let srv = db_conf
            .get("srv")
            .map(|s| s.clone().into_bool())
            .transpose()?
            .unwrap_or(false);

        Ok(DatabaseConfig {
            name,
            host,
            port,
            username,
            password,
            auth_source,
            replica_set,
            srv,
        })
    }

    /// Connection string without credentials; those are attached to the
    /// client options separately so the password never shows up in a URI.
    pub fn uri(&self) -> String {
        let mut uri = if self.srv {
            format!("mongodb+srv://{}", self.host)
        } else {
            format!("mongodb://{}:{}", self.host, self.port)
        };

        uri.push('/');
        uri.push_str(&self.name);

        let mut params = Vec::new();
        if !self.srv && self.replica_set.is_none() {
            params.push("directConnection=true".to_string());
        }
        if let Some(ref replica_set) = self.replica_set {
            params.push(format!("replicaSet={}", replica_set));
        }
        if !params.is_empty() {
            uri.push('?');
            uri.push_str(&params.join("&"));
        }

        uri
    }
}

impl IndexDescriptor {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let index_conf = get_section(config, "index")?;

        let collection =
            get_string(&index_conf, "collection")?.unwrap_or_else(|| DEFAULT_COLLECTION.to_string());

        let field = get_string(&index_conf, "field")?.unwrap_or_else(|| DEFAULT_FIELD.to_string());

        let direction = match index_conf.get("direction") {
            Some(direction) => {
                let direction = direction.clone().into_int()?;
                IndexDirection::try_from(direction).map_err(|_| ConfigError::InvalidValue {
                    key: "index.direction".to_string(),
                    reason: format!("expected 1 or -1, got {}", direction),
                })?
            }
            None => IndexDirection::Ascending,
        };

        let unique = index_conf
            .get("unique")
            .map(|u| u.clone().into_bool())
            .transpose()?
            .unwrap_or(false);

        Ok(IndexDescriptor {
            collection,
            field,
            direction,
            unique,
        })
    }
}

/// Everything a bootstrap run needs
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub index: IndexDescriptor,
}

impl AppConfig {
    /// Built-in defaults, with the password taken from `MONGO_DB_PASSWORD`.
    pub fn default_config() -> Result<Self, ConfigError> {
        let config = Config::builder().build()?;
        Self::from_raw(&config)
    }

    pub fn from_path(config_path: &str) -> Result<Self, ConfigError> {
        let config = load_config(config_path)?;
        Self::from_raw(&config)
    }

    /// Uses the file at `config_path` when given, the defaults otherwise.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) => Self::from_path(path),
            None => Self::default_config(),
        }
    }

    pub fn from_raw(config: &Config) -> Result<Self, ConfigError> {
        let database = DatabaseConfig::from_config(config)?;
        let index = IndexDescriptor::from_config(config)?;
        Ok(AppConfig { database, index })
    }
}
