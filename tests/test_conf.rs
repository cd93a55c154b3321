use furretweet_init::conf::{
    self, expand_env_vars, load_config, AppConfig, ConfigError, DatabaseConfig, ExpandError,
};
use furretweet_init::index::IndexDirection;
use furretweet_init::utils::testing::TEST_CONFIG_FILE;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let temp_file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
    std::fs::write(temp_file.path(), content).unwrap();
    temp_file
}

#[test]
fn test_load_raw_config() {
    let config = load_config(TEST_CONFIG_FILE);
    assert!(config.is_ok());

    let config = config.unwrap();

    let hello = config.get_string("hello");
    assert!(hello.is_ok());

    let hello = hello.unwrap();
    assert_eq!(hello, "world");
}

#[test]
fn test_missing_config_file() {
    let result = load_config("tests/does-not-exist.yaml");
    assert!(matches!(result, Err(ConfigError::ConfigFileNotFound(_))));
}

#[test]
fn test_expand_env_vars() {
    std::env::set_var("FURRETWEET_TEST_EXPAND_HOST", "mongo");
    let expanded = expand_env_vars(
        "host: ${FURRETWEET_TEST_EXPAND_HOST}\nother: ${FURRETWEET_TEST_EXPAND_HOST}\nport: ${FURRETWEET_TEST_EXPAND_UNSET:-27017}",
    )
    .unwrap();
    assert_eq!(expanded, "host: mongo\nother: mongo\nport: 27017");
}

#[test]
fn test_expand_env_vars_missing_variable() {
    let result = expand_env_vars("password: ${FURRETWEET_TEST_EXPAND_NEVER_SET}");
    match result {
        Err(ExpandError::MissingVariable {
            var_name,
            placeholder,
        }) => {
            assert_eq!(var_name, "FURRETWEET_TEST_EXPAND_NEVER_SET");
            assert_eq!(placeholder, "${FURRETWEET_TEST_EXPAND_NEVER_SET}");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_defaults_when_keys_are_absent() {
    std::env::set_var("FURRETWEET_TEST_DEFAULTS_PASSWORD", "hunter2");
    let temp_file = write_config(
        r#"
database:
  password_env: FURRETWEET_TEST_DEFAULTS_PASSWORD
"#,
    );

    let config = AppConfig::from_path(temp_file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.database.host, "localhost");
    assert_eq!(config.database.port, 27017);
    assert_eq!(config.database.name, conf::DEFAULT_DATABASE_NAME);
    assert_eq!(config.database.username, conf::DEFAULT_USERNAME);
    assert_eq!(config.database.auth_source, "furretweet");
    assert_eq!(config.database.password, "hunter2");
    assert_eq!(config.database.replica_set, None);
    assert!(!config.database.srv);

    assert_eq!(config.index.collection, "not_retweeted_tweets");
    assert_eq!(config.index.field, "author_id");
    assert_eq!(config.index.direction, IndexDirection::Ascending);
    assert!(!config.index.unique);
}

#[test]
fn test_full_config() {
    std::env::set_var("FURRETWEET_TEST_FULL_PASSWORD", "s3cret");
    let temp_file = write_config(
        r#"
database:
  host: mongo.internal
  port: 27018
  name: other_db
  username: bot
  auth_source: admin
  password_env: FURRETWEET_TEST_FULL_PASSWORD
  replica_set: rs0
  srv: false
index:
  collection: tweets
  field: user.id
  direction: -1
  unique: true
"#,
    );

    let config = AppConfig::from_path(temp_file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.database.host, "mongo.internal");
    assert_eq!(config.database.port, 27018);
    assert_eq!(config.database.name, "other_db");
    assert_eq!(config.database.username, "bot");
    assert_eq!(config.database.auth_source, "admin");
    assert_eq!(config.database.password, "s3cret");
    assert_eq!(config.database.replica_set.as_deref(), Some("rs0"));

    assert_eq!(config.index.collection, "tweets");
    assert_eq!(config.index.field, "user.id");
    assert_eq!(config.index.direction, IndexDirection::Descending);
    assert!(config.index.unique);
}

#[test]
fn test_missing_password_fails_fast() {
    let temp_file = write_config(
        r#"
database:
  password_env: FURRETWEET_TEST_PASSWORD_NEVER_SET
"#,
    );

    let result = AppConfig::from_path(temp_file.path().to_str().unwrap());
    match result {
        Err(ConfigError::MissingPassword { var }) => {
            assert_eq!(var, "FURRETWEET_TEST_PASSWORD_NEVER_SET")
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_empty_password_fails_fast() {
    std::env::set_var("FURRETWEET_TEST_EMPTY_PASSWORD", "");
    let temp_file = write_config(
        r#"
database:
  password_env: FURRETWEET_TEST_EMPTY_PASSWORD
"#,
    );

    let result = AppConfig::from_path(temp_file.path().to_str().unwrap());
    assert!(matches!(result, Err(ConfigError::MissingPassword { .. })));
}

#[test]
fn test_invalid_direction() {
    std::env::set_var("FURRETWEET_TEST_DIRECTION_PASSWORD", "pw");
    let temp_file = write_config(
        r#"
database:
  password_env: FURRETWEET_TEST_DIRECTION_PASSWORD
index:
  direction: 2
"#,
    );

    let result = AppConfig::from_path(temp_file.path().to_str().unwrap());
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

fn database_config() -> DatabaseConfig {
    DatabaseConfig {
        name: "furretweet".to_string(),
        host: "localhost".to_string(),
        port: 27017,
        username: "furretweet".to_string(),
        password: "areallygoodpassword".to_string(),
        auth_source: "furretweet".to_string(),
        replica_set: None,
        srv: false,
    }
}

#[test]
fn test_uri_never_contains_credentials() {
    let config = database_config();
    let uri = config.uri();
    assert_eq!(uri, "mongodb://localhost:27017/furretweet?directConnection=true");
    assert!(!uri.contains(&config.password));

    let config = DatabaseConfig {
        replica_set: Some("rs0".to_string()),
        ..database_config()
    };
    assert_eq!(config.uri(), "mongodb://localhost:27017/furretweet?replicaSet=rs0");

    let config = DatabaseConfig {
        host: "cluster.example.net".to_string(),
        srv: true,
        ..database_config()
    };
    assert_eq!(config.uri(), "mongodb+srv://cluster.example.net/furretweet");
}

#[test]
fn test_debug_redacts_password() {
    let config = database_config();
    let debug = format!("{:?}", config);
    assert!(debug.contains("[REDACTED]"));
    assert!(!debug.contains(&config.password));
}

#[test]
fn test_non_table_section_is_rejected() {
    std::env::set_var("FURRETWEET_TEST_SECTION_PASSWORD", "pw");
    let temp_file = write_config(
        r#"
database:
  password_env: FURRETWEET_TEST_SECTION_PASSWORD
index: author_id_desc
"#,
    );

    let result = AppConfig::from_path(temp_file.path().to_str().unwrap());
    assert!(
        matches!(result, Err(ConfigError::InvalidConfigError(_))),
        "unexpected result: {:?}",
        result
    );

    let temp_file = write_config("database: 27017\n");
    let result = AppConfig::from_path(temp_file.path().to_str().unwrap());
    assert!(matches!(result, Err(ConfigError::InvalidConfigError(_))));
}
