use crate::{
    conf::{AppConfig, ConfigError},
    index::{validate_database_name, IndexDescriptor, InvalidNameError},
    utils::db::{build_client, create_index, matching_indexes, ping, CreateIndexError},
};

use mongodb::{
    bson::Document,
    error::{Error as MongoError, ErrorKind},
    Collection, Database,
};
use tracing::{info, instrument};

/// Server error code for a rejected credential.
const AUTHENTICATION_FAILED_CODE: i32 = 18;

#[derive(thiserror::Error, Debug)]
pub enum BootstrapError {
    #[error("authentication failed")]
    Authentication(#[source] MongoError),
    #[error("database is unreachable")]
    Connectivity(#[source] MongoError),
    #[error("{var} must be set, refusing to authenticate with an empty password")]
    MissingCredential { var: String },
    #[error("invalid name")]
    InvalidName(#[from] InvalidNameError),
    #[error("failed to create index on {collection}")]
    CreateIndex {
        collection: String,
        #[source]
        source: MongoError,
    },
    #[error("index {keys} on {collection} not found after creation")]
    IndexMissing { collection: String, keys: Document },
    #[error("database command failed")]
    Database(#[source] MongoError),
    #[error("invalid configuration")]
    Config(#[source] ConfigError),
}

impl From<ConfigError> for BootstrapError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::MissingPassword { var } => BootstrapError::MissingCredential { var },
            other => BootstrapError::Config(other),
        }
    }
}

/// Kind of failure a driver error represents, as far as the bootstrap cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Authentication,
    Connectivity,
    Other,
}

pub fn classify(error: &MongoError) -> FailureKind {
    match error.kind.as_ref() {
        ErrorKind::Authentication { .. } => FailureKind::Authentication,
        ErrorKind::Command(command_error) if command_error.code == AUTHENTICATION_FAILED_CODE => {
            FailureKind::Authentication
        }
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::DnsResolve { .. } => FailureKind::Connectivity,
        _ => FailureKind::Other,
    }
}

impl From<MongoError> for BootstrapError {
    fn from(error: MongoError) -> Self {
        match classify(&error) {
            FailureKind::Authentication => BootstrapError::Authentication(error),
            FailureKind::Connectivity => BootstrapError::Connectivity(error),
            FailureKind::Other => BootstrapError::Database(error),
        }
    }
}

impl BootstrapError {
    /// Like the `From` conversion, but attributes errors that are neither
    /// authentication nor connectivity failures to `collection`.
    pub fn index_error(error: MongoError, collection: &str) -> Self {
        match classify(&error) {
            FailureKind::Other => BootstrapError::CreateIndex {
                collection: collection.to_string(),
                source: error,
            },
            _ => error.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub database: String,
    pub collection: String,
    pub index_name: String,
}

/// Loads the configuration the binary runs with: the file at `config_path`
/// when given, the built-in defaults otherwise.
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, BootstrapError> {
    Ok(AppConfig::load(config_path)?)
}

/// Authenticates against `db`.
#[instrument(skip(db), fields(database = db.name()), err)]
pub async fn authenticate(db: &Database) -> Result<(), BootstrapError> {
    ping(db).await?;
    info!("authenticated");
    Ok(())
}

/// Creates the descriptor's index. A no-op when an identical index exists.
#[instrument(skip(db), fields(database = db.name()), err)]
pub async fn ensure_index(
    db: &Database,
    descriptor: &IndexDescriptor,
) -> Result<String, BootstrapError> {
    descriptor.validate()?;
    let collection: Collection<Document> = db.collection(&descriptor.collection);
    let index_name = create_index(&collection, descriptor.to_index_model())
        .await
        .map_err(|CreateIndexError(e)| BootstrapError::index_error(e, &descriptor.collection))?;
    info!(%index_name, "index ensured");
    Ok(index_name)
}

/// Confirms the server lists exactly one index matching `descriptor`.
#[instrument(skip(db), fields(database = db.name()), err)]
pub async fn verify_index(
    db: &Database,
    descriptor: &IndexDescriptor,
) -> Result<String, BootstrapError> {
    let matching = matching_indexes(db, descriptor).await?;
    let name = matching
        .first()
        .and_then(|index| index.options.as_ref())
        .and_then(|options| options.name.clone());
    match (matching.len(), name) {
        (1, Some(name)) => Ok(name),
        _ => Err(BootstrapError::IndexMissing {
            collection: descriptor.collection.clone(),
            keys: descriptor.keys(),
        }),
    }
}

/// Runs the whole bootstrap: validate names, authenticate, create the index
/// and check that it is in place.
#[instrument(skip_all, fields(database = %config.database.name, collection = %config.index.collection), err)]
pub async fn run(config: &AppConfig) -> Result<BootstrapReport, BootstrapError> {
    validate_database_name(&config.database.name)?;
    config.index.validate()?;

    let client = build_client(&config.database).await?;
    let db = client.database(&config.database.name);

    authenticate(&db).await?;
    ensure_index(&db, &config.index).await?;
    let index_name = verify_index(&db, &config.index).await?;

    Ok(BootstrapReport {
        database: config.database.name.clone(),
        collection: config.index.collection.clone(),
        index_name,
    })
}
