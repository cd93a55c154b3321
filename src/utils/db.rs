use crate::{conf::DatabaseConfig, index::IndexDescriptor};

use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    error::ErrorKind,
    options::{ClientOptions, Credential},
    Client, Collection, Database, IndexModel,
};
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
#[error("failed to create index")]
pub struct CreateIndexError(#[from] pub mongodb::error::Error);

/// Driver options for `config`, credential included.
pub async fn client_options(
    config: &DatabaseConfig,
) -> Result<ClientOptions, mongodb::error::Error> {
    let mut options = ClientOptions::parse(config.uri()).await?;
    options.app_name = Some("furretweet-init".to_string());
    options.credential = Some(
        Credential::builder()
            .username(config.username.clone())
            .password(config.password.clone())
            .source(config.auth_source.clone())
            .build(),
    );
    Ok(options)
}

/// Builds a client for `config`. The driver connects lazily, so this never
/// touches the network beyond SRV resolution.
#[instrument(skip_all, fields(host = %config.host, database = %config.name), err)]
pub async fn build_client(config: &DatabaseConfig) -> Result<Client, mongodb::error::Error> {
    Client::with_options(client_options(config).await?)
}

/// Round-trips a `ping` on `db`, which forces the connection handshake and
/// authentication.
#[instrument(skip(db), fields(database = db.name()), err)]
pub async fn ping(db: &Database) -> Result<(), mongodb::error::Error> {
    db.run_command(doc! { "ping": 1 }).await?;
    Ok(())
}

#[instrument(skip(collection, index), fields(collection = collection.name()), err)]
pub async fn create_index(
    collection: &Collection<Document>,
    index: IndexModel,
) -> Result<String, CreateIndexError> {
    let result = collection.create_index(index).await?;
    Ok(result.index_name)
}

/// Server error code for a collection that does not exist.
const NAMESPACE_NOT_FOUND_CODE: i32 = 26;

/// Lists the indexes of the descriptor's collection that match it. A missing
/// collection has no indexes.
#[instrument(skip(db), fields(database = db.name()), err)]
pub async fn matching_indexes(
    db: &Database,
    descriptor: &IndexDescriptor,
) -> Result<Vec<IndexModel>, mongodb::error::Error> {
    let collection: Collection<Document> = db.collection(&descriptor.collection);
    let cursor = match collection.list_indexes().await {
        Ok(cursor) => cursor,
        Err(e) if is_namespace_not_found(&e) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let indexes: Vec<IndexModel> = cursor.try_collect().await?;
    Ok(indexes
        .into_iter()
        .filter(|index| descriptor.matches(index))
        .collect())
}

fn is_namespace_not_found(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Command(command_error) if command_error.code == NAMESPACE_NOT_FOUND_CODE
    )
}
