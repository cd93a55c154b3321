// Utilities for integration tests
use crate::{conf::AppConfig, utils::db::build_client};

use mongodb::{bson::Document, Database};

pub const TEST_CONFIG_FILE: &str = "tests/config.test.yaml";

pub fn test_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::from_path(TEST_CONFIG_FILE)?)
}

/// Test config pointed at a throwaway collection so runs don't step on each
/// other or on real data.
pub fn test_config_with_collection(
    collection: &str,
) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = test_config()?;
    config.index.collection = collection.to_string();
    Ok(config)
}

pub async fn test_db(config: &AppConfig) -> Result<Database, Box<dyn std::error::Error>> {
    let client = build_client(&config.database).await?;
    Ok(client.database(&config.database.name))
}

// drops a collection (and with it, its indexes)
pub async fn drop_collection(
    config: &AppConfig,
    collection: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = test_db(config).await?;
    db.collection::<Document>(collection).drop().await?;
    Ok(())
}

pub fn random_collection_name(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}
