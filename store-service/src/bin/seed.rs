use service_core::observability::init_tracing;
use store_service::config::StoreConfig;
use store_service::services::seed::migrate_roles_and_permissions;
use store_service::services::{AccessRepository, MongoDb};

/// Writes the static permission catalogue and legacy roles into MongoDB.
#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    let config = StoreConfig::load()?;
    init_tracing("store-seed", "info", "");

    let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database).await?;
    db.initialize_indexes().await?;

    let summary = migrate_roles_and_permissions(&AccessRepository::new(db)).await?;
    tracing::info!(
        permissions_created = summary.permissions_created,
        roles_created = summary.roles_created,
        roles_updated = summary.roles_updated,
        "Role and permission migration complete"
    );
    Ok(())
}
