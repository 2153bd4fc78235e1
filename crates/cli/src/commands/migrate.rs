//! `tabletalk migrate` — create or update the database schema.

use tabletalk_config::AppConfig;
use tabletalk_store::SqliteStore;

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Migrating database at {}", config.database.path);

    // Opening the store creates the file and applies the schema.
    let store = SqliteStore::new(&config.database.path).await?;
    store.run_migrations().await?;

    println!("Schema is up to date.");
    Ok(())
}
