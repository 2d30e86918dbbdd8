//! Loads the built-in disease table into the catalog database.

use backend::config::AppConfig;
use backend::db::{self, SqliteRepository};
use backend::diagnosis::seed_catalog;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env()?;
    let conn = db::open_database(&config.database_path)?;
    let repo = SqliteRepository::new(conn);

    let (created, updated) = seed_catalog(&repo)?;
    log::info!(
        "Seeded {}: {} created, {} updated, {} total",
        config.database_path.display(),
        created,
        updated,
        repo.count_diseases()?
    );
    Ok(())
}
