use anyhow::{Context, Result};
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

/// Embed all diesel migrations at compile time
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Type alias for SQLite connection pool
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

const IN_MEMORY_URL: &str = ":memory:";

/// Create database connection pool and run migrations
///
/// This function should be called **once at application startup**.
///
/// Responsibilities:
/// - Build r2d2 connection pool
/// - Automatically run all pending Diesel migrations
///
/// Every connection to `:memory:` opens its own database, so an in-memory pool is
/// limited to a single connection.
pub fn init_db_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);

    let mut builder = Pool::builder();
    if database_url == IN_MEMORY_URL {
        builder = builder.max_size(1);
    }
    let pool = builder
        .build(manager)
        .with_context(|| format!("Failed to create database pool for {database_url}"))?;

    run_migrations(&pool)?;

    Ok(pool)
}

/// Run embedded Diesel migrations
fn run_migrations(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get()?;

    info!("Running database migrations...");
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
    info!("Database migrations completed");

    Ok(())
}
