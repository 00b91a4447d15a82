use crate::error_handler::CustomError;
use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub type Pool = diesel::r2d2::Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = diesel::r2d2::PooledConnection<ConnectionManager<PgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Builds the connection pool for the whole process. Every handler borrows
/// connections from this pool via `connection`; there is no global handle.
pub fn init_pool(database_url: &str) -> Result<Pool, CustomError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .build(manager)
        .map_err(|err| CustomError::internal(format!("Failed to build db pool: {}", err)))
}

pub fn run_migrations(pool: &Pool) -> Result<(), CustomError> {
    let mut conn = connection(pool)?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| CustomError::internal(format!("Failed to run migrations: {}", err)))?;
    Ok(())
}

pub fn connection(pool: &Pool) -> Result<DbConnection, CustomError> {
    pool.get()
        .map_err(|err| CustomError::internal(format!("Failed to get db connection: {}", err)))
}
