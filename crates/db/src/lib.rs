use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;

pub use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, TransactionTrait};

pub mod entities;
pub mod models;
pub mod types;

#[derive(Clone)]
pub struct DBService {
    pub pool: DatabaseConnection,
}

impl DBService {
    /// Connect and bring the schema up to date.
    pub async fn new(database_url: &str) -> Result<DBService, DbErr> {
        let mut options = ConnectOptions::new(database_url.to_string());
        options.sqlx_logging(false);
        let pool = Database::connect(options).await?;
        db_migration::Migrator::up(&pool, None).await?;
        tracing::debug!("Database connected and migrated");
        Ok(DBService { pool })
    }

    /// Fresh in-memory database, used by tests.
    pub async fn new_in_memory() -> Result<DBService, DbErr> {
        Self::new("sqlite::memory:").await
    }
}
