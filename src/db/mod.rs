//! Persistence: the generic [`Table`] abstraction, its SQLite backend and the
//! records stored by the bot.

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

use crate::error::AppError;

mod migrations;
mod models;
mod sqlite;
mod table;

pub use models::{LeaderboardEntry, Player, RANKED_SEASON_PREFIX, Season};
pub use sqlite::SqliteTable;
pub use table::{Entity, EntityMeta, Filter, Table, Value, newest_first};

/// Open the pool (creating the database file when needed) and apply the schema.
pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    // Every connection to `:memory:` is its own database, keep a single one alive.
    let pool = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    info!("🗄️ Database connected");
    migrations::run_migrations(&pool).await?;

    Ok(pool)
}
