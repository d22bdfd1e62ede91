use sqlx::SqlitePool;
use tracing::info;

use crate::error::AppError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS seasons (
    partition_key TEXT NOT NULL DEFAULT '',
    row_key TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    etag TEXT NOT NULL,
    season_id TEXT NOT NULL,
    is_current_season INTEGER NOT NULL DEFAULT 0,
    is_off_season INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (partition_key, row_key)
);

CREATE TABLE IF NOT EXISTS players (
    partition_key TEXT NOT NULL DEFAULT '',
    row_key TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    etag TEXT NOT NULL,
    player_id TEXT NOT NULL,
    name TEXT NOT NULL,
    display_name TEXT NOT NULL,
    PRIMARY KEY (partition_key, row_key)
);

CREATE TABLE IF NOT EXISTS leaderboard_entries (
    partition_key TEXT NOT NULL DEFAULT '',
    row_key TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    etag TEXT NOT NULL,
    region TEXT NOT NULL,
    season TEXT NOT NULL,
    rank INTEGER NOT NULL,
    player_id TEXT NOT NULL,
    name TEXT NOT NULL,
    rank_points INTEGER NOT NULL DEFAULT 0,
    win_count INTEGER NOT NULL DEFAULT 0,
    game_count INTEGER NOT NULL DEFAULT 0,
    win_ratio REAL NOT NULL DEFAULT 0,
    avg_damage REAL NOT NULL DEFAULT 0,
    kda_ratio REAL NOT NULL DEFAULT 0,
    tier TEXT NOT NULL DEFAULT '',
    sub_tier TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (partition_key, row_key)
);

CREATE INDEX IF NOT EXISTS idx_players_name ON players(name);
CREATE INDEX IF NOT EXISTS idx_players_player_id ON players(player_id);
CREATE INDEX IF NOT EXISTS idx_leaderboard_region_season ON leaderboard_entries(region, season);
CREATE INDEX IF NOT EXISTS idx_leaderboard_name_season ON leaderboard_entries(name, season);
"#;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    info!("🗄️ Database migrations completed");
    Ok(())
}
