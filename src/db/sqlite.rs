use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::query::{Query, QueryAs};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, Sqlite, SqlitePool};
use tracing::trace;

use super::table::{Entity, Filter, META_COLUMNS, Table, Value};
use crate::error::AppError;

/// [`Table`] backed by one SQLite table per entity type.
pub struct SqliteTable<T> {
    pool: SqlitePool,
    marker: PhantomData<fn() -> T>,
}

impl<T> SqliteTable<T> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            marker: PhantomData,
        }
    }
}

impl<T> Clone for SqliteTable<T> {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

impl<T: Entity> fmt::Debug for SqliteTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteTable")
            .field("table", &T::TABLE)
            .finish()
    }
}

fn all_columns<T: Entity>() -> Vec<&'static str> {
    META_COLUMNS.iter().chain(T::COLUMNS).copied().collect()
}

fn bind<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(v),
        Value::Int(v) => query.bind(v),
        Value::Real(v) => query.bind(v),
        Value::Text(v) => query.bind(v),
    }
}

fn bind_as<'q, O>(
    query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    value: Value,
) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(v),
        Value::Int(v) => query.bind(v),
        Value::Real(v) => query.bind(v),
        Value::Text(v) => query.bind(v),
    }
}

#[async_trait]
impl<T> Table<T> for SqliteTable<T>
where
    T: Entity + for<'r> FromRow<'r, SqliteRow>,
{
    async fn query(&self, filter: &Filter) -> Result<Vec<T>, AppError> {
        let sql = format!(
            "SELECT {} FROM {}{}",
            all_columns::<T>().join(", "),
            T::TABLE,
            filter.where_clause()
        );
        trace!(table = T::TABLE, sql = %sql, "🗄️ query");

        let mut query = sqlx::query_as::<_, T>(&sql);
        for condition in filter.conditions() {
            query = bind_as(query, condition.value.clone());
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn insert(&self, mut entity: T) -> Result<T, AppError> {
        entity.meta_mut().stamp_write();

        let columns = all_columns::<T>();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            T::TABLE,
            columns.join(", "),
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for column in &columns {
            query = bind(query, entity.value_of(column));
        }
        query.execute(&self.pool).await?;

        Ok(entity)
    }

    async fn update(&self, mut entity: T) -> Result<T, AppError> {
        let expected_etag = entity.meta().etag.clone();
        entity.meta_mut().stamp_write();

        let set_columns: Vec<&str> = ["timestamp", "etag"]
            .iter()
            .chain(T::COLUMNS)
            .copied()
            .collect();
        let assignments: Vec<String> = set_columns.iter().map(|c| format!("{c} = ?")).collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE partition_key = ? AND row_key = ? AND etag = ?",
            T::TABLE,
            assignments.join(", ")
        );

        let mut query = sqlx::query(&sql);
        for column in &set_columns {
            query = bind(query, entity.value_of(column));
        }
        let result = query
            .bind(entity.meta().partition_key.clone())
            .bind(entity.meta().row_key.clone())
            .bind(expected_etag)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict {
                table: T::TABLE,
                row_key: entity.meta().row_key.clone(),
            });
        }

        Ok(entity)
    }

    async fn delete(&self, entity: &T) -> Result<(), AppError> {
        let sql = format!(
            "DELETE FROM {} WHERE partition_key = ? AND row_key = ?",
            T::TABLE
        );
        sqlx::query(&sql)
            .bind(entity.meta().partition_key.clone())
            .bind(entity.meta().row_key.clone())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<bool, AppError> {
        let sql = format!("DELETE FROM {}", T::TABLE);
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{LeaderboardEntry, Player, Season, connect};

    async fn pool() -> SqlitePool {
        connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn insert_then_query_by_filter() {
        let table = SqliteTable::<Player>::new(pool().await);

        let stored = table.insert(Player::new("account.1", "Shroud")).await.unwrap();
        table.insert(Player::new("account.2", "Chocotaco")).await.unwrap();

        assert!(stored.meta.is_saved());
        assert_eq!(stored.meta.partition_key, "");

        let found = table
            .query(&Filter::all().eq("name", "shroud"))
            .await
            .unwrap();
        assert_eq!(found, vec![stored]);

        let found = table
            .query(&Filter::all().eq_ignore_case("player_id", "ACCOUNT.2"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].display_name, "Chocotaco");

        assert_eq!(table.query(&Filter::all()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_is_rejected_with_stale_etag() {
        let table = SqliteTable::<Player>::new(pool().await);

        let stored = table.insert(Player::new("account.1", "shroud")).await.unwrap();
        let stale = stored.clone();

        let mut renamed = stored;
        renamed.display_name = "Shroud".into();
        let renamed = table.update(renamed).await.unwrap();
        assert_ne!(renamed.meta.etag, stale.meta.etag);
        assert!(renamed.meta.timestamp > stale.meta.timestamp);

        let err = table.update(stale).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { table: "players", .. }));

        let found = table.query(&Filter::all()).await.unwrap();
        assert_eq!(found, vec![renamed]);
    }

    #[tokio::test]
    async fn delete_and_clear_all() {
        let table = SqliteTable::<Season>::new(pool().await);

        let s7 = table
            .insert(Season::new(Season::id_for_number(7), false, false))
            .await
            .unwrap();
        table
            .insert(Season::new(Season::id_for_number(8), true, false))
            .await
            .unwrap();

        table.delete(&s7).await.unwrap();
        let left = table.query(&Filter::all()).await.unwrap();
        assert_eq!(left.len(), 1);
        assert!(left[0].is_current_season);

        assert!(table.clear_all().await.unwrap());
        assert!(table.query(&Filter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn leaderboard_entries_round_trip_numeric_columns() {
        let table = SqliteTable::<LeaderboardEntry>::new(pool().await);

        let entry = LeaderboardEntry {
            meta: Default::default(),
            region: "pc-eu".into(),
            season: Season::id_for_number(30),
            rank: 3,
            player_id: "account.3".into(),
            name: "Ibiza".into(),
            rank_points: 4210,
            win_count: 12,
            game_count: 48,
            win_ratio: LeaderboardEntry::win_ratio(12, 48),
            avg_damage: 412.0,
            kda_ratio: 3.5,
            tier: "Master".into(),
            sub_tier: "1".into(),
        };
        table.insert(entry).await.unwrap();

        let top = table
            .query(&Filter::all().eq("region", "pc-eu").le("rank", 10))
            .await
            .unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].win_ratio, 0.25);
        assert_eq!(top[0].rank_points, 4210);

        let none = table
            .query(&Filter::all().eq("region", "pc-eu").le("rank", 2))
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
