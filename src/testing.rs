//! In-memory doubles for the table, stats source and message cleanup seams.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::db::{Entity, Filter, Season, Table};
use crate::error::AppError;
use crate::pubg::types::{
    LeaderboardAttributes, LeaderboardStats, PlayerAttributes, SeasonAttributes,
};
use crate::pubg::{
    LeaderboardPlayerDto, PlayerDto, PubgApiError, PubgApiResponse, RankedStats, Region,
    SeasonDto, StatsSource,
};
use crate::session::{MessageCleanup, MessageRef};

/// A write as seen by [`MemoryTable`], in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOp {
    InsertStarted,
    DeleteFinished,
}

pub struct MemoryTable<T> {
    rows: Mutex<Vec<T>>,
    ops: Mutex<Vec<TableOp>>,
    pub queries: AtomicUsize,
    pub inserts: AtomicUsize,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    fail_queries: AtomicBool,
    fail_inserts: AtomicBool,
    query_delay: Mutex<Option<Duration>>,
}

impl<T: Entity> MemoryTable<T> {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            ops: Mutex::new(Vec::new()),
            queries: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fail_queries: AtomicBool::new(false),
            fail_inserts: AtomicBool::new(false),
            query_delay: Mutex::new(None),
        }
    }

    pub fn rows(&self) -> Vec<T> {
        self.rows.lock().unwrap().clone()
    }

    /// Store a record as-is, bypassing the counters.
    pub fn seed(&self, mut entity: T) -> T {
        entity.meta_mut().stamp_write();
        self.rows.lock().unwrap().push(entity.clone());
        entity
    }

    pub fn ops(&self) -> Vec<TableOp> {
        self.ops.lock().unwrap().clone()
    }

    fn record(&self, op: TableOp) {
        self.ops.lock().unwrap().push(op);
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn set_query_delay(&self, delay: Duration) {
        *self.query_delay.lock().unwrap() = Some(delay);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<T: Entity> fmt::Debug for MemoryTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTable")
            .field("table", &T::TABLE)
            .finish()
    }
}

#[async_trait]
impl<T: Entity> Table<T> for MemoryTable<T> {
    async fn query(&self, filter: &Filter) -> Result<Vec<T>, AppError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let delay = *self.query_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolClosed));
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| filter.matches(*r))
            .cloned()
            .collect())
    }

    async fn insert(&self, mut entity: T) -> Result<T, AppError> {
        self.record(TableOp::InsertStarted);
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolClosed));
        }
        self.enter().await;
        entity.meta_mut().stamp_write();
        self.rows.lock().unwrap().push(entity.clone());
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.leave();
        Ok(entity)
    }

    async fn update(&self, mut entity: T) -> Result<T, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|r| {
            r.meta().partition_key == entity.meta().partition_key
                && r.meta().row_key == entity.meta().row_key
                && r.meta().etag == entity.meta().etag
        }) else {
            return Err(AppError::Conflict {
                table: T::TABLE,
                row_key: entity.meta().row_key.clone(),
            });
        };
        entity.meta_mut().stamp_write();
        *row = entity.clone();
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(entity)
    }

    async fn delete(&self, entity: &T) -> Result<(), AppError> {
        self.enter().await;
        self.rows.lock().unwrap().retain(|r| {
            r.meta().partition_key != entity.meta().partition_key
                || r.meta().row_key != entity.meta().row_key
        });
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.record(TableOp::DeleteFinished);
        self.leave();
        Ok(())
    }

    async fn clear_all(&self) -> Result<bool, AppError> {
        self.rows.lock().unwrap().clear();
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct FakeSource {
    players: Mutex<HashMap<String, PlayerDto>>,
    seasons: Mutex<Vec<SeasonDto>>,
    stats: Mutex<HashMap<(String, String), RankedStats>>,
    leaderboards: Mutex<HashMap<(Region, String), Vec<LeaderboardPlayerDto>>>,
    rate_limited: AtomicBool,
    pub player_calls: AtomicUsize,
    pub stats_calls: AtomicUsize,
    pub leaderboard_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_player(&self, id: &str, name: &str) {
        self.players
            .lock()
            .unwrap()
            .insert(name.to_lowercase(), player_dto(id, name));
    }

    pub fn set_seasons(&self, seasons: Vec<SeasonDto>) {
        *self.seasons.lock().unwrap() = seasons;
    }

    pub fn set_stats(&self, player_id: &str, season_id: &str, stats: RankedStats) {
        self.stats
            .lock()
            .unwrap()
            .insert((player_id.to_string(), season_id.to_string()), stats);
    }

    pub fn set_leaderboard(
        &self,
        region: Region,
        season_id: &str,
        rows: Vec<LeaderboardPlayerDto>,
    ) {
        self.leaderboards
            .lock()
            .unwrap()
            .insert((region, season_id.to_string()), rows);
    }

    pub fn set_rate_limited(&self, limited: bool) {
        self.rate_limited.store(limited, Ordering::SeqCst);
    }

    fn check_limit(&self) -> PubgApiResponse<()> {
        if self.rate_limited.load(Ordering::SeqCst) {
            Err(PubgApiError::RateLimited)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StatsSource for FakeSource {
    async fn get_player(&self, name: &str) -> PubgApiResponse<Option<PlayerDto>> {
        self.player_calls.fetch_add(1, Ordering::SeqCst);
        self.check_limit()?;
        Ok(self
            .players
            .lock()
            .unwrap()
            .get(&name.to_lowercase())
            .cloned())
    }

    async fn get_seasons(&self) -> PubgApiResponse<Vec<SeasonDto>> {
        self.check_limit()?;
        Ok(self.seasons.lock().unwrap().clone())
    }

    async fn get_ranked_stats(
        &self,
        player_id: &str,
        season_id: &str,
    ) -> PubgApiResponse<Option<RankedStats>> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        self.check_limit()?;
        Ok(self
            .stats
            .lock()
            .unwrap()
            .get(&(player_id.to_string(), season_id.to_string()))
            .cloned())
    }

    async fn get_leaderboard(
        &self,
        region: Region,
        season_id: &str,
    ) -> PubgApiResponse<Vec<LeaderboardPlayerDto>> {
        self.leaderboard_calls.fetch_add(1, Ordering::SeqCst);
        self.check_limit()?;
        Ok(self
            .leaderboards
            .lock()
            .unwrap()
            .get(&(region, season_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Records deleted messages; fails every call when `fail` is set.
#[derive(Debug, Default)]
pub struct RecordingCleanup {
    pub deleted: Mutex<Vec<MessageRef>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl MessageCleanup for RecordingCleanup {
    async fn delete_message(&self, message: MessageRef) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Discord(Box::new(serenity::Error::Other(
                "unknown message",
            ))));
        }
        self.deleted.lock().unwrap().push(message);
        Ok(())
    }
}

pub fn player_dto(id: &str, name: &str) -> PlayerDto {
    PlayerDto {
        id: id.to_string(),
        attributes: PlayerAttributes {
            name: name.to_string(),
            shard_id: Some("steam".to_string()),
        },
    }
}

pub fn season_dto(number: i32, current: bool) -> SeasonDto {
    SeasonDto {
        id: Season::id_for_number(number),
        attributes: SeasonAttributes {
            is_current_season: current,
            is_off_season: false,
        },
    }
}

pub fn leaderboard_row(
    id: &str,
    name: &str,
    rank: i32,
    wins: i32,
    games: i32,
) -> LeaderboardPlayerDto {
    LeaderboardPlayerDto {
        kind: "player".to_string(),
        id: id.to_string(),
        attributes: LeaderboardAttributes {
            name: name.to_string(),
            rank,
            stats: LeaderboardStats {
                rank_points: 5000 - rank * 10,
                wins,
                games,
                average_damage: 400.0,
                kda: 3.0,
                tier: "Master".to_string(),
                sub_tier: "1".to_string(),
            },
        },
    }
}
