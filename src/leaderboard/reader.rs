use std::sync::Arc;

use tracing::warn;

use crate::db::{Filter, LeaderboardEntry, Table};
use crate::error::AppError;
use crate::pubg::Region;

/// PUBG publishes at most this many entries per leaderboard.
pub const MAX_LEADERBOARD_SIZE: usize = 500;

/// Read side of the synced leaderboard table.
#[derive(Debug, Clone)]
pub struct LeaderboardReader {
    entries: Arc<dyn Table<LeaderboardEntry>>,
}

impl LeaderboardReader {
    pub fn new(entries: Arc<dyn Table<LeaderboardEntry>>) -> Self {
        Self { entries }
    }

    /// Best `count` entries of a region and season, ordered by rank.
    pub async fn top(
        &self,
        region: Region,
        season_id: &str,
        count: usize,
    ) -> Result<Vec<LeaderboardEntry>, AppError> {
        let count = if count > MAX_LEADERBOARD_SIZE {
            warn!(count, "🗄️ ⚠️ Requested more leaderboard entries than exist, capping");
            MAX_LEADERBOARD_SIZE
        } else {
            count
        };

        let mut entries = self
            .entries
            .query(
                &Filter::all()
                    .eq("region", region.as_str())
                    .eq("season", season_id)
                    .le("rank", count as i64),
            )
            .await?;
        entries.sort_by_key(|e| e.rank);
        entries.truncate(count);

        Ok(entries)
    }

    /// Leaderboard entry of a player in a season, the best rank across regions.
    pub async fn entry_for(
        &self,
        display_name: &str,
        season_id: &str,
    ) -> Result<Option<LeaderboardEntry>, AppError> {
        let entries = self
            .entries
            .query(
                &Filter::all()
                    .eq("name", display_name)
                    .eq("season", season_id),
            )
            .await?;

        Ok(entries.into_iter().min_by_key(|e| e.rank))
    }
}
