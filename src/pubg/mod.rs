//! PUBG API access: the [`StatsSource`] seam and its HTTP implementation.

use std::fmt::Debug;

use async_trait::async_trait;

mod client;
pub mod metrics;
mod region;
pub mod types;

pub use client::PubgClient;
pub use region::Region;
pub use types::{
    LeaderboardPlayerDto, PlayerDto, PubgApiError, PubgApiResponse, RankTier, RankedModeStats,
    RankedStats, SeasonDto,
};

/// Upstream source of player, season, stats and leaderboard data.
///
/// Absence is not an error: unknown players and stats are `None`, unknown
/// leaderboards are empty. [`PubgApiError::RateLimited`] is reported as its own
/// variant so callers can tell the user to retry later.
#[async_trait]
pub trait StatsSource: Send + Sync + Debug {
    async fn get_player(&self, name: &str) -> PubgApiResponse<Option<PlayerDto>>;

    async fn get_seasons(&self) -> PubgApiResponse<Vec<SeasonDto>>;

    async fn get_ranked_stats(
        &self,
        player_id: &str,
        season_id: &str,
    ) -> PubgApiResponse<Option<RankedStats>>;

    async fn get_leaderboard(
        &self,
        region: Region,
        season_id: &str,
    ) -> PubgApiResponse<Vec<LeaderboardPlayerDto>>;
}
