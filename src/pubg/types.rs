//! JSON:API payloads returned by the PUBG API and the client error type.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PubgApiError {
    #[error("request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("too many requests")]
    RateLimited,

    #[error("unexpected status: {0}")]
    Status(StatusCode),
}

pub type PubgApiResponse<T> = Result<T, PubgApiError>;

#[derive(Deserialize, Debug)]
pub(crate) struct PlayersResponse {
    #[serde(default)]
    pub data: Vec<PlayerDto>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PlayerDto {
    pub id: String,
    pub attributes: PlayerAttributes,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAttributes {
    pub name: String,
    #[serde(default)]
    pub shard_id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct SeasonsResponse {
    #[serde(default)]
    pub data: Vec<SeasonDto>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SeasonDto {
    pub id: String,
    pub attributes: SeasonAttributes,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeasonAttributes {
    pub is_current_season: bool,
    #[serde(rename = "isOffseason")]
    pub is_off_season: bool,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RankedStatsResponse {
    pub data: RankedStatsData,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RankedStatsData {
    pub attributes: RankedStats,
}

/// Ranked stats of one player for one season, all game modes.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RankedStats {
    #[serde(rename = "rankedGameModeStats", default)]
    pub modes: RankedModes,
}

impl RankedStats {
    pub fn squad_fpp(&self) -> Option<&RankedModeStats> {
        self.modes.squad_fpp.as_ref()
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RankedModes {
    #[serde(rename = "squad-fpp", default)]
    pub squad_fpp: Option<RankedModeStats>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RankedModeStats {
    pub current_tier: RankTier,
    pub current_rank_point: i32,
    pub best_tier: RankTier,
    pub best_rank_point: i32,
    pub rounds_played: i32,
    pub avg_rank: f64,
    pub top10_ratio: f64,
    pub win_ratio: f64,
    pub kills: i32,
    pub deaths: i32,
    pub kda: f64,
    pub damage_dealt: f64,
    pub wins: i32,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RankTier {
    pub tier: String,
    pub sub_tier: String,
}

#[derive(Deserialize, Debug)]
pub(crate) struct LeaderboardResponse {
    #[serde(default)]
    pub included: Vec<LeaderboardPlayerDto>,
}

/// One row of a leaderboard snapshot.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct LeaderboardPlayerDto {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub id: String,
    pub attributes: LeaderboardAttributes,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardAttributes {
    pub name: String,
    pub rank: i32,
    #[serde(default)]
    pub stats: LeaderboardStats,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LeaderboardStats {
    pub rank_points: i32,
    pub wins: i32,
    pub games: i32,
    pub average_damage: f64,
    pub kda: f64,
    pub tier: String,
    pub sub_tier: String,
}
