use std::fmt::Debug;
use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use reqwest::{StatusCode, header::ACCEPT};
use serde::de::DeserializeOwned;
use tracing::{error, trace, warn};

use super::StatsSource;
use super::metrics::RequestMetrics;
use super::region::Region;
use super::types::{
    LeaderboardPlayerDto, LeaderboardResponse, PlayerDto, PlayersResponse, PubgApiError,
    PubgApiResponse, RankedStats, RankedStatsResponse, SeasonDto, SeasonsResponse,
};

/// Platform shard used for player, season and stats lookups.
const PLAYER_SHARD: &str = "steam";

pub struct PubgClient {
    client: reqwest::Client,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    base_url: String,
    /// PUBG API Key
    key: String,
    metrics: Arc<RequestMetrics>,
}

impl Debug for PubgClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubgClient")
            .field("base_url", &self.base_url)
            .field("requests", &self.metrics.total())
            .finish()
    }
}

impl PubgClient {
    pub fn new(
        base_url: impl Into<String>,
        key: String,
        requests_per_minute: NonZeroU32,
        metrics: Arc<RequestMetrics>,
    ) -> Self {
        let base_url: String = base_url.into();

        Self {
            client: reqwest::Client::new(),
            limiter: RateLimiter::direct(Quota::per_minute(requests_per_minute)),
            base_url: base_url.trim_end_matches('/').to_string(),
            key,
            metrics,
        }
    }

    pub fn metrics(&self) -> Arc<RequestMetrics> {
        self.metrics.clone()
    }

    /// GET `path` relative to the base URL. `404` is mapped to `None`.
    pub async fn request<T: DeserializeOwned + Debug>(
        &self,
        path: &str,
    ) -> PubgApiResponse<Option<T>> {
        self.limiter.until_ready().await;
        self.metrics.inc();

        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        trace!(url = %url, "🛰️ GET");

        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.key)
            .header(ACCEPT, "application/vnd.api+json")
            .send()
            .await?;

        match res.status() {
            StatusCode::OK => Ok(Some(res.json().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::TOO_MANY_REQUESTS => {
                self.metrics.inc_rate_limited();
                warn!(url = %url, "🛰️ ⚠️ PUBG API rate limit hit");
                Err(PubgApiError::RateLimited)
            }
            status => {
                let body = res.text().await.unwrap_or_default();
                error!(url = %url, %status, body = %body, "🛰️ ❌ PUBG API request failed");
                Err(PubgApiError::Status(status))
            }
        }
    }

    pub async fn get_players(&self, names: &[&str]) -> PubgApiResponse<Vec<PlayerDto>> {
        let names = names
            .iter()
            .map(|n| urlencoding::encode(n).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        let path = format!("shards/{PLAYER_SHARD}/players?filter[playerNames]={names}");

        let res: Option<PlayersResponse> = self.request(&path).await?;
        Ok(res.map(|r| r.data).unwrap_or_default())
    }
}

#[async_trait]
impl StatsSource for PubgClient {
    async fn get_player(&self, name: &str) -> PubgApiResponse<Option<PlayerDto>> {
        trace!("[PUBG::CLIENT] get_player {}", name);
        if name.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.get_players(&[name]).await?.into_iter().next())
    }

    async fn get_seasons(&self) -> PubgApiResponse<Vec<SeasonDto>> {
        trace!("[PUBG::CLIENT] get_seasons");
        let path = format!("shards/{PLAYER_SHARD}/seasons");
        let res: Option<SeasonsResponse> = self.request(&path).await?;
        Ok(res.map(|r| r.data).unwrap_or_default())
    }

    async fn get_ranked_stats(
        &self,
        player_id: &str,
        season_id: &str,
    ) -> PubgApiResponse<Option<RankedStats>> {
        trace!("[PUBG::CLIENT] get_ranked_stats {} in {}", player_id, season_id);
        if player_id.is_empty() || season_id.is_empty() {
            return Ok(None);
        }
        let path = format!("shards/{PLAYER_SHARD}/players/{player_id}/seasons/{season_id}/ranked");
        let res: Option<RankedStatsResponse> = self.request(&path).await?;
        Ok(res.map(|r| r.data.attributes))
    }

    async fn get_leaderboard(
        &self,
        region: Region,
        season_id: &str,
    ) -> PubgApiResponse<Vec<LeaderboardPlayerDto>> {
        trace!("[PUBG::CLIENT] get_leaderboard {} in {}", region, season_id);
        let path = format!("shards/{region}/leaderboards/{season_id}/squad-fpp");
        let res: Option<LeaderboardResponse> = self.request(&path).await?;

        Ok(res
            .map(|r| r.included)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.kind.is_empty() || p.kind == "player")
            .collect())
    }
}
