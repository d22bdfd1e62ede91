use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::cache::TtlCache;
use crate::db::{RANKED_SEASON_PREFIX, Season, Table};
use crate::error::AppError;
use crate::pubg::{SeasonDto, StatsSource};

/// Season number meaning "whatever season is current".
pub const CURRENT_SEASON: i32 = -1;

/// First season with ranked squad-FPP stats.
pub const MIN_RANKED_SEASON: i32 = 7;

/// Cached view of the season table.
#[derive(Debug)]
pub struct SeasonCatalog {
    cache: TtlCache<Season>,
}

impl SeasonCatalog {
    pub fn new(table: Arc<dyn Table<Season>>, ttl: Duration) -> Self {
        Self {
            cache: TtlCache::new(table, ttl),
        }
    }

    pub async fn seasons(&self) -> Result<Arc<Vec<Season>>, AppError> {
        self.cache.get_all(true).await
    }

    /// The ranked season flagged as current.
    ///
    /// When several ranked seasons carry the flag the first stored one wins and the
    /// inconsistency is logged.
    pub async fn current_season(&self) -> Result<Option<Season>, AppError> {
        let seasons = self.seasons().await?;
        let mut current = seasons
            .iter()
            .filter(|s| s.is_current_season && s.season_id.starts_with(RANKED_SEASON_PREFIX));

        let first = current.next().cloned();
        let extra = current.count();
        if extra > 0 {
            warn!(
                season = ?first.as_ref().map(|s| &s.season_id),
                others = extra,
                "🗄️ More than one current ranked season stored, using the first"
            );
        }

        Ok(first)
    }

    /// Season by number, [`CURRENT_SEASON`] resolves to the current one.
    pub async fn season(&self, number: i32) -> Result<Option<Season>, AppError> {
        if number == CURRENT_SEASON {
            return self.current_season().await;
        }

        let id = Season::id_for_number(number);
        Ok(self
            .seasons()
            .await?
            .iter()
            .find(|s| s.season_id == id)
            .cloned())
    }

    /// Season a user asked for. Numbers past the current season fall back to it.
    pub async fn resolve(&self, requested: i32) -> Result<Option<Season>, AppError> {
        let Some(current) = self.current_season().await? else {
            return Ok(None);
        };

        match current.season_number() {
            Some(n) if requested == CURRENT_SEASON || requested >= n => Ok(Some(current)),
            _ => self.season(requested).await,
        }
    }

    /// Replace the stored seasons with the ones published by `source`.
    ///
    /// Returns `false` when the source has no seasons or the table could not be
    /// cleared; the stored seasons are left alone in both cases.
    #[instrument(skip_all)]
    pub async fn refresh_from(&self, source: &dyn StatsSource) -> Result<bool, AppError> {
        let seasons = source.get_seasons().await?;
        if seasons.is_empty() {
            warn!("🗄️ No seasons returned, keeping the stored ones");
            return Ok(false);
        }

        let table = self.cache.table();
        if !table.clear_all().await? {
            warn!("🗄️ Could not clear the season table");
            return Ok(false);
        }

        let count = seasons.len();
        let written = insert_all(table.as_ref(), seasons).await;
        // The table was cleared, so the cached set is stale even on failure.
        self.cache.invalidate().await;
        written?;

        info!(count, "🗄️ Season table refreshed");
        Ok(true)
    }
}

async fn insert_all(table: &dyn Table<Season>, seasons: Vec<SeasonDto>) -> Result<(), AppError> {
    for season in seasons {
        table
            .insert(Season::new(
                season.id,
                season.attributes.is_current_season,
                season.attributes.is_off_season,
            ))
            .await?;
    }
    Ok(())
}
