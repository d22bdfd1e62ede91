use std::env;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::pubg::Region;

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub pubg_api_key: String,
    pub pubg_api_base_url: String,
    pub database_url: String,
    pub pubg_rate_limit_per_minute: NonZeroU32,
    pub season_cache_ttl_minutes: u64,
    pub leaderboard_poller_enabled: bool,
    pub leaderboard_polling_interval_minutes: u64,
    pub leaderboard_regions: Vec<Region>,
    pub leaderboard_region_delay_secs: u64,
    pub session_capacity: usize,
    pub table_batch_size: usize,
    pub rank_image_template_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        const DEFAULT_PUBG_API_BASE_URL: &str = "https://api.pubg.com";
        const DEFAULT_PUBG_RATE_LIMIT_PER_MINUTE: u32 = 10;
        const DEFAULT_SEASON_CACHE_TTL_MINUTES: u64 = 720;
        const DEFAULT_LEADERBOARD_POLLING_INTERVAL_MINUTES: u64 = 120;
        const DEFAULT_LEADERBOARD_REGION_DELAY_SECS: u64 = 10;
        const DEFAULT_SESSION_CAPACITY: usize = 100;
        const DEFAULT_TABLE_BATCH_SIZE: usize = 50;

        let discord_token = env::var("DISCORD_TOKEN")
            .map_err(|_| AppError::Config("DISCORD_TOKEN must be set".into()))?;

        let pubg_api_key = env::var("PUBG_API_KEY")
            .map_err(|_| AppError::Config("PUBG_API_KEY must be set".into()))?;

        let pubg_api_base_url =
            env::var("PUBG_API_BASE_URL").unwrap_or_else(|_| DEFAULT_PUBG_API_BASE_URL.into());

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:pubgstats.db".into());

        let pubg_rate_limit_per_minute = env::var("PUBG_RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse().ok())
            .and_then(NonZeroU32::new)
            .unwrap_or_else(|| {
                NonZeroU32::new(DEFAULT_PUBG_RATE_LIMIT_PER_MINUTE).unwrap_or(NonZeroU32::MIN)
            });

        let season_cache_ttl_minutes =
            parse_var("SEASON_CACHE_TTL_MINUTES", DEFAULT_SEASON_CACHE_TTL_MINUTES)?;

        let leaderboard_poller_enabled = parse_var("LEADERBOARD_POLLER_ENABLED", true)?;

        let leaderboard_polling_interval_minutes = parse_var(
            "LEADERBOARD_POLLING_INTERVAL_MINUTES",
            DEFAULT_LEADERBOARD_POLLING_INTERVAL_MINUTES,
        )?;

        let leaderboard_regions = match env::var("LEADERBOARD_REGIONS") {
            Ok(raw) => parse_regions(&raw)?,
            Err(_) => Region::ALL.to_vec(),
        };

        let leaderboard_region_delay_secs = parse_var(
            "LEADERBOARD_REGION_DELAY_SECS",
            DEFAULT_LEADERBOARD_REGION_DELAY_SECS,
        )?;

        let session_capacity = parse_var("SESSION_CAPACITY", DEFAULT_SESSION_CAPACITY)?;

        let table_batch_size = parse_var("TABLE_BATCH_SIZE", DEFAULT_TABLE_BATCH_SIZE)?;

        let rank_image_template_url = env::var("RANK_IMAGE_TEMPLATE_URL")
            .ok()
            .filter(|v| !v.is_empty());

        let config = Self {
            discord_token,
            pubg_api_key,
            pubg_api_base_url,
            database_url,
            pubg_rate_limit_per_minute,
            season_cache_ttl_minutes,
            leaderboard_poller_enabled,
            leaderboard_polling_interval_minutes,
            leaderboard_regions,
            leaderboard_region_delay_secs,
            session_capacity,
            table_batch_size,
            rank_image_template_url,
        };
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.season_cache_ttl_minutes == 0 {
            return Err(AppError::Config(
                "SEASON_CACHE_TTL_MINUTES must be at least 1".into(),
            ));
        }
        if self.leaderboard_polling_interval_minutes == 0 {
            return Err(AppError::Config(
                "LEADERBOARD_POLLING_INTERVAL_MINUTES must be at least 1".into(),
            ));
        }
        if self.session_capacity == 0 {
            return Err(AppError::Config("SESSION_CAPACITY must be at least 1".into()));
        }
        if self.table_batch_size == 0 {
            return Err(AppError::Config("TABLE_BATCH_SIZE must be at least 1".into()));
        }
        if self.leaderboard_poller_enabled && self.leaderboard_regions.is_empty() {
            return Err(AppError::Config(
                "LEADERBOARD_REGIONS must name at least one region".into(),
            ));
        }
        Ok(())
    }

    pub fn season_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.season_cache_ttl_minutes * 60)
    }

    pub fn leaderboard_polling_interval(&self) -> Duration {
        Duration::from_secs(self.leaderboard_polling_interval_minutes * 60)
    }

    pub fn leaderboard_region_delay(&self) -> Duration {
        Duration::from_secs(self.leaderboard_region_delay_secs)
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{name} has an invalid value: {raw}"))),
        _ => Ok(default),
    }
}

fn parse_regions(raw: &str) -> Result<Vec<Region>, AppError> {
    let mut regions = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let region: Region = part.parse()?;
        if !regions.contains(&region) {
            regions.push(region);
        }
    }
    Ok(regions)
}
