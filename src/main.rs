use std::sync::Arc;

use poise::serenity_prelude::{ClientBuilder, GatewayIntents};
use tokio::sync::watch;
use tracing::{error, info};

use pubgstats::config::Config;
use pubgstats::db::{self, LeaderboardEntry, Player, Season, SqliteTable, Table};
use pubgstats::discord::{Data, create_framework};
use pubgstats::error::AppError;
use pubgstats::leaderboard::{LeaderboardReader, LeaderboardSyncEngine, SyncSettings};
use pubgstats::logging;
use pubgstats::players::PlayerRegistry;
use pubgstats::pubg::metrics::RequestMetrics;
use pubgstats::pubg::{PubgClient, StatsSource};
use pubgstats::seasons::SeasonCatalog;
use pubgstats::session::{DiscordCleanup, SessionStore};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init();

    let config = Config::from_env()?;
    info!("🚀 Starting pubgstats");

    let pool = db::connect(&config.database_url).await?;
    let seasons: Arc<dyn Table<Season>> = Arc::new(SqliteTable::new(pool.clone()));
    let players: Arc<dyn Table<Player>> = Arc::new(SqliteTable::new(pool.clone()));
    let entries: Arc<dyn Table<LeaderboardEntry>> = Arc::new(SqliteTable::new(pool));

    let metrics = RequestMetrics::new("pubg");
    let source: Arc<dyn StatsSource> = Arc::new(PubgClient::new(
        config.pubg_api_base_url.clone(),
        config.pubg_api_key.clone(),
        config.pubg_rate_limit_per_minute,
        metrics.clone(),
    ));
    tokio::spawn(metrics.log_loop());

    let catalog = Arc::new(SeasonCatalog::new(seasons, config.season_cache_ttl()));
    let registry = Arc::new(PlayerRegistry::new(players, source.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = if config.leaderboard_poller_enabled {
        let engine = Arc::new(LeaderboardSyncEngine::new(
            entries.clone(),
            source.clone(),
            catalog.clone(),
            registry.clone(),
            SyncSettings::from_config(&config),
        ));
        engine.start(shutdown_rx)
    } else {
        info!("🔄 Leaderboard poller disabled");
        None
    };

    let session_capacity = config.session_capacity;
    let rank_image_template = config.rank_image_template_url.clone();
    let framework = create_framework(move |http| Data {
        catalog,
        players: registry,
        leaderboard: LeaderboardReader::new(entries),
        source,
        sessions: SessionStore::new(session_capacity, Arc::new(DiscordCleanup::new(http))),
        rank_image_template,
    });

    let mut client = ClientBuilder::new(&config.discord_token, GatewayIntents::non_privileged())
        .framework(framework)
        .await?;

    info!("🎮 Connecting to Discord gateway");
    tokio::select! {
        res = client.start() => {
            if let Err(e) = res {
                error!(error = ?e, "🎮 ❌ Discord client stopped");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Shutdown requested");
        }
    }

    client.shard_manager.shutdown_all().await;
    let _ = shutdown_tx.send(true);
    if let Some(poller) = poller {
        if let Err(e) = poller.await {
            error!(error = ?e, "🔄 ❌ Leaderboard poller task failed");
        }
    }

    info!("👋 Bye");
    Ok(())
}
