use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{Span, debug, error, info, instrument, warn};

use super::batch::run_batched;
use crate::config::Config;
use crate::db::{EntityMeta, Filter, LeaderboardEntry, Table};
use crate::error::AppError;
use crate::players::PlayerRegistry;
use crate::pubg::{LeaderboardPlayerDto, Region, StatsSource};
use crate::seasons::SeasonCatalog;

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub interval: Duration,
    pub regions: Vec<Region>,
    pub region_delay: Duration,
    pub batch_size: usize,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.leaderboard_polling_interval(),
            regions: config.leaderboard_regions.clone(),
            region_delay: config.leaderboard_region_delay(),
            batch_size: config.table_batch_size,
        }
    }
}

/// Outcome of one (region, season) pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub deleted: usize,
    pub inserted: usize,
    pub players_checked: usize,
    /// The source had no snapshot, the partition was left as is.
    pub skipped: bool,
}

/// Keeps the leaderboard table equal to the latest PUBG snapshots.
#[derive(Debug)]
pub struct LeaderboardSyncEngine {
    entries: Arc<dyn Table<LeaderboardEntry>>,
    source: Arc<dyn StatsSource>,
    catalog: Arc<SeasonCatalog>,
    players: Arc<PlayerRegistry>,
    settings: SyncSettings,
    running: AtomicBool,
}

impl LeaderboardSyncEngine {
    pub fn new(
        entries: Arc<dyn Table<LeaderboardEntry>>,
        source: Arc<dyn StatsSource>,
        catalog: Arc<SeasonCatalog>,
        players: Arc<PlayerRegistry>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            entries,
            source,
            catalog,
            players,
            settings,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the polling loop. Returns `None` when the loop is already running.
    ///
    /// The loop stops once `shutdown` turns `true` (or its sender is dropped), never in
    /// the middle of a partition pass.
    pub fn start(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("🔄 Leaderboard poller already running, ignoring start");
            return None;
        }

        let engine = Arc::clone(self);
        Some(tokio::spawn(async move {
            engine.run(shutdown).await;
            engine.running.store(false, Ordering::SeqCst);
        }))
    }

    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.settings.interval.as_secs(),
            regions = self.settings.regions.len(),
            "🔄 Leaderboard poller started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            if !self.tick(&mut shutdown).await {
                break;
            }
        }

        info!("🔄 Leaderboard poller stopped");
    }

    /// Sync every configured region for the current season.
    ///
    /// Returns `false` when shutdown was requested during the pass.
    #[instrument(skip_all, fields(season))]
    pub async fn tick(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let season = match self.catalog.current_season().await {
            Ok(Some(season)) => season,
            Ok(None) => {
                warn!("🔄 ⚠️ No current season stored, skipping leaderboard sync");
                return true;
            }
            Err(e) => {
                error!(error = ?e, "🔄 ❌ Could not resolve current season");
                return true;
            }
        };
        Span::current().record("season", season.season_id.as_str());

        for (i, region) in self.settings.regions.iter().enumerate() {
            if i > 0 {
                tokio::select! {
                    _ = sleep(self.settings.region_delay) => {}
                    _ = shutdown.changed() => return false,
                }
            }

            match self.sync_partition(*region, &season.season_id).await {
                Ok(report) if report.skipped => {}
                Ok(report) => info!(
                    region = %region,
                    deleted = report.deleted,
                    inserted = report.inserted,
                    players = report.players_checked,
                    "🔄 ✅ Leaderboard synced"
                ),
                Err(e) => error!(region = %region, error = ?e, "🔄 ❌ Leaderboard sync failed"),
            }
        }

        true
    }

    /// Replace the stored entries of one (region, season) with the current snapshot.
    #[instrument(skip(self), fields(region = %region))]
    pub async fn sync_partition(
        &self,
        region: Region,
        season_id: &str,
    ) -> Result<SyncReport, AppError> {
        let snapshot = self.source.get_leaderboard(region, season_id).await?;
        if snapshot.is_empty() {
            debug!("🔄 Empty leaderboard snapshot, partition left untouched");
            return Ok(SyncReport {
                skipped: true,
                ..Default::default()
            });
        }

        let existing = self
            .entries
            .query(
                &Filter::all()
                    .eq("region", region.as_str())
                    .eq("season", season_id),
            )
            .await?;

        let table = self.entries.as_ref();
        let batch_size = self.settings.batch_size;

        let deleted = run_batched(existing.iter(), batch_size, move |e| table.delete(e)).await?;

        let names: Vec<String> = snapshot
            .iter()
            .map(|p| p.attributes.name.clone())
            .collect();
        let fresh = snapshot
            .into_iter()
            .map(|p| entry_from_snapshot(region, season_id, p));
        let inserted = run_batched(fresh, batch_size, move |e| table.insert(e)).await?;

        let players_checked = self.discover_players(&names).await;

        Ok(SyncReport {
            deleted,
            inserted,
            players_checked,
            skipped: false,
        })
    }

    /// Make sure every leaderboard player has a stored record.
    async fn discover_players(&self, names: &[String]) -> usize {
        let mut checked = 0;
        for name in names {
            match self.players.get_or_create(name).await {
                Ok(_) => checked += 1,
                Err(e) if e.is_rate_limited() => {
                    warn!(
                        checked,
                        remaining = names.len() - checked,
                        "🔄 ⚠️ Rate limited, stopping player discovery"
                    );
                    break;
                }
                Err(e) => warn!(player = %name, error = ?e, "🔄 ⚠️ Player discovery failed"),
            }
        }
        checked
    }
}

fn entry_from_snapshot(
    region: Region,
    season_id: &str,
    row: LeaderboardPlayerDto,
) -> LeaderboardEntry {
    let stats = row.attributes.stats;
    LeaderboardEntry {
        meta: EntityMeta {
            partition_key: format!("{}_{}", region.as_str(), season_id),
            ..Default::default()
        },
        region: region.as_str().to_string(),
        season: season_id.to_string(),
        rank: row.attributes.rank,
        player_id: row.id,
        name: row.attributes.name,
        rank_points: stats.rank_points,
        win_count: stats.wins,
        game_count: stats.games,
        win_ratio: LeaderboardEntry::win_ratio(stats.wins, stats.games),
        avg_damage: stats.average_damage,
        kda_ratio: stats.kda,
        tier: stats.tier,
        sub_tier: stats.sub_tier,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::db::{Player, Season};
    use crate::testing::{FakeSource, MemoryTable, TableOp, leaderboard_row};

    const SEASON: i32 = 31;

    struct Fixture {
        entries: Arc<MemoryTable<LeaderboardEntry>>,
        players: Arc<MemoryTable<Player>>,
        source: Arc<FakeSource>,
        engine: Arc<LeaderboardSyncEngine>,
    }

    fn fixture(regions: Vec<Region>, with_season: bool) -> Fixture {
        let entries = Arc::new(MemoryTable::new());
        let players = Arc::new(MemoryTable::new());
        let seasons = Arc::new(MemoryTable::new());
        if with_season {
            seasons.seed(Season::new(Season::id_for_number(SEASON), true, false));
        }
        let source = Arc::new(FakeSource::new());

        let catalog = Arc::new(SeasonCatalog::new(seasons, Duration::from_secs(3600)));
        let registry = Arc::new(PlayerRegistry::new(players.clone(), source.clone()));
        let engine = Arc::new(LeaderboardSyncEngine::new(
            entries.clone(),
            source.clone(),
            catalog,
            registry,
            SyncSettings {
                interval: Duration::from_secs(120 * 60),
                regions,
                region_delay: Duration::from_secs(10),
                batch_size: 2,
            },
        ));

        Fixture {
            entries,
            players,
            source,
            engine,
        }
    }

    fn season_id() -> String {
        Season::id_for_number(SEASON)
    }

    fn stale_entry(region: Region, season: &str, rank: i32) -> LeaderboardEntry {
        entry_from_snapshot(region, season, leaderboard_row("account.old", "Old", rank, 1, 2))
    }

    #[tokio::test]
    async fn pass_replaces_partition_with_snapshot() {
        let f = fixture(vec![Region::PcEu], true);
        let season = season_id();
        for rank in 1..=5 {
            f.entries.seed(stale_entry(Region::PcEu, &season, rank));
        }
        f.entries.seed(stale_entry(Region::PcNa, &season, 1));
        f.source.set_leaderboard(
            Region::PcEu,
            &season,
            vec![
                leaderboard_row("account.1", "Alpha", 1, 10, 40),
                leaderboard_row("account.2", "Bravo", 2, 0, 0),
                leaderboard_row("account.3", "Charlie", 3, 5, 20),
            ],
        );
        for (id, name) in [
            ("account.1", "Alpha"),
            ("account.2", "Bravo"),
            ("account.3", "Charlie"),
        ] {
            f.source.add_player(id, name);
        }

        let report = f.engine.sync_partition(Region::PcEu, &season).await.unwrap();

        assert_eq!(report.deleted, 5);
        assert_eq!(report.inserted, 3);
        assert_eq!(report.players_checked, 3);

        let rows = f.entries.rows();
        let mut eu: Vec<_> = rows.iter().filter(|e| e.region == "pc-eu").collect();
        eu.sort_by_key(|e| e.rank);
        assert_eq!(eu.len(), 3);
        assert!(eu.iter().all(|e| e.player_id != "account.old"));
        assert_eq!(eu[0].name, "Alpha");
        assert_eq!(eu[0].win_ratio, 0.25);
        assert_eq!(eu[1].win_ratio, 0.0);
        assert_eq!(eu[2].season, season);
        assert_eq!(rows.iter().filter(|e| e.region == "pc-na").count(), 1);

        assert_eq!(f.players.rows().len(), 3);
        assert!(MemoryTable::<LeaderboardEntry>::count(&f.entries.max_in_flight) <= 2);
    }

    #[tokio::test]
    async fn old_partition_is_emptied_before_first_insert() {
        let f = fixture(vec![Region::PcEu], true);
        let season = season_id();
        for rank in 1..=5 {
            f.entries.seed(stale_entry(Region::PcEu, &season, rank));
        }
        f.source.set_leaderboard(
            Region::PcEu,
            &season,
            (1..=3)
                .map(|r| leaderboard_row(&format!("account.{r}"), &format!("P{r}"), r, 1, 2))
                .collect(),
        );

        f.engine.sync_partition(Region::PcEu, &season).await.unwrap();

        let ops = f.entries.ops();
        let first_insert = ops
            .iter()
            .position(|op| *op == TableOp::InsertStarted)
            .unwrap();
        let deletes_before = ops[..first_insert]
            .iter()
            .filter(|op| **op == TableOp::DeleteFinished)
            .count();
        assert_eq!(deletes_before, 5);
        assert_eq!(ops.len(), 8);
    }

    #[tokio::test]
    async fn empty_snapshot_leaves_partition_untouched() {
        let f = fixture(vec![Region::PcEu], true);
        f.entries.seed(stale_entry(Region::PcEu, "y", 1));

        let report = f.engine.sync_partition(Region::PcEu, "y").await.unwrap();

        assert!(report.skipped);
        assert_eq!(f.entries.rows().len(), 1);
        assert_eq!(MemoryTable::<LeaderboardEntry>::count(&f.entries.deletes), 0);
        assert_eq!(MemoryTable::<LeaderboardEntry>::count(&f.entries.inserts), 0);
        assert_eq!(MemoryTable::<LeaderboardEntry>::count(&f.entries.queries), 0);
    }

    #[tokio::test]
    async fn known_players_are_not_refetched() {
        let f = fixture(vec![Region::PcEu], true);
        let season = season_id();
        f.source.set_leaderboard(
            Region::PcEu,
            &season,
            vec![leaderboard_row("account.1", "Alpha", 1, 1, 1)],
        );
        f.players.seed(Player::new("account.1", "Alpha"));

        let report = f.engine.sync_partition(Region::PcEu, &season).await.unwrap();

        assert_eq!(report.players_checked, 1);
        assert_eq!(f.source.player_calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.players.rows().len(), 1);
    }

    #[tokio::test]
    async fn rate_limited_snapshot_fails_the_pass() {
        let f = fixture(vec![Region::PcEu], true);
        let season = season_id();
        f.entries.seed(stale_entry(Region::PcEu, &season, 1));
        f.source.set_rate_limited(true);

        let err = f.engine.sync_partition(Region::PcEu, &season).await.unwrap_err();

        assert!(err.is_rate_limited());
        assert_eq!(f.entries.rows().len(), 1);
    }

    #[tokio::test]
    async fn discovery_stops_at_first_rate_limit() {
        let f = fixture(vec![Region::PcEu], true);
        let names = vec!["Delta".to_string(), "Echo".to_string(), "Foxtrot".to_string()];
        f.source.set_rate_limited(true);

        assert_eq!(f.engine.discover_players(&names).await, 0);
        assert_eq!(f.source.player_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_continues_after_failing_region() {
        let f = fixture(vec![Region::PcAs, Region::PcEu], true);
        let season = season_id();
        f.source.set_leaderboard(
            Region::PcEu,
            &season,
            vec![leaderboard_row("account.1", "Alpha", 1, 1, 1)],
        );
        f.source.add_player("account.1", "Alpha");
        f.entries.set_fail_queries(true);
        f.source.set_leaderboard(
            Region::PcAs,
            &season,
            vec![leaderboard_row("account.9", "Kilo", 1, 1, 1)],
        );

        let (_tx, mut rx) = watch::channel(false);
        // Queries fail for every region; the tick must still visit both.
        assert!(f.engine.tick(&mut rx).await);
        assert_eq!(f.source.leaderboard_calls.load(Ordering::SeqCst), 2);

        f.entries.set_fail_queries(false);
        assert!(f.engine.tick(&mut rx).await);
        assert_eq!(f.entries.rows().len(), 2);
    }

    #[tokio::test]
    async fn tick_without_current_season_is_skipped() {
        let f = fixture(vec![Region::PcEu], false);
        let (_tx, mut rx) = watch::channel(false);

        assert!(f.engine.tick(&mut rx).await);
        assert_eq!(f.source.leaderboard_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_a_no_op_and_shutdown_stops_the_loop() {
        let f = fixture(vec![Region::PcEu], true);
        let (tx, rx) = watch::channel(false);

        let handle = f.engine.start(rx.clone()).unwrap();
        assert!(f.engine.start(rx).is_none());
        assert!(f.engine.is_running());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(f.source.leaderboard_calls.load(Ordering::SeqCst), 1);

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert!(!f.engine.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_ticks_on_interval() {
        let f = fixture(vec![Region::PcEu], true);
        let (tx, rx) = watch::channel(false);
        let handle = f.engine.start(rx).unwrap();

        tokio::time::sleep(Duration::from_secs(120 * 60 + 1)).await;
        assert_eq!(f.source.leaderboard_calls.load(Ordering::SeqCst), 2);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
