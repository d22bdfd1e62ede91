use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::db::{Filter, Player, Table, newest_first};
use crate::error::AppError;
use crate::pubg::StatsSource;

/// Player records keyed by lowercase name, created on demand from the PUBG API.
#[derive(Debug)]
pub struct PlayerRegistry {
    table: Arc<dyn Table<Player>>,
    source: Arc<dyn StatsSource>,
    creation_lock: Mutex<()>,
}

impl PlayerRegistry {
    pub fn new(table: Arc<dyn Table<Player>>, source: Arc<dyn StatsSource>) -> Self {
        Self {
            table,
            source,
            creation_lock: Mutex::new(()),
        }
    }

    /// Stored player for `name`, fetched from the API and saved on a miss.
    ///
    /// `None` when the API does not know the player either.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, name: &str) -> Result<Option<Player>, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let key = name.to_lowercase();

        if let Some(player) = self.find_by_name(&key).await? {
            return Ok(Some(player));
        }

        let _guard = self.creation_lock.lock().await;
        if let Some(player) = self.find_by_name(&key).await? {
            return Ok(Some(player));
        }

        let Some(dto) = self.source.get_player(name).await? else {
            debug!("🗄️ Player unknown to the API");
            return Ok(None);
        };

        self.upsert(Player::new(dto.id, dto.attributes.name))
            .await
            .map(Some)
    }

    async fn find_by_name(&self, key: &str) -> Result<Option<Player>, AppError> {
        let mut found = self.table.query(&Filter::all().eq("name", key)).await?;
        newest_first(&mut found);
        Ok(found.into_iter().next())
    }

    /// Store `player` as the only record for its id.
    ///
    /// Older duplicates are deleted; the newest record is updated in place, so a
    /// changed display name replaces the stored one.
    async fn upsert(&self, player: Player) -> Result<Player, AppError> {
        let mut existing = self
            .table
            .query(&Filter::all().eq_ignore_case("player_id", player.player_id.as_str()))
            .await?;
        newest_first(&mut existing);

        let mut existing = existing.into_iter();
        let newest = existing.next();
        for duplicate in existing {
            info!(
                player_id = %duplicate.player_id,
                row_key = %duplicate.meta.row_key,
                "🗄️ Removing duplicate player record"
            );
            self.table.delete(&duplicate).await?;
        }

        match newest {
            Some(mut stored) => {
                if stored.name == player.name && stored.display_name == player.display_name {
                    return Ok(stored);
                }
                stored.name = player.name;
                stored.display_name = player.display_name;
                self.table.update(stored).await
            }
            None => {
                let player = self.table.insert(player).await?;
                info!(
                    player_id = %player.player_id,
                    name = %player.display_name,
                    "🗄️ Player registered"
                );
                Ok(player)
            }
        }
    }

    /// Display names starting with `prefix` (case-insensitive), sorted.
    pub async fn search(&self, prefix: &str, limit: usize) -> Result<Vec<String>, AppError> {
        let prefix = prefix.trim().to_lowercase();
        let filter = match next_prefix(&prefix) {
            Some(upper) => Filter::all().ge("name", prefix.as_str()).lt("name", upper),
            None => Filter::all(),
        };

        let mut players = self.table.query(&filter).await?;
        players.sort_by(|a, b| a.name.cmp(&b.name));
        players.dedup_by(|a, b| a.name == b.name);

        Ok(players
            .into_iter()
            .take(limit)
            .map(|p| p.shown_name().to_string())
            .collect())
    }
}

/// Smallest string greater than every string starting with `prefix`.
fn next_prefix(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    let last = chars.pop()?;
    let bumped = char::from_u32(u32::from(last) + 1)?;
    chars.push(bumped);
    Some(chars.into_iter().collect())
}
