use sqlx::FromRow;

use super::table::{Entity, EntityMeta, Value};

/// Id prefix of ranked squad-FPP seasons on PC.
pub const RANKED_SEASON_PREFIX: &str = "division.bro.official.pc-2018-";

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Season {
    #[sqlx(flatten)]
    pub meta: EntityMeta,
    pub season_id: String,
    pub is_current_season: bool,
    pub is_off_season: bool,
}

impl Season {
    pub fn new(season_id: impl Into<String>, is_current_season: bool, is_off_season: bool) -> Self {
        Self {
            meta: EntityMeta::default(),
            season_id: season_id.into(),
            is_current_season,
            is_off_season,
        }
    }

    /// Sequential number embedded in the id suffix, `None` for ids outside the ranked
    /// naming scheme.
    pub fn season_number(&self) -> Option<i32> {
        self.season_id
            .strip_prefix(RANKED_SEASON_PREFIX)
            .and_then(|n| n.parse().ok())
    }

    pub fn id_for_number(number: i32) -> String {
        format!("{RANKED_SEASON_PREFIX}{number:02}")
    }
}

impl Entity for Season {
    const TABLE: &'static str = "seasons";
    const COLUMNS: &'static [&'static str] = &["season_id", "is_current_season", "is_off_season"];

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn column(&self, name: &str) -> Value {
        match name {
            "season_id" => self.season_id.as_str().into(),
            "is_current_season" => self.is_current_season.into(),
            "is_off_season" => self.is_off_season.into(),
            _ => Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Player {
    #[sqlx(flatten)]
    pub meta: EntityMeta,
    pub player_id: String,
    /// Lowercase name, the lookup key.
    pub name: String,
    pub display_name: String,
}

impl Player {
    pub fn new(player_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        Self {
            meta: EntityMeta::default(),
            player_id: player_id.into(),
            name: display_name.to_lowercase(),
            display_name,
        }
    }

    pub fn shown_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

impl Entity for Player {
    const TABLE: &'static str = "players";
    const COLUMNS: &'static [&'static str] = &["player_id", "name", "display_name"];

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn column(&self, name: &str) -> Value {
        match name {
            "player_id" => self.player_id.as_str().into(),
            "name" => self.name.as_str().into(),
            "display_name" => self.display_name.as_str().into(),
            _ => Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct LeaderboardEntry {
    #[sqlx(flatten)]
    pub meta: EntityMeta,
    pub region: String,
    pub season: String,
    pub rank: i32,
    pub player_id: String,
    pub name: String,
    pub rank_points: i32,
    pub win_count: i32,
    pub game_count: i32,
    pub win_ratio: f64,
    pub avg_damage: f64,
    pub kda_ratio: f64,
    pub tier: String,
    pub sub_tier: String,
}

impl LeaderboardEntry {
    pub fn win_ratio(win_count: i32, game_count: i32) -> f64 {
        if game_count == 0 {
            0.0
        } else {
            f64::from(win_count) / f64::from(game_count)
        }
    }
}

impl Entity for LeaderboardEntry {
    const TABLE: &'static str = "leaderboard_entries";
    const COLUMNS: &'static [&'static str] = &[
        "region",
        "season",
        "rank",
        "player_id",
        "name",
        "rank_points",
        "win_count",
        "game_count",
        "win_ratio",
        "avg_damage",
        "kda_ratio",
        "tier",
        "sub_tier",
    ];

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn column(&self, name: &str) -> Value {
        match name {
            "region" => self.region.as_str().into(),
            "season" => self.season.as_str().into(),
            "rank" => self.rank.into(),
            "player_id" => self.player_id.as_str().into(),
            "name" => self.name.as_str().into(),
            "rank_points" => self.rank_points.into(),
            "win_count" => self.win_count.into(),
            "game_count" => self.game_count.into(),
            "win_ratio" => self.win_ratio.into(),
            "avg_damage" => self.avg_damage.into(),
            "kda_ratio" => self.kda_ratio.into(),
            "tier" => self.tier.as_str().into(),
            "sub_tier" => self.sub_tier.as_str().into(),
            _ => Value::Null,
        }
    }
}
