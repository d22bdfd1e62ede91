use poise::serenity_prelude::{ButtonStyle, CreateActionRow, CreateButton, CreateEmbed};

use crate::db::{LeaderboardEntry, Player, Season};
use crate::pubg::{RankTier, RankedModeStats, Region};
use crate::session::{ActionToken, SessionTokens};

const MASTER_TIER: &str = "Master";
const COLOR_BLUE: u32 = 0x3498db;
const COLOR_GREY: u32 = 0x607d8b;

fn op_gg_url(name: &str) -> String {
    format!("https://pubg.op.gg/user/{}", urlencoding::encode(name))
}

pub fn sub_tier_numeral(sub_tier: &str) -> &'static str {
    match sub_tier {
        "1" => "I",
        "2" => "II",
        "3" => "III",
        "4" => "IV",
        "5" => "V",
        _ => "",
    }
}

/// "Diamond II", or just the tier name for Master which has no sub-tiers.
pub fn tier_label(tier: &str, sub_tier: &str) -> String {
    let numeral = sub_tier_numeral(sub_tier);
    if tier == MASTER_TIER || numeral.is_empty() {
        tier.to_string()
    } else {
        format!("{tier} {numeral}")
    }
}

/// One or two decimals: `1.5`, `2.0`, `1.23`.
pub fn decimal(value: f64) -> String {
    let formatted = format!("{value:.2}");
    match formatted.strip_suffix('0') {
        Some(trimmed) => trimmed.to_string(),
        None => formatted,
    }
}

pub fn kill_death_ratio(kills: i32, deaths: i32) -> String {
    if deaths == 0 {
        "N/A".to_string()
    } else {
        decimal(f64::from(kills) / f64::from(deaths))
    }
}

fn region_label(region: &str) -> String {
    region.trim_start_matches("pc-").to_uppercase()
}

fn rank_image_url(template: Option<&str>, tier: &RankTier) -> Option<String> {
    let template = template?;
    if tier.tier.is_empty() || tier.sub_tier.is_empty() {
        return None;
    }
    Some(template.replace("{RANK}", &format!("{}-{}", tier.tier, tier.sub_tier)))
}

pub fn stats_description(stats: &RankedModeStats, entry: Option<&LeaderboardEntry>) -> String {
    let mut lines = Vec::with_capacity(6);

    let current = tier_label(&stats.current_tier.tier, &stats.current_tier.sub_tier);
    if stats.current_tier.tier == MASTER_TIER {
        lines.push(format!("Rank: **{current}**"));
    } else {
        let best = tier_label(&stats.best_tier.tier, &stats.best_tier.sub_tier);
        lines.push(format!("Rank: **{current}** (season high: **{best}**)"));
    }

    if let Some(entry) = entry {
        lines.push(format!(
            "Leaderboard ({}) rank: **#{}**",
            region_label(&entry.region),
            entry.rank
        ));
    }

    lines.push(format!(
        "RP: **{}** (season high: **{}**)",
        stats.current_rank_point, stats.best_rank_point
    ));
    lines.push(format!(
        "Matches: **{}** Wins: **{}** (**{}%**)",
        stats.rounds_played,
        stats.wins,
        decimal(stats.win_ratio * 100.0)
    ));
    lines.push(format!(
        "Avg placement: **#{}** Top 10: **{}%**",
        decimal(stats.avg_rank),
        decimal(stats.top10_ratio * 100.0)
    ));

    let avg_damage = if stats.rounds_played > 0 {
        stats.damage_dealt / f64::from(stats.rounds_played)
    } else {
        0.0
    };
    lines.push(format!(
        "KDR: **{}** KDA: **{}** Avg dmg: **{:.0}**",
        kill_death_ratio(stats.kills, stats.deaths),
        decimal(stats.kda),
        avg_damage
    ));

    lines.join("\n")
}

pub fn player_stats(
    player: &Player,
    season: &Season,
    stats: Option<&RankedModeStats>,
    entry: Option<&LeaderboardEntry>,
    rank_image_template: Option<&str>,
) -> CreateEmbed {
    let title = format!(
        "PUBG ranked season {} squad FPP stats for player {}",
        season.season_number().unwrap_or_default(),
        player.shown_name()
    );
    let embed = CreateEmbed::new().title(title).url(op_gg_url(&player.name));

    let Some(stats) = stats else {
        return embed.description("No stats found :(").color(COLOR_GREY);
    };

    let embed = embed
        .description(stats_description(stats, entry))
        .color(COLOR_BLUE);
    match rank_image_url(rank_image_template, &stats.current_tier) {
        Some(url) => embed.thumbnail(url),
        None => embed,
    }
}

pub fn leaderboard_line(entry: &LeaderboardEntry) -> String {
    format!(
        "**#{}** **[{}]({})** [**{}**] [RP: **{}**] [Matches: **{}**] [Avg dmg: **{:.0}**]",
        entry.rank,
        entry.name,
        op_gg_url(&entry.name),
        tier_label(&entry.tier, &entry.sub_tier),
        entry.rank_points,
        entry.game_count,
        entry.avg_damage
    )
}

pub fn leaderboard(region: Region, season: &Season, entries: &[LeaderboardEntry]) -> CreateEmbed {
    let title = format!(
        "PUBG ranked {} season {} top {}",
        region.label(),
        season.season_number().unwrap_or_default(),
        entries.len()
    );
    let description = entries
        .iter()
        .map(leaderboard_line)
        .collect::<Vec<_>>()
        .join("\n");

    CreateEmbed::new()
        .title(title)
        .description(description)
        .color(COLOR_BLUE)
}

pub fn scroll_buttons(tokens: &SessionTokens, previous: bool, next: bool) -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        CreateButton::new(tokens.previous.to_string())
            .label("◀")
            .style(ButtonStyle::Primary)
            .disabled(!previous),
        CreateButton::new(tokens.next.to_string())
            .label("▶")
            .style(ButtonStyle::Primary)
            .disabled(!next),
    ])
}

pub fn refresh_button(token: ActionToken) -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        CreateButton::new(token.to_string())
            .label("↻")
            .style(ButtonStyle::Success),
    ])
}
