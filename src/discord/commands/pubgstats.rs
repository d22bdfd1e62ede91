use poise::{CreateReply, ReplyHandle};
use tracing::{error, info, instrument, warn};

use crate::discord::bot::Context;
use crate::discord::components::{
    self, PLAYER_NOT_FOUND, SEASON_NOT_FOUND, render_session, user_message,
};
use crate::discord::embeds;
use crate::error::AppError;
use crate::pubg::{PubgApiError, Region};
use crate::seasons::{CURRENT_SEASON, MIN_RANKED_SEASON};
use crate::session::MessageRef;

/// Entries shown by the leaderboard command.
const LEADERBOARD_COMMAND_SIZE: usize = 10;
const AUTOCOMPLETE_LIMIT: usize = 25;

/// PUBG ranked stats
#[poise::command(
    slash_command,
    subcommands("player", "leaderboard", "refreshseasons"),
    subcommand_required
)]
pub async fn pubgstats(_: Context<'_>) -> Result<(), AppError> {
    Ok(())
}

async fn autocomplete_player_name(
    ctx: Context<'_>,
    partial: &str,
) -> impl Iterator<Item = String> {
    match ctx.data().players.search(partial, AUTOCOMPLETE_LIMIT).await {
        Ok(names) => names.into_iter(),
        Err(e) => {
            warn!(error = ?e, "🎮 ⚠️ Player name autocomplete failed");
            Vec::new().into_iter()
        }
    }
}

fn validate_season(season: i32) -> bool {
    season == CURRENT_SEASON || season >= MIN_RANKED_SEASON
}

async fn edit_text(ctx: Context<'_>, reply: &ReplyHandle<'_>, text: &str) -> Result<(), AppError> {
    reply
        .edit(ctx, CreateReply::default().content(text).components(Vec::new()))
        .await?;
    Ok(())
}

/// Ranked squad FPP stats of a player
#[poise::command(slash_command)]
#[instrument(skip(ctx), fields(user_id = %ctx.author().id))]
pub async fn player(
    ctx: Context<'_>,
    #[description = "PUBG player name"]
    #[autocomplete = "autocomplete_player_name"]
    playername: String,
    #[description = "Post the stats visibly to the channel"] ispublic: Option<bool>,
    #[description = "Ranked season number, -1 for the current season"] season: Option<i32>,
) -> Result<(), AppError> {
    let is_public = ispublic.unwrap_or(false);
    let season = season.unwrap_or(CURRENT_SEASON);
    let name = playername.trim();

    if name.is_empty() {
        ctx.send(CreateReply::default().content("Provide a player name.").ephemeral(true))
            .await?;
        return Ok(());
    }
    if !validate_season(season) {
        ctx.send(
            CreateReply::default()
                .content("Ranked season stats are available from season 7 and later.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let reply = ctx
        .send(
            CreateReply::default()
                .content(format!("Retrieving stats for {name}.."))
                .ephemeral(!is_public),
        )
        .await?;

    if let Err(e) = show_player_stats(ctx, &reply, name, season, is_public).await {
        if e.is_rate_limited() {
            warn!("🎮 ⚠️ Rate limited while retrieving player stats");
        } else {
            error!(error = ?e, "🎮 ❌ Failed to retrieve player stats");
        }
        edit_text(ctx, &reply, user_message(&e)).await?;
    }

    Ok(())
}

async fn show_player_stats(
    ctx: Context<'_>,
    reply: &ReplyHandle<'_>,
    name: &str,
    season: i32,
    is_public: bool,
) -> Result<(), AppError> {
    let data = ctx.data();

    let Some(player) = data.players.get_or_create(name).await? else {
        info!("🎮 Player not found, stats not posted");
        return edit_text(ctx, reply, PLAYER_NOT_FOUND).await;
    };
    let Some(season) = data.catalog.resolve(season).await? else {
        info!("🎮 Season not found, stats not posted");
        return edit_text(ctx, reply, SEASON_NOT_FOUND).await;
    };

    let fetched = data
        .source
        .get_ranked_stats(&player.player_id, &season.season_id)
        .await;

    let (stats, rate_limited) = match fetched {
        Ok(stats) => (stats, false),
        Err(PubgApiError::RateLimited) => (None, true),
        Err(e) => return Err(e.into()),
    };

    let session = data.sessions.create(player, season, stats, is_public).await;

    let edit = {
        let session = session.lock().await;
        if rate_limited {
            CreateReply::default()
                .content(components::RATE_LIMITED)
                .components(vec![embeds::refresh_button(session.tokens.refresh)])
        } else {
            let (embed, rows) = render_session(data, &session).await?;
            CreateReply::default().content("").embed(embed).components(rows)
        }
    };
    reply.edit(ctx, edit).await?;

    let message_id = reply.message().await.ok().map(|m| m.id);
    let interaction_token = match ctx {
        poise::Context::Application(app) => Some(app.interaction.token.clone()),
        poise::Context::Prefix(_) => None,
    };
    data.sessions
        .attach_message(
            &session,
            MessageRef {
                interaction_token,
                channel_id: ctx.channel_id(),
                message_id,
            },
        )
        .await;

    Ok(())
}

/// Top of a regional ranked leaderboard
#[poise::command(slash_command)]
#[instrument(skip(ctx), fields(user_id = %ctx.author().id))]
pub async fn leaderboard(
    ctx: Context<'_>,
    #[description = "Leaderboard region"] region: Region,
    #[description = "Post the leaderboard visibly to the channel"] ispublic: Option<bool>,
    #[description = "Ranked season number, -1 for the current season"] season: Option<i32>,
) -> Result<(), AppError> {
    let is_public = ispublic.unwrap_or(false);
    let season = season.unwrap_or(CURRENT_SEASON);

    let reply = ctx
        .send(
            CreateReply::default()
                .content("Retrieving season leaderboard..")
                .ephemeral(!is_public),
        )
        .await?;

    let data = ctx.data();
    let Some(season) = data.catalog.season(season).await? else {
        info!("🎮 Season not found, leaderboard not posted");
        return edit_text(ctx, &reply, SEASON_NOT_FOUND).await;
    };

    let entries = data
        .leaderboard
        .top(region, &season.season_id, LEADERBOARD_COMMAND_SIZE)
        .await?;
    if entries.is_empty() {
        return edit_text(ctx, &reply, "No data available :(").await;
    }

    reply
        .edit(
            ctx,
            CreateReply::default()
                .content("")
                .embed(embeds::leaderboard(region, &season, &entries)),
        )
        .await?;

    Ok(())
}

/// Reload the ranked season list from the PUBG API
#[poise::command(slash_command, required_permissions = "MANAGE_GUILD", ephemeral)]
#[instrument(skip(ctx), fields(user_id = %ctx.author().id))]
pub async fn refreshseasons(ctx: Context<'_>) -> Result<(), AppError> {
    let reply = ctx
        .send(
            CreateReply::default()
                .content("Refreshing season cache. This might take a while.")
                .ephemeral(true),
        )
        .await?;

    let data = ctx.data();
    match data.catalog.refresh_from(data.source.as_ref()).await {
        Ok(true) => {
            info!("🎮 ✅ Season cache refreshed");
            edit_text(ctx, &reply, "Season cache refreshed.").await
        }
        Ok(false) => {
            warn!("🎮 ⚠️ Season cache refresh failed");
            edit_text(ctx, &reply, "Season cache refresh failed. See logs for details.").await
        }
        Err(e) => {
            error!(error = ?e, "🎮 ❌ Season cache refresh failed");
            edit_text(ctx, &reply, user_message(&e)).await
        }
    }
}
