use poise::serenity_prelude::{
    self as serenity, ComponentInteraction, CreateActionRow, CreateEmbed,
    CreateInteractionResponse, CreateInteractionResponseMessage,
};
use tracing::{debug, error, instrument, warn};

use super::bot::Data;
use super::embeds;
use crate::error::AppError;
use crate::pubg::RankedStats;
use crate::seasons::{CURRENT_SEASON, MIN_RANKED_SEASON};
use crate::session::{ActionToken, InteractiveSession, SessionAction, SessionHandle};

pub const PLAYER_NOT_FOUND: &str = "Player not found.";
pub const SEASON_NOT_FOUND: &str = "Ranked season not found. There might be an issue. \
    Use `/pubgstats refreshseasons` command to refresh season cache.";
pub const RATE_LIMITED: &str = "PUBG API limits exceeded. Please try again shortly.";
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again shortly.";

/// Text shown to the user for a failed request.
pub fn user_message(err: &AppError) -> &'static str {
    if err.is_rate_limited() {
        RATE_LIMITED
    } else {
        GENERIC_FAILURE
    }
}

/// Stats embed of the selected season plus the season scroll buttons.
///
/// Public messages get no buttons.
pub async fn render_session(
    data: &Data,
    session: &InteractiveSession,
) -> Result<(CreateEmbed, Vec<CreateActionRow>), AppError> {
    let entry = data
        .leaderboard
        .entry_for(session.player.shown_name(), &session.season.season_id)
        .await?;

    let embed = embeds::player_stats(
        &session.player,
        &session.season,
        session.stats().and_then(RankedStats::squad_fpp),
        entry.as_ref(),
        data.rank_image_template.as_deref(),
    );

    if session.is_public {
        return Ok((embed, Vec::new()));
    }

    let number = session.season.season_number().unwrap_or(CURRENT_SEASON);
    let has_previous =
        number > MIN_RANKED_SEASON && data.catalog.season(number - 1).await?.is_some();
    let has_next = data
        .catalog
        .current_season()
        .await?
        .is_some_and(|current| current.season_id != session.season.season_id);

    Ok((
        embed,
        vec![embeds::scroll_buttons(&session.tokens, has_previous, has_next)],
    ))
}

#[instrument(
    skip_all,
    fields(custom_id = %component.data.custom_id, user_id = %component.user.id)
)]
pub async fn handle_button(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    data: &Data,
) -> Result<(), AppError> {
    let Some(token) = ActionToken::parse(&component.data.custom_id) else {
        return Ok(());
    };

    let Some(session) = data.sessions.lookup(token) else {
        debug!("🎮 Button of an expired session, acknowledging only");
        component
            .create_response(ctx, CreateInteractionResponse::Acknowledge)
            .await?;
        return Ok(());
    };

    let (action, refresh_token) = {
        let session = session.lock().await;
        (session.action_for(token), session.tokens.refresh)
    };

    let outcome = match action {
        Some(action) => apply(data, &session, action).await,
        None => Ok(()),
    };

    let view = match outcome {
        Ok(()) => {
            let session = session.lock().await;
            render_session(data, &session).await
        }
        Err(e) => Err(e),
    };

    let message = match view {
        Ok((embed, rows)) => CreateInteractionResponseMessage::new()
            .content("")
            .embeds(vec![embed])
            .components(rows),
        Err(e) => {
            if e.is_rate_limited() {
                warn!("🎮 ⚠️ Rate limited while updating stats message");
            } else {
                error!(error = ?e, "🎮 ❌ Failed to update stats message");
            }
            CreateInteractionResponseMessage::new()
                .content(user_message(&e))
                .embeds(Vec::new())
                .components(vec![embeds::refresh_button(refresh_token)])
        }
    };

    component
        .create_response(ctx, CreateInteractionResponse::UpdateMessage(message))
        .await?;

    Ok(())
}

async fn apply(
    data: &Data,
    session: &SessionHandle,
    action: SessionAction,
) -> Result<(), AppError> {
    if action == SessionAction::Refresh {
        return data.sessions.retry(session, data.source.as_ref()).await;
    }

    let selected = session.lock().await.season.clone();
    let number = selected.season_number().unwrap_or(CURRENT_SEASON);
    let step = if action == SessionAction::Previous { -1 } else { 1 };
    let target = data.catalog.season(number + step).await?;

    let Some(target) = target else {
        debug!(?action, "🎮 No season in that direction");
        return Ok(());
    };

    data.sessions
        .advance(session, target, data.source.as_ref())
        .await
}
