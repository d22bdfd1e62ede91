use std::sync::Arc;

use poise::CreateReply;
use poise::serenity_prelude::{self as serenity, Http};
use tracing::{error, info, warn};

use super::commands;
use super::components::{self, user_message};
use crate::error::AppError;
use crate::leaderboard::LeaderboardReader;
use crate::players::PlayerRegistry;
use crate::pubg::StatsSource;
use crate::seasons::SeasonCatalog;
use crate::session::SessionStore;

/// Shared data accessible in all commands
pub struct Data {
    pub catalog: Arc<SeasonCatalog>,
    pub players: Arc<PlayerRegistry>,
    pub leaderboard: LeaderboardReader,
    pub source: Arc<dyn StatsSource>,
    pub sessions: SessionStore,
    pub rank_image_template: Option<String>,
}

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("catalog", &self.catalog)
            .field("source", &self.source)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

pub type Context<'a> = poise::Context<'a, Data, AppError>;

/// Build the framework. `data` runs once the gateway is ready, with the HTTP client
/// used to clean up evicted session messages.
pub fn create_framework<F>(data: F) -> poise::Framework<Data, AppError>
where
    F: FnOnce(Arc<Http>) -> Data + Send + Sync + 'static,
{
    poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![commands::pubgstats()],
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move { event_handler(ctx, event, data).await })
            },
            on_error: |error| {
                Box::pin(async move {
                    handle_error(error).await;
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!(
                    bot_name = %ready.user.name,
                    guild_count = ready.guilds.len(),
                    "🎮 Bot is ready"
                );
                Ok(data(ctx.http.clone()))
            })
        })
        .build()
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
) -> Result<(), AppError> {
    if let serenity::FullEvent::InteractionCreate {
        interaction: serenity::Interaction::Component(component),
    } = event
    {
        components::handle_button(ctx, component, data).await?;
    }
    Ok(())
}

async fn handle_error(error: poise::FrameworkError<'_, Data, AppError>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            let command_name = ctx.command().qualified_name.as_str();
            error!(
                error = ?error,
                command = command_name,
                user_id = %ctx.author().id,
                "🎮 ❌ Command execution failed"
            );
            let _ = ctx
                .send(
                    CreateReply::default()
                        .content(user_message(&error))
                        .ephemeral(true),
                )
                .await;
        }
        poise::FrameworkError::ArgumentParse { error, ctx, .. } => {
            warn!(
                error = %error,
                command = ctx.command().qualified_name.as_str(),
                "🎮 ⚠️ Invalid command argument"
            );
            let _ = ctx.say(format!("Invalid argument: {}", error)).await;
        }
        poise::FrameworkError::MissingUserPermissions {
            missing_permissions,
            ctx,
            ..
        } => {
            if let Some(perms) = missing_permissions {
                warn!(
                    permissions = %perms,
                    user_id = %ctx.author().id,
                    command = ctx.command().qualified_name.as_str(),
                    "🎮 ⚠️ User missing permissions"
                );
                let _ = ctx
                    .say(format!("You need these permissions: {}", perms))
                    .await;
            }
        }
        poise::FrameworkError::EventHandler { error, event, .. } => {
            error!(
                error = ?error,
                event = event.snake_case_name(),
                "🎮 ❌ Event handler failed"
            );
        }
        other => {
            error!(error = ?other, "🎮 ❌ Unhandled framework error");
        }
    }
}
