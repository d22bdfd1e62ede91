//! Interactive stats messages that outlive the command that created them.
//!
//! Every session owns three [`ActionToken`]s, one per button. A token is the button's
//! custom id, so a button press resolves back to its session through
//! [`SessionStore::lookup`]. The store is bounded: the oldest session is evicted when a
//! new one would not fit, and its message is deleted on a best-effort basis.

use std::collections::{HashMap, VecDeque};
use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, Http, MessageId};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::{Player, Season};
use crate::error::AppError;
use crate::pubg::{RankedStats, StatsSource};
use crate::seasons::CURRENT_SEASON;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionToken(Uuid);

impl ActionToken {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl fmt::Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Previous,
    Next,
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTokens {
    pub previous: ActionToken,
    pub next: ActionToken,
    pub refresh: ActionToken,
}

impl SessionTokens {
    fn generate() -> Self {
        Self {
            previous: ActionToken::generate(),
            next: ActionToken::generate(),
            refresh: ActionToken::generate(),
        }
    }

    fn all(&self) -> [ActionToken; 3] {
        [self.previous, self.next, self.refresh]
    }
}

/// Where a session's message lives, enough to delete it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    /// Token of the command interaction whose response is the message.
    pub interaction_token: Option<String>,
    pub channel_id: ChannelId,
    pub message_id: Option<MessageId>,
}

/// Removes the message of an evicted session.
#[async_trait]
pub trait MessageCleanup: Send + Sync + Debug {
    async fn delete_message(&self, message: MessageRef) -> Result<(), AppError>;
}

/// Deletes messages through the Discord HTTP API.
#[derive(Clone)]
pub struct DiscordCleanup {
    http: Arc<Http>,
}

impl DiscordCleanup {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

impl Debug for DiscordCleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordCleanup").finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageCleanup for DiscordCleanup {
    async fn delete_message(&self, message: MessageRef) -> Result<(), AppError> {
        // Interaction tokens expire after 15 minutes, public messages can still be
        // deleted through their channel afterwards.
        if let Some(token) = &message.interaction_token {
            match self.http.delete_original_interaction_response(token).await {
                Ok(()) => return Ok(()),
                Err(e) if message.message_id.is_none() => return Err(e.into()),
                Err(e) => debug!(
                    error = ?e,
                    "🎮 Interaction token rejected, deleting through the channel"
                ),
            }
        }

        if let Some(message_id) = message.message_id {
            message
                .channel_id
                .delete_message(&self.http, message_id)
                .await?;
        }
        Ok(())
    }
}

/// Stats view of one player, advanced by button presses.
#[derive(Debug)]
pub struct InteractiveSession {
    pub id: u64,
    pub tokens: SessionTokens,
    pub player: Player,
    pub season: Season,
    pub is_public: bool,
    pub message: Option<MessageRef>,
    /// Fetched stats per season number; `None` when the player has none that season.
    stats: HashMap<i32, Option<RankedStats>>,
    /// Season whose last fetch failed, retried by the refresh button.
    pending: Option<Season>,
}

impl InteractiveSession {
    pub fn action_for(&self, token: ActionToken) -> Option<SessionAction> {
        if token == self.tokens.previous {
            Some(SessionAction::Previous)
        } else if token == self.tokens.next {
            Some(SessionAction::Next)
        } else if token == self.tokens.refresh {
            Some(SessionAction::Refresh)
        } else {
            None
        }
    }

    /// Stats of the selected season.
    pub fn stats(&self) -> Option<&RankedStats> {
        self.stats
            .get(&season_key(&self.season))
            .and_then(Option::as_ref)
    }

    pub fn has_stats_for(&self, season: &Season) -> bool {
        self.stats.contains_key(&season_key(season))
    }

    /// Season a refresh should load: the one that last failed, else the selected one.
    pub fn retry_target(&self) -> &Season {
        self.pending.as_ref().unwrap_or(&self.season)
    }
}

fn season_key(season: &Season) -> i32 {
    season.season_number().unwrap_or(CURRENT_SEASON)
}

pub type SessionHandle = Arc<Mutex<InteractiveSession>>;

#[derive(Debug)]
struct Slot {
    tokens: SessionTokens,
    session: SessionHandle,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<u64, Slot>,
    tokens: HashMap<ActionToken, u64>,
    order: VecDeque<u64>,
    next_id: u64,
}

impl Inner {
    fn remove(&mut self, id: u64) -> Option<SessionHandle> {
        let slot = self.sessions.remove(&id)?;
        for token in slot.tokens.all() {
            self.tokens.remove(&token);
        }
        Some(slot.session)
    }
}

/// Bounded, insertion-ordered set of live sessions.
pub struct SessionStore {
    capacity: usize,
    cleanup: Arc<dyn MessageCleanup>,
    inner: StdMutex<Inner>,
}

impl Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl SessionStore {
    pub fn new(capacity: usize, cleanup: Arc<dyn MessageCleanup>) -> Self {
        Self {
            capacity: capacity.max(1),
            cleanup,
            inner: StdMutex::new(Inner::default()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.inner().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a session, evicting the oldest ones first when the store is full.
    ///
    /// `stats` of `None` is not remembered, so the next [`SessionStore::advance`] to
    /// the same season fetches again.
    pub async fn create(
        &self,
        player: Player,
        season: Season,
        stats: Option<RankedStats>,
        is_public: bool,
    ) -> SessionHandle {
        let (handle, evicted) = {
            let mut inner = self.inner();

            let mut evicted = Vec::new();
            while inner.order.len() >= self.capacity {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                if let Some(session) = inner.remove(oldest) {
                    evicted.push(session);
                }
            }

            inner.next_id += 1;
            let id = inner.next_id;
            let tokens = SessionTokens::generate();

            let mut fetched = HashMap::new();
            if let Some(stats) = stats {
                fetched.insert(season_key(&season), Some(stats));
            }
            let handle = Arc::new(Mutex::new(InteractiveSession {
                id,
                tokens,
                player,
                season,
                is_public,
                message: None,
                stats: fetched,
                pending: None,
            }));

            for token in tokens.all() {
                inner.tokens.insert(token, id);
            }
            inner.sessions.insert(
                id,
                Slot {
                    tokens,
                    session: handle.clone(),
                },
            );
            inner.order.push_back(id);

            (handle, evicted)
        };

        for session in evicted {
            self.clean_up(session).await;
        }

        handle
    }

    async fn clean_up(&self, session: SessionHandle) {
        let (id, message) = {
            let session = session.lock().await;
            (session.id, session.message.clone())
        };
        debug!(session = id, "🎮 Session evicted");

        let Some(message) = message else {
            return;
        };
        if let Err(e) = self.cleanup.delete_message(message).await {
            warn!(session = id, error = ?e, "🎮 ⚠️ Could not delete evicted session message");
        }
    }

    pub fn lookup(&self, token: ActionToken) -> Option<SessionHandle> {
        let inner = self.inner();
        let id = inner.tokens.get(&token)?;
        inner.sessions.get(id).map(|slot| slot.session.clone())
    }

    pub async fn attach_message(&self, session: &SessionHandle, message: MessageRef) {
        session.lock().await.message = Some(message);
    }

    /// Select `season`, fetching its stats unless the session already has them.
    ///
    /// On error the selection is left as it was and `season` is kept for [`Self::retry`].
    pub async fn advance(
        &self,
        session: &SessionHandle,
        season: Season,
        source: &dyn StatsSource,
    ) -> Result<(), AppError> {
        let mut session = session.lock().await;
        select(&mut session, season, source).await
    }

    /// Load the season whose fetch last failed, or reload the selected one.
    pub async fn retry(
        &self,
        session: &SessionHandle,
        source: &dyn StatsSource,
    ) -> Result<(), AppError> {
        let mut session = session.lock().await;
        let season = session.retry_target().clone();
        select(&mut session, season, source).await
    }
}

async fn select(
    session: &mut InteractiveSession,
    season: Season,
    source: &dyn StatsSource,
) -> Result<(), AppError> {
    let key = season_key(&season);

    if !session.stats.contains_key(&key) {
        let fetched = source
            .get_ranked_stats(&session.player.player_id, &season.season_id)
            .await;
        match fetched {
            Ok(stats) => {
                session.stats.insert(key, stats);
            }
            Err(e) => {
                session.pending = Some(season);
                return Err(e.into());
            }
        }
    }
    session.season = season;
    session.pending = None;

    Ok(())
}
