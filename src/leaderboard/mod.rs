//! Ranked leaderboards: periodic sync from the PUBG API and reads for commands.

mod batch;
mod reader;
mod sync;

pub use batch::run_batched;
pub use reader::{LeaderboardReader, MAX_LEADERBOARD_SIZE};
pub use sync::{LeaderboardSyncEngine, SyncReport, SyncSettings};
