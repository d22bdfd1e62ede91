use thiserror::Error;

use crate::pubg::PubgApiError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("PUBG API error: {0}")]
    PubgApi(#[from] PubgApiError),

    #[error("Discord error: {0}")]
    Discord(Box<serenity::Error>),

    #[error("Write conflict on {table} row {row_key}: record changed since it was read")]
    Conflict { table: &'static str, row_key: String },

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// True when the upstream stats API refused the call because of its rate limit.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::PubgApi(PubgApiError::RateLimited))
    }
}

impl From<serenity::Error> for AppError {
    fn from(err: serenity::Error) -> Self {
        AppError::Discord(Box::new(err))
    }
}
