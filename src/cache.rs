use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::db::{Entity, Filter, Table};
use crate::error::AppError;

#[derive(Debug)]
struct Cached<T> {
    records: Arc<Vec<T>>,
    expires_at: Instant,
}

/// Full-table read cache in front of a [`Table`].
///
/// The lock is held for the whole check-then-fetch sequence, so concurrent callers
/// that miss together produce a single remote query and the late ones read the
/// refreshed copy. A failed fetch leaves the slot untouched.
#[derive(Debug)]
pub struct TtlCache<T: Entity> {
    table: Arc<dyn Table<T>>,
    ttl: Duration,
    slot: Mutex<Option<Cached<T>>>,
}

impl<T: Entity> TtlCache<T> {
    pub fn new(table: Arc<dyn Table<T>>, ttl: Duration) -> Self {
        Self {
            table,
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn table(&self) -> &Arc<dyn Table<T>> {
        &self.table
    }

    /// Selective read, always served by the table.
    pub async fn get(&self, filter: &Filter) -> Result<Vec<T>, AppError> {
        self.table.query(filter).await
    }

    pub async fn get_all(&self, use_cache: bool) -> Result<Arc<Vec<T>>, AppError> {
        if !use_cache {
            return Ok(Arc::new(self.table.query(&Filter::all()).await?));
        }

        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.records.clone());
            }
        }

        debug!(table = T::TABLE, "🗄️ Cache miss, loading table");
        let records = Arc::new(self.table.query(&Filter::all()).await?);
        *slot = Some(Cached {
            records: records.clone(),
            expires_at: Instant::now() + self.ttl,
        });

        Ok(records)
    }

    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
        debug!(table = T::TABLE, "🗄️ Cache invalidated");
    }
}
