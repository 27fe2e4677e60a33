// ── Item directory ──
//
// Process-lifetime cache of the server's item names. Filled on the first
// successful fetch and only emptied by an explicit `clear()`.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use habdeck_api::RestClient;

#[derive(Debug, Default)]
pub struct ItemDirectory {
    cache: Mutex<Option<Arc<Vec<String>>>>,
}

impl ItemDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted, de-duplicated item names. Concurrent callers share a
    /// single fetch; a failed fetch leaves the cache empty.
    pub async fn items(&self, client: &RestClient) -> Result<Arc<Vec<String>>, habdeck_api::Error> {
        let mut cache = self.cache.lock().await;
        if let Some(items) = cache.as_ref() {
            return Ok(Arc::clone(items));
        }

        let mut names = client.list_item_names().await?;
        names.sort_unstable();
        names.dedup();
        debug!(count = names.len(), "item directory loaded");

        let items = Arc::new(names);
        *cache = Some(Arc::clone(&items));
        Ok(items)
    }

    pub async fn clear(&self) {
        *self.cache.lock().await = None;
    }
}
