use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OnceCell;

use crate::models::job::FlatRow;

type Slot = Arc<OnceCell<Vec<FlatRow>>>;

/// Process-lifetime results per keyword. Entries never expire.
///
/// Each keyword owns a `OnceCell`, so concurrent requests for an uncached
/// keyword share one scrape and the rest wait on it. A resolution that is
/// cancelled part way leaves the cell empty for the next caller.
#[derive(Default)]
pub struct KeywordCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl KeywordCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, keyword: &str) -> Slot {
        self.lock().entry(keyword.to_string()).or_default().clone()
    }

    /// Cached rows, if the keyword has been resolved.
    pub fn get(&self, keyword: &str) -> Option<Vec<FlatRow>> {
        self.lock()
            .get(keyword)
            .and_then(|slot| slot.get().cloned())
    }

    /// Cached rows, or the result of `fetch` which is then stored.
    pub async fn get_or_fetch<F, Fut>(&self, keyword: &str, fetch: F) -> Vec<FlatRow>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Vec<FlatRow>>,
    {
        let slot = self.slot(keyword);
        slot.get_or_init(fetch).await.clone()
    }

    /// Resolved keywords, sorted.
    pub fn keywords(&self) -> Vec<String> {
        let mut keywords: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(keyword, _)| keyword.clone())
            .collect();
        keywords.sort();
        keywords
    }
}
