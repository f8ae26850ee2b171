use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed list of `host:port` proxy endpoints handed out round-robin.
#[derive(Debug, Default)]
pub struct ProxyPool {
    endpoints: Vec<String>,
    cursor: AtomicUsize,
}

impl ProxyPool {
    pub fn new(endpoints: Vec<String>) -> Self {
        let endpoints = endpoints
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        Self {
            endpoints,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Next endpoint in rotation; `None` for an empty pool.
    pub fn next(&self) -> Option<String> {
        if self.endpoints.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        Some(self.endpoints[index].clone())
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
