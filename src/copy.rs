use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use crate::debounce::Debouncer;

/// How long a copy mark stays visible.
pub const COPY_RESET_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyStatus {
    Copied,
    Error,
}

/// Per-item "copied" marks that clear themselves.
#[derive(Clone)]
pub struct CopyTracker {
    marks: Arc<Mutex<HashMap<String, CopyStatus>>>,
    resets: Debouncer,
}

impl Default for CopyTracker {
    fn default() -> Self {
        Self::new(COPY_RESET_DELAY)
    }
}

impl CopyTracker {
    pub fn new(reset_after: Duration) -> Self {
        Self {
            marks: Arc::new(Mutex::new(HashMap::new())),
            resets: Debouncer::new(reset_after),
        }
    }

    /// Set the mark for `key` and (re)start its reset timer.
    pub fn mark(&self, key: &str, status: CopyStatus) {
        self.marks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.to_string(), status);

        let marks = Arc::clone(&self.marks);
        let owned_key = key.to_string();
        self.resets.schedule(key, async move {
            marks
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .remove(&owned_key);
        });
    }

    pub fn status(&self, key: &str) -> Option<CopyStatus> {
        self.marks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .copied()
    }

    pub fn snapshot(&self) -> HashMap<String, CopyStatus> {
        self.marks.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.resets.cancel_all();
        self.marks.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

pub fn copy_key(kind: &str, id: &str) -> String {
    format!("{kind}:{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_mark_resets_after_delay() {
        let tracker = CopyTracker::default();
        tracker.mark("message:1", CopyStatus::Copied);
        assert_eq!(tracker.status("message:1"), Some(CopyStatus::Copied));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(tracker.status("message:1"), Some(CopyStatus::Copied));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(tracker.status("message:1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remark_extends_visibility() {
        let tracker = CopyTracker::default();
        tracker.mark("message:1", CopyStatus::Error);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        tracker.mark("message:1", CopyStatus::Copied);
        tokio::time::sleep(Duration::from_millis(1000)).await;

        assert_eq!(tracker.status("message:1"), Some(CopyStatus::Copied));
        assert_eq!(tracker.snapshot().len(), 1);
    }
}
