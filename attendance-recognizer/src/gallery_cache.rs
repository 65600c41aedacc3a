use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use attendance_types::gallery::{GalleryEntry, GalleryMatrix};
use attendance_types::CompanyId;

use crate::error::{Error, Result};

/// External collaborator that fetches enrolled embeddings for a company.
/// Real implementations hit the backend store (`SPEC_FULL.md` §6).
pub trait BackendGalleryClient: Send + Sync {
    fn fetch_gallery(&self, company: Option<&CompanyId>) -> Result<Vec<GalleryEntry>>;
}

struct Slot {
    matrix: Arc<GalleryMatrix>,
    fetched_at: f64,
}

/// Lazily-refreshed, per-company gallery cache. Mirrors the `RwLock`-guarded
/// rebuild-on-demand pattern used for geometry caches elsewhere in the
/// reference corpus: readers take a shared lock on the hot path, a refresh
/// takes the lock for the rebuild only.
#[derive(Default)]
pub struct GalleryCache {
    slots: RwLock<HashMap<Option<CompanyId>, Slot>>,
}

impl GalleryCache {
    pub fn new() -> Self {
        GalleryCache {
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached gallery for `company`, refreshing it from `client`
    /// if it is missing or older than `refresh_seconds`.
    pub fn get(
        &self,
        company: Option<&CompanyId>,
        now: f64,
        refresh_seconds: f64,
        client: &dyn BackendGalleryClient,
    ) -> Result<Arc<GalleryMatrix>> {
        let key = company.cloned();
        if let Some(slot) = self.slots.read().get(&key) {
            if now - slot.fetched_at < refresh_seconds {
                return Ok(slot.matrix.clone());
            }
        }

        let entries = client.fetch_gallery(company)?;
        let matrix = Arc::new(GalleryMatrix::from_entries(entries));
        self.slots.write().insert(
            key,
            Slot {
                matrix: matrix.clone(),
                fetched_at: now,
            },
        );
        Ok(matrix)
    }

    pub fn invalidate(&self, company: Option<&CompanyId>) {
        self.slots.write().remove(&company.cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClient {
        calls: AtomicUsize,
    }

    impl BackendGalleryClient for CountingClient {
        fn fetch_gallery(&self, _company: Option<&CompanyId>) -> Result<Vec<GalleryEntry>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![GalleryEntry {
                employee_id: attendance_types::EmployeeId::new("1"),
                employee_name: "Asif".into(),
                angle: "front".into(),
                embedding: vec![1.0, 0.0],
            }])
        }
    }

    #[test]
    fn refreshes_only_after_ttl_elapses() {
        let cache = GalleryCache::new();
        let client = CountingClient {
            calls: AtomicUsize::new(0),
        };
        cache.get(None, 0.0, 300.0, &client).unwrap();
        cache.get(None, 1.0, 300.0, &client).unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        cache.get(None, 400.0, 300.0, &client).unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn invalidate_forces_next_refresh() {
        let cache = GalleryCache::new();
        let client = CountingClient {
            calls: AtomicUsize::new(0),
        };
        cache.get(None, 0.0, 300.0, &client).unwrap();
        cache.invalidate(None);
        cache.get(None, 1.0, 300.0, &client).unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }
}
