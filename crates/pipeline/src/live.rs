//! Live entity data seam.

use std::sync::{Arc, RwLock};

use mf_core::live::{EntityCollection, LiveSnapshot};

/// Source of the current per-schema record collections.
pub trait LiveDataProvider: Send + Sync {
    /// The collection for `schema_name`. Unknown schemas are empty.
    fn collection(&self, schema_name: &str) -> EntityCollection;
}

impl LiveDataProvider for LiveSnapshot {
    fn collection(&self, schema_name: &str) -> EntityCollection {
        LiveSnapshot::collection(self, schema_name)
            .cloned()
            .unwrap_or_default()
    }
}

impl<T: LiveDataProvider + ?Sized> LiveDataProvider for Arc<T> {
    fn collection(&self, schema_name: &str) -> EntityCollection {
        (**self).collection(schema_name)
    }
}

/// Copy the collections of `schema_names` into a snapshot for one pass.
pub fn snapshot<L: LiveDataProvider + ?Sized>(provider: &L, schema_names: &[String]) -> LiveSnapshot {
    schema_names.iter().fold(LiveSnapshot::new(), |snapshot, name| {
        snapshot.with(name.clone(), provider.collection(name))
    })
}

/// Collections updated by the application as they load.
#[derive(Debug, Clone, Default)]
pub struct SharedLiveData {
    inner: Arc<RwLock<LiveSnapshot>>,
}

impl SharedLiveData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, schema_name: impl Into<String>, collection: EntityCollection) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(schema_name, collection);
    }
}

impl LiveDataProvider for SharedLiveData {
    fn collection(&self, schema_name: &str) -> EntityCollection {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        LiveDataProvider::collection(&*guard, schema_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_copies_requested_collections() {
        let shared = SharedLiveData::new();
        shared.set("wave", EntityCollection::loading());

        let snap = snapshot(&shared, &["wave".to_string(), "server".to_string()]);
        assert!(snap.collection("wave").unwrap().is_loading);
        assert!(!snap.collection("server").unwrap().is_loading);

        shared.set("wave", EntityCollection::loaded(Vec::new()));
        // Earlier snapshots are unaffected.
        assert!(snap.collection("wave").unwrap().is_loading);
    }
}
