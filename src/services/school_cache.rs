//! # School Reference Cache
//!
//! Injected read-through cache over the school/district reference data that
//! validation consumes. `get` resolves through the provider on a miss;
//! `refresh` replaces the whole map and is driven by a scheduled task outside
//! the core. Deliberately not a process-wide singleton.

use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct School {
    pub school_id: String,
    pub district_id: String,
    pub display_name: String,
}

/// Source of truth for school reference data
#[async_trait]
pub trait SchoolProvider: Send + Sync {
    async fn load_school(&self, school_id: &str) -> Result<Option<School>>;
    async fn load_all(&self) -> Result<Vec<School>>;
}

pub struct SchoolCache {
    provider: Arc<dyn SchoolProvider>,
    schools: DashMap<String, School>,
}

impl SchoolCache {
    pub fn new(provider: Arc<dyn SchoolProvider>) -> Self {
        Self {
            provider,
            schools: DashMap::new(),
        }
    }

    /// Read-through lookup by ministry school code
    pub async fn get(&self, school_id: &str) -> Result<Option<School>> {
        if let Some(school) = self.schools.get(school_id) {
            return Ok(Some(school.clone()));
        }
        match self.provider.load_school(school_id).await? {
            Some(school) => {
                self.schools.insert(school_id.to_string(), school.clone());
                Ok(Some(school))
            }
            None => Ok(None),
        }
    }

    /// Replace the cached map wholesale
    pub async fn refresh(&self) -> Result<usize> {
        let schools = self.provider.load_all().await?;
        self.schools.clear();
        for school in schools {
            self.schools.insert(school.school_id.clone(), school);
        }
        let count = self.schools.len();
        debug!(count, "School reference cache refreshed");
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.schools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl SchoolProvider for CountingProvider {
        async fn load_school(&self, school_id: &str) -> Result<Option<School>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(Some(School {
                school_id: school_id.to_string(),
                district_id: "036".into(),
                display_name: "Test Secondary".into(),
            }))
        }

        async fn load_all(&self) -> Result<Vec<School>> {
            Ok(vec![School {
                school_id: "03636018".into(),
                district_id: "036".into(),
                display_name: "Test Secondary".into(),
            }])
        }
    }

    #[tokio::test]
    async fn test_get_reads_through_once() {
        let provider = Arc::new(CountingProvider {
            lookups: AtomicUsize::new(0),
        });
        let cache = SchoolCache::new(provider.clone());

        assert!(cache.get("03636018").await.unwrap().is_some());
        assert!(cache.get("03636018").await.unwrap().is_some());
        assert_eq!(provider.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_replaces_map() {
        let provider = Arc::new(CountingProvider {
            lookups: AtomicUsize::new(0),
        });
        let cache = SchoolCache::new(provider);
        assert!(cache.is_empty());
        assert_eq!(cache.refresh().await.unwrap(), 1);
        assert_eq!(cache.len(), 1);
    }
}
