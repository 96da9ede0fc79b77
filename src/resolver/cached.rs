//! Cross-call caching for resolvers.
//!
//! Each assembly call keeps its own fetch cache, so this wrapper only helps
//! when the same modules are assembled repeatedly (e.g. an editor that
//! re-assembles on every change).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};

use super::{QuestionnaireResolver, ResolveResult};
use crate::types::{Canonical, Questionnaire};

/// Configuration for the resolver cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live for cached documents
    #[serde(with = "duration_secs", rename = "ttl_seconds")]
    pub ttl: Duration,
    /// Maximum number of cached documents
    pub max_size: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_size: 1_000,
        }
    }
}

impl CacheConfig {
    pub fn new(ttl: Duration, max_size: u64) -> Self {
        Self { ttl, max_size }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Statistics about the cache
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entry_count: u64,
    pub weighted_size: u64,
}

/// A cached wrapper around a QuestionnaireResolver.
///
/// Only successful resolutions are cached; failures always reach the inner
/// resolver again.
pub struct CachedQuestionnaireResolver {
    inner: Arc<dyn QuestionnaireResolver>,
    cache: Cache<Canonical, Arc<Questionnaire>>,
}

impl CachedQuestionnaireResolver {
    pub fn new(inner: Arc<dyn QuestionnaireResolver>, config: CacheConfig) -> Self {
        let cache = Cache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_size)
            .build();

        Self { inner, cache }
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.cache.entry_count(),
            weighted_size: self.cache.weighted_size(),
        }
    }

    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }
}

#[async_trait]
impl QuestionnaireResolver for CachedQuestionnaireResolver {
    async fn resolve(&self, canonical: &Canonical) -> ResolveResult<Questionnaire> {
        if let Some(hit) = self.cache.get(canonical).await {
            tracing::debug!("Resolver cache hit for {}", canonical);
            return Ok(hit.as_ref().clone());
        }

        let questionnaire = self.inner.resolve(canonical).await?;
        self.cache
            .insert(canonical.clone(), Arc::new(questionnaire.clone()))
            .await;

        Ok(questionnaire)
    }
}
