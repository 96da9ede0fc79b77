//! In-memory Questionnaire store.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use super::{MatchPolicy, QuestionnaireResolver, ResolveError, ResolveResult, select_match};
use crate::types::{Canonical, Questionnaire};

/// Resolves canonicals against documents held in memory.
///
/// Useful for tests, for bundling modules with an application, and for
/// assembling against a local directory of module files.
#[derive(Debug, Default, Clone)]
pub struct InMemoryQuestionnaireResolver {
    documents: Vec<Questionnaire>,
    policy: MatchPolicy,
}

impl InMemoryQuestionnaireResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Add a document, builder style.
    pub fn with(mut self, questionnaire: Questionnaire) -> Self {
        self.insert(questionnaire);
        self
    }

    pub fn insert(&mut self, questionnaire: Questionnaire) {
        self.documents.push(questionnaire);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Load every `*.json` Questionnaire found directly in `dir`.
    ///
    /// Files holding other resource types are skipped. Unreadable or
    /// malformed JSON is an error.
    pub async fn from_directory(dir: impl AsRef<Path>) -> ResolveResult<Self> {
        let mut resolver = Self::new();
        resolver.load_directory(dir).await?;
        Ok(resolver)
    }

    /// Add every Questionnaire found directly in `dir`; returns how many were loaded.
    pub async fn load_directory(&mut self, dir: impl AsRef<Path>) -> ResolveResult<usize> {
        let dir = dir.as_ref();
        let unavailable = |e: std::io::Error| ResolveError::ServiceUnavailable {
            message: format!("{}: {e}", dir.display()),
        };

        let mut entries = tokio::fs::read_dir(dir).await.map_err(unavailable)?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(unavailable)? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        // Directory iteration order is platform dependent
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let content = tokio::fs::read_to_string(&path).await.map_err(unavailable)?;
            let invalid = |message: String| ResolveError::InvalidResource {
                canonical: path.display().to_string(),
                message,
            };
            let value: Value = serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;

            if value.get("resourceType").and_then(Value::as_str) != Some("Questionnaire") {
                tracing::debug!("Skipping non-Questionnaire file {}", path.display());
                continue;
            }

            let questionnaire =
                Questionnaire::from_value(value).map_err(|e| invalid(e.to_string()))?;
            tracing::debug!(
                "Loaded Questionnaire {} from {}",
                questionnaire.url.as_deref().unwrap_or("<no url>"),
                path.display()
            );
            self.insert(questionnaire);
            loaded += 1;
        }

        tracing::info!("Loaded {} Questionnaire(s) from {}", loaded, dir.display());
        Ok(loaded)
    }
}

#[async_trait]
impl QuestionnaireResolver for InMemoryQuestionnaireResolver {
    async fn resolve(&self, canonical: &Canonical) -> ResolveResult<Questionnaire> {
        let candidates = self
            .documents
            .iter()
            .filter(|q| canonical.matches(q.url.as_deref(), q.version.as_deref()))
            .cloned()
            .collect();
        select_match(canonical, candidates, self.policy)
    }
}
