use std::sync::Arc;

use async_trait::async_trait;

use super::{QuestionnaireResolver, ResolveError, ResolveResult};
use crate::types::{Canonical, Questionnaire};

/// Tries resolvers in order, falling through only on `NotFound`.
///
/// Any other error stops the chain: an unreachable server must not be masked
/// by a stale local copy further down.
#[derive(Default, Clone)]
pub struct CompositeQuestionnaireResolver {
    resolvers: Vec<Arc<dyn QuestionnaireResolver>>,
}

impl CompositeQuestionnaireResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: Arc<dyn QuestionnaireResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn push(&mut self, resolver: Arc<dyn QuestionnaireResolver>) {
        self.resolvers.push(resolver);
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl std::fmt::Debug for CompositeQuestionnaireResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeQuestionnaireResolver")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

#[async_trait]
impl QuestionnaireResolver for CompositeQuestionnaireResolver {
    async fn resolve(&self, canonical: &Canonical) -> ResolveResult<Questionnaire> {
        for resolver in &self.resolvers {
            match resolver.resolve(canonical).await {
                Err(ResolveError::NotFound { .. }) => continue,
                other => return other,
            }
        }
        Err(ResolveError::not_found(canonical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::InMemoryQuestionnaireResolver;

    struct Unavailable;

    #[async_trait]
    impl QuestionnaireResolver for Unavailable {
        async fn resolve(&self, _canonical: &Canonical) -> ResolveResult<Questionnaire> {
            Err(ResolveError::ServiceUnavailable {
                message: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_falls_through_on_not_found() {
        let local = InMemoryQuestionnaireResolver::new()
            .with(Questionnaire::new("mod://a").with_version("local"));
        let remote = InMemoryQuestionnaireResolver::new()
            .with(Questionnaire::new("mod://b").with_version("remote"));

        let resolver = CompositeQuestionnaireResolver::new()
            .with(Arc::new(local))
            .with(Arc::new(remote));

        let b = resolver
            .resolve(&Canonical::parse("mod://b").unwrap())
            .await
            .unwrap();
        assert_eq!(b.version.as_deref(), Some("remote"));

        let err = resolver
            .resolve(&Canonical::parse("mod://c").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_stops_on_service_error() {
        let fallback =
            InMemoryQuestionnaireResolver::new().with(Questionnaire::new("mod://a"));
        let resolver = CompositeQuestionnaireResolver::new()
            .with(Arc::new(Unavailable))
            .with(Arc::new(fallback));

        let err = resolver
            .resolve(&Canonical::parse("mod://a").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::ServiceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let resolver = CompositeQuestionnaireResolver::new();
        assert!(resolver.is_empty());
        assert!(
            resolver
                .resolve(&Canonical::parse("mod://a").unwrap())
                .await
                .is_err()
        );
    }
}
