//! Questionnaire resolution services.
//!
//! The assembler never fetches documents itself. It asks a
//! [`QuestionnaireResolver`] for each distinct canonical it meets, which keeps
//! the assembly algorithm independent of where modules live.
//!
//! # Implementations
//!
//! - [`InMemoryQuestionnaireResolver`] - documents held in memory or loaded from a directory
//! - [`CompositeQuestionnaireResolver`] - ordered fallback chain
//! - [`CachedQuestionnaireResolver`] - TTL cache shared across assembly calls
//! - [`FhirServerResolver`] - Questionnaire search on a FHIR server (`http-client` feature)
//!
//! # Example
//!
//! ```ignore
//! use octofhir_sdc_assembler::resolver::{InMemoryQuestionnaireResolver, MatchPolicy};
//!
//! let resolver = InMemoryQuestionnaireResolver::new()
//!     .with_policy(MatchPolicy::Latest)
//!     .with(demographics_module);
//! let module = resolver.resolve(&"http://example.org/Questionnaire/demo".parse()?).await?;
//! ```

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Canonical, Questionnaire, compare_versions};

pub mod cached;
pub mod composite;
#[cfg(feature = "http-client")]
pub mod http;
pub mod memory;

pub use cached::{CacheConfig, CacheStats, CachedQuestionnaireResolver};
pub use composite::CompositeQuestionnaireResolver;
#[cfg(feature = "http-client")]
pub use http::FhirServerResolver;
pub use memory::InMemoryQuestionnaireResolver;

/// Error codes for Questionnaire resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveErrorCode {
    /// RES1001: No Questionnaire matches the canonical
    NotFound = 1001,
    /// RES1002: Several Questionnaires match and the policy requires one
    Ambiguous = 1002,
    /// RES1003: Reference is not a usable canonical
    InvalidCanonical = 1003,
    /// RES1004: A matching resource could not be read as a Questionnaire
    InvalidResource = 1004,
    /// RES1005: Backing service unavailable
    ServiceUnavailable = 1005,
}

impl std::fmt::Display for ResolveErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RES{:04}", *self as u32)
    }
}

/// Errors a resolver can report
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
    #[error("Questionnaire {canonical} not found")]
    NotFound { canonical: String },

    #[error("Questionnaire {canonical} is ambiguous: {matches} matching versions")]
    Ambiguous { canonical: String, matches: usize },

    #[error("Invalid canonical reference: '{value}'")]
    InvalidCanonical { value: String },

    #[error("Resource returned for {canonical} is not a valid Questionnaire: {message}")]
    InvalidResource { canonical: String, message: String },

    #[error("Questionnaire resolution service unavailable: {message}")]
    ServiceUnavailable { message: String },
}

impl ResolveError {
    pub fn not_found(canonical: &Canonical) -> Self {
        Self::NotFound {
            canonical: canonical.to_string(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ResolveErrorCode {
        match self {
            ResolveError::NotFound { .. } => ResolveErrorCode::NotFound,
            ResolveError::Ambiguous { .. } => ResolveErrorCode::Ambiguous,
            ResolveError::InvalidCanonical { .. } => ResolveErrorCode::InvalidCanonical,
            ResolveError::InvalidResource { .. } => ResolveErrorCode::InvalidResource,
            ResolveError::ServiceUnavailable { .. } => ResolveErrorCode::ServiceUnavailable,
        }
    }
}

/// Result type for resolver operations
pub type ResolveResult<T> = Result<T, ResolveError>;

/// How to pick a document when an unversioned canonical matches several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Exactly one document must match
    #[default]
    Unique,
    /// Highest business version wins
    Latest,
    /// First candidate in source order wins
    First,
}

impl std::str::FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unique" => Ok(MatchPolicy::Unique),
            "latest" => Ok(MatchPolicy::Latest),
            "first" => Ok(MatchPolicy::First),
            other => Err(format!("Unknown match policy: {other}")),
        }
    }
}

/// Pick the document a canonical refers to from a candidate list.
///
/// Candidates whose url/version do not satisfy the canonical are ignored, so
/// callers may pass loosely filtered search results.
pub fn select_match(
    canonical: &Canonical,
    candidates: Vec<Questionnaire>,
    policy: MatchPolicy,
) -> ResolveResult<Questionnaire> {
    let mut matching: Vec<Questionnaire> = candidates
        .into_iter()
        .filter(|q| canonical.matches(q.url.as_deref(), q.version.as_deref()))
        .collect();

    match matching.len() {
        0 => Err(ResolveError::not_found(canonical)),
        1 => Ok(matching.remove(0)),
        count => match policy {
            MatchPolicy::Unique => Err(ResolveError::Ambiguous {
                canonical: canonical.to_string(),
                matches: count,
            }),
            MatchPolicy::First => Ok(matching.remove(0)),
            MatchPolicy::Latest => {
                let mut best = 0;
                for (idx, candidate) in matching.iter().enumerate().skip(1) {
                    let ord = compare_versions(
                        candidate.version.as_deref(),
                        matching[best].version.as_deref(),
                    );
                    if ord.is_gt() {
                        best = idx;
                    }
                }
                Ok(matching.swap_remove(best))
            }
        },
    }
}

/// Trait for Questionnaire resolution services.
///
/// Implementations return the single document a canonical refers to, or an
/// error. They should not cache on behalf of the assembler: every assembly
/// call already fetches each distinct canonical at most once.
///
/// # Example Implementation
///
/// ```ignore
/// struct RegistryResolver {
///     registry: Arc<FormRegistry>,
/// }
///
/// #[async_trait]
/// impl QuestionnaireResolver for RegistryResolver {
///     async fn resolve(&self, canonical: &Canonical) -> ResolveResult<Questionnaire> {
///         let candidates = self.registry.by_url(canonical.url()).await;
///         select_match(canonical, candidates, MatchPolicy::Unique)
///     }
/// }
/// ```
#[async_trait]
pub trait QuestionnaireResolver: Send + Sync {
    /// Resolve a canonical to a Questionnaire.
    ///
    /// # Returns
    ///
    /// * `Ok(Questionnaire)` - The referenced document
    /// * `Err(ResolveError::NotFound)` - No document matches
    /// * `Err(_)` - The document could not be determined
    async fn resolve(&self, canonical: &Canonical) -> ResolveResult<Questionnaire>;
}

#[async_trait]
impl<R: QuestionnaireResolver + ?Sized> QuestionnaireResolver for std::sync::Arc<R> {
    async fn resolve(&self, canonical: &Canonical) -> ResolveResult<Questionnaire> {
        (**self).resolve(canonical).await
    }
}
