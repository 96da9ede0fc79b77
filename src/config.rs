//! Assembly configuration
//!
//! Configuration for where sub-questionnaires are resolved from: FHIR
//! servers, local module directories, the match policy for unversioned
//! canonicals and the optional cross-call cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AssembleError, Result};
#[cfg(feature = "http-client")]
use crate::resolver::FhirServerResolver;
use crate::resolver::{
    CacheConfig, CachedQuestionnaireResolver, CompositeQuestionnaireResolver,
    InMemoryQuestionnaireResolver, MatchPolicy, QuestionnaireResolver, ResolveResult,
};

/// Authentication for a FHIR server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerAuth {
    #[default]
    None,
    Bearer { token: String },
}

/// A FHIR server that Questionnaires can be searched on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FhirServerConfig {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Base URL, without trailing slash
    pub base_url: String,
    #[serde(default)]
    pub auth: ServerAuth,
    /// Extra request headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl FhirServerConfig {
    pub fn new(base_url: impl AsRef<str>) -> Self {
        let base_url = base_url.as_ref().trim_end_matches('/').to_string();
        Self {
            name: base_url.clone(),
            base_url,
            auth: ServerAuth::None,
            headers: HashMap::new(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Public HAPI FHIR R4 test server
    pub fn hapi_r4() -> Self {
        Self::new("https://hapi.fhir.org/baseR4").with_name("HAPI FHIR R4 (Public)")
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = ServerAuth::Bearer {
            token: token.into(),
        };
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Base URL with any trailing slashes removed.
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Name for logs and error messages; the base URL when no name is set.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.normalized_base_url()
        } else {
            &self.name
        }
    }
}

/// Top-level configuration for the assembler and its resolvers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssembleConfig {
    /// Servers, searched in order after local module directories
    #[serde(default)]
    pub servers: Vec<FhirServerConfig>,
    /// Directories of module JSON files, searched first
    #[serde(default)]
    pub module_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub match_policy: MatchPolicy,
    /// Cross-call resolver cache; disabled when absent
    #[serde(default)]
    pub cache: Option<CacheConfig>,
}

impl AssembleConfig {
    /// Load configuration from a JSON file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: AssembleConfig = serde_json::from_str(content)?;
        for server in &config.servers {
            url::Url::parse(server.normalized_base_url()).map_err(|e| {
                AssembleError::invalid_parameters(format!(
                    "Invalid server URL '{}': {e}",
                    server.base_url
                ))
            })?;
        }
        Ok(config)
    }

    /// Build the resolver chain: module directories first, then servers in
    /// order, wrapped in a cache when one is configured.
    pub async fn build_resolver(&self) -> ResolveResult<Arc<dyn QuestionnaireResolver>> {
        let mut chain = CompositeQuestionnaireResolver::new();

        if !self.module_dirs.is_empty() {
            let mut local = InMemoryQuestionnaireResolver::new().with_policy(self.match_policy);
            for dir in &self.module_dirs {
                local.load_directory(dir).await?;
            }
            chain.push(Arc::new(local));
        }

        #[cfg(feature = "http-client")]
        for server in &self.servers {
            let remote = FhirServerResolver::new(server.clone())?.with_policy(self.match_policy);
            chain.push(Arc::new(remote));
        }
        #[cfg(not(feature = "http-client"))]
        if !self.servers.is_empty() {
            tracing::warn!(
                "Ignoring {} configured server(s): built without the http-client feature",
                self.servers.len()
            );
        }

        let resolver: Arc<dyn QuestionnaireResolver> = Arc::new(chain);
        Ok(match &self.cache {
            Some(cache) => Arc::new(CachedQuestionnaireResolver::new(resolver, cache.clone())),
            None => resolver,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_server_url_normalized() {
        let server = FhirServerConfig::new("https://example.org/fhir///");
        assert_eq!(server.base_url, "https://example.org/fhir");
        assert_eq!(server.auth, ServerAuth::None);
        assert_eq!(server.timeout_secs, 30);
    }

    #[test]
    fn test_from_json() {
        let config = AssembleConfig::from_json(
            r#"{
                "servers": [
                    { "name": "local", "base_url": "http://localhost:8080/fhir",
                      "auth": { "type": "bearer", "token": "secret" },
                      "headers": { "X-Tenant": "demo" } }
                ],
                "module_dirs": ["./modules"],
                "match_policy": "latest",
                "cache": { "ttl_seconds": 120, "max_size": 50 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.servers.len(), 1);
        assert_eq!(
            config.servers[0].auth,
            ServerAuth::Bearer {
                token: "secret".to_string()
            }
        );
        assert_eq!(config.servers[0].headers["X-Tenant"], "demo");
        assert_eq!(config.match_policy, MatchPolicy::Latest);
        assert_eq!(config.cache.unwrap().ttl, Duration::from_secs(120));
    }

    #[test]
    fn test_defaults() {
        let config = AssembleConfig::from_json("{}").unwrap();
        assert!(config.servers.is_empty());
        assert_eq!(config.match_policy, MatchPolicy::Unique);
        assert!(config.cache.is_none());
    }

    #[test]
    fn test_display_name_falls_back_to_base_url() {
        let config =
            AssembleConfig::from_json(r#"{ "servers": [{ "base_url": "https://example.org/fhir/" }] }"#)
                .unwrap();
        let server = &config.servers[0];
        assert_eq!(server.name, "");
        assert_eq!(server.display_name(), "https://example.org/fhir");

        let named = server.clone().with_name("Local HAPI");
        assert_eq!(named.display_name(), "Local HAPI");
    }

    #[test]
    fn test_rejects_invalid_server_url() {
        let err = AssembleConfig::from_json(r#"{ "servers": [{ "base_url": "not a url" }] }"#)
            .unwrap_err();
        assert!(matches!(err, AssembleError::InvalidParameters { .. }));
    }

    #[tokio::test]
    async fn test_build_resolver_from_module_dirs() {
        use crate::types::Canonical;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("vitals.json"),
            r#"{ "resourceType": "Questionnaire", "url": "mod://vitals", "version": "2.1" }"#,
        )
        .unwrap();

        let config = AssembleConfig {
            module_dirs: vec![dir.path().to_path_buf()],
            cache: Some(CacheConfig::default()),
            ..Default::default()
        };
        let resolver = config.build_resolver().await.unwrap();

        let q = resolver
            .resolve(&Canonical::parse("mod://vitals").unwrap())
            .await
            .unwrap();
        assert_eq!(q.version.as_deref(), Some("2.1"));
        assert!(
            resolver
                .resolve(&Canonical::parse("mod://other").unwrap())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assemble.json");
        std::fs::write(&path, r#"{ "match_policy": "first" }"#).unwrap();

        let config = AssembleConfig::from_file(&path).await.unwrap();
        assert_eq!(config.match_policy, MatchPolicy::First);
    }
}
