//! Questionnaire search against a FHIR server.
//!
//! Resolves a canonical with `GET [base]/Questionnaire?url=<url>&version=<version>`
//! and picks the match from the returned searchset Bundle.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use super::{MatchPolicy, QuestionnaireResolver, ResolveError, ResolveResult, select_match};
use crate::config::{FhirServerConfig, ServerAuth};
use crate::types::{Canonical, Questionnaire};

const FHIR_JSON: &str = "application/fhir+json";

/// Resolves canonicals by searching a FHIR server.
#[derive(Debug, Clone)]
pub struct FhirServerResolver {
    config: FhirServerConfig,
    client: reqwest::Client,
    policy: MatchPolicy,
}

impl FhirServerResolver {
    pub fn new(config: FhirServerConfig) -> ResolveResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(build_headers(&config)?)
            .build()
            .map_err(|e| ResolveError::ServiceUnavailable {
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            config,
            client,
            policy: MatchPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &FhirServerConfig {
        &self.config
    }

    /// Search URL for a canonical.
    pub fn search_url(&self, canonical: &Canonical) -> ResolveResult<url::Url> {
        let base = self.config.normalized_base_url();
        let mut url = url::Url::parse(&format!("{base}/Questionnaire")).map_err(|e| {
            ResolveError::ServiceUnavailable {
                message: format!("Invalid server URL '{base}': {e}"),
            }
        })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("url", canonical.url());
            if let Some(version) = canonical.version() {
                query.append_pair("version", version);
            }
        }
        Ok(url)
    }
}

fn build_headers(config: &FhirServerConfig) -> ResolveResult<HeaderMap> {
    let invalid = |name: &str| ResolveError::ServiceUnavailable {
        message: format!("Invalid header '{name}' for server {}", config.display_name()),
    };

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(FHIR_JSON));
    for (name, value) in &config.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid(name))?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid(name))?;
        headers.insert(header_name, header_value);
    }
    if let ServerAuth::Bearer { token } = &config.auth
        && !token.is_empty()
    {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| invalid("Authorization"))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

/// Human-readable message for a failed FHIR response.
///
/// Prefers the first OperationOutcome issue's diagnostics, then its details text.
pub fn error_message(status: u16, body: &Value) -> String {
    let issue = body.get("issue").and_then(|i| i.get(0));
    issue
        .and_then(|i| i.get("diagnostics"))
        .and_then(Value::as_str)
        .or_else(|| {
            issue
                .and_then(|i| i.pointer("/details/text"))
                .and_then(Value::as_str)
        })
        .or_else(|| body.as_str().filter(|s| !s.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

/// Parse the body of a successful search response.
///
/// Only a Bundle counts as an answer. An OperationOutcome is a server-side
/// failure; anything else (e.g. a proxy login page) is an invalid response.
pub fn search_bundle(canonical: &Canonical, body: &str) -> ResolveResult<Value> {
    let invalid = |message: String| ResolveError::InvalidResource {
        canonical: canonical.to_string(),
        message,
    };

    let value: Value = serde_json::from_str(body)
        .map_err(|e| invalid(format!("search response is not JSON: {e}")))?;
    match value.get("resourceType").and_then(Value::as_str) {
        Some("Bundle") => Ok(value),
        Some("OperationOutcome") => Err(ResolveError::ServiceUnavailable {
            message: error_message(200, &value),
        }),
        Some(other) => Err(invalid(format!("expected a searchset Bundle, got {other}"))),
        None => Err(invalid("expected a searchset Bundle".to_string())),
    }
}

/// Questionnaires contained in a searchset Bundle, in entry order.
pub fn bundle_questionnaires(canonical: &Canonical, bundle: &Value) -> ResolveResult<Vec<Questionnaire>> {
    let Some(entries) = bundle.get("entry").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    entries
        .iter()
        .filter_map(|entry| entry.get("resource"))
        .filter(|resource| {
            resource.get("resourceType").and_then(Value::as_str) == Some("Questionnaire")
        })
        .map(|resource| {
            Questionnaire::from_value(resource.clone()).map_err(|e| {
                ResolveError::InvalidResource {
                    canonical: canonical.to_string(),
                    message: e.to_string(),
                }
            })
        })
        .collect()
}

#[async_trait]
impl QuestionnaireResolver for FhirServerResolver {
    async fn resolve(&self, canonical: &Canonical) -> ResolveResult<Questionnaire> {
        let url = self.search_url(canonical)?;
        tracing::debug!("Searching {} for {}", self.config.display_name(), canonical);

        let unavailable = |e: reqwest::Error| ResolveError::ServiceUnavailable {
            message: format!("{}: {e}", self.config.display_name()),
        };

        let response = self.client.get(url).send().await.map_err(unavailable)?;
        let status = response.status();
        let text = response.text().await.map_err(unavailable)?;

        if !status.is_success() {
            let body: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));
            return Err(ResolveError::ServiceUnavailable {
                message: error_message(status.as_u16(), &body),
            });
        }

        let bundle = search_bundle(canonical, &text)?;
        let candidates = bundle_questionnaires(canonical, &bundle)?;
        select_match(canonical, candidates, self.policy)
    }
}
