//! Common test utilities for assembly tests.
//!
//! Provides fixture loading and a resolver that records every call.

use async_trait::async_trait;
use octofhir_sdc_assembler::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Get the fixtures directory path.
#[allow(dead_code)]
pub fn fixtures_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).join("tests").join("fixtures")
}

/// Load a Questionnaire fixture by file stem.
#[allow(dead_code)]
pub fn load_fixture(name: &str) -> Questionnaire {
    let path = fixtures_dir().join(format!("{name}.json"));
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));
    let value = serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Invalid JSON in {}: {e}", path.display()));
    Questionnaire::from_value(value)
        .unwrap_or_else(|e| panic!("Invalid Questionnaire in {}: {e}", path.display()))
}

/// Wraps an in-memory resolver and counts calls per canonical.
#[derive(Default)]
pub struct RecordingResolver {
    inner: InMemoryQuestionnaireResolver,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingResolver {
    pub fn new(inner: InMemoryQuestionnaireResolver) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Resolver over the demographics, vitals and contact module fixtures.
    pub fn with_fixture_modules() -> Self {
        Self::new(
            InMemoryQuestionnaireResolver::new()
                .with(load_fixture("demographics-module"))
                .with(load_fixture("vitals-module"))
                .with(load_fixture("contact-module")),
        )
    }

    /// Canonicals requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for call in self.calls() {
            *counts.entry(call).or_insert(0) += 1;
        }
        counts
    }
}

#[async_trait]
impl QuestionnaireResolver for RecordingResolver {
    async fn resolve(&self, canonical: &Canonical) -> ResolveResult<Questionnaire> {
        self.calls.lock().unwrap().push(canonical.to_string());
        self.inner.resolve(canonical).await
    }
}

#[allow(dead_code)]
pub fn leaf(link_id: &str) -> QuestionnaireItem {
    QuestionnaireItem::new(link_id, "string").with_text(format!("Question {link_id}"))
}

#[allow(dead_code)]
pub fn link_ids(items: &[QuestionnaireItem]) -> Vec<String> {
    items.iter().map(|i| i.link_id.clone()).collect()
}

/// All linkIds in pre-order.
#[allow(dead_code)]
pub fn all_link_ids(items: &[QuestionnaireItem]) -> Vec<String> {
    let mut out = Vec::new();
    for item in items {
        out.push(item.link_id.clone());
        out.extend(all_link_ids(item.children()));
    }
    out
}

/// Canonicals recorded in `assembledFrom` entries, in order.
#[allow(dead_code)]
pub fn assembled_from(q: &Questionnaire) -> Vec<String> {
    q.extensions()
        .iter()
        .filter(|e| e.is(types::ASSEMBLED_FROM_URL))
        .filter_map(|e| e.value_str().map(str::to_string))
        .collect()
}
