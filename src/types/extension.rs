//! FHIR extensions and the SDC extension URLs the assembler understands.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Marks an item as a placeholder for another Questionnaire's items.
pub const SUB_QUESTIONNAIRE_URL: &str =
    "http://hl7.org/fhir/uv/sdc/StructureDefinition/sdc-questionnaire-subQuestionnaire";

/// Declares how a Questionnaire expects to take part in assembly.
pub const ASSEMBLE_EXPECTATION_URL: &str =
    "http://hl7.org/fhir/uv/sdc/StructureDefinition/sdc-questionnaire-assemble-expectation";

/// Provenance of an inlined sub-questionnaire.
pub const ASSEMBLED_FROM_URL: &str =
    "http://hl7.org/fhir/uv/sdc/StructureDefinition/sdc-questionnaire-assembledFrom";

/// Named FHIRPath variable.
pub const VARIABLE_URL: &str = "http://hl7.org/fhir/StructureDefinition/variable";

/// Launch context declaration.
pub const LAUNCH_CONTEXT_URL: &str =
    "http://hl7.org/fhir/uv/sdc/StructureDefinition/sdc-questionnaire-launchContext";

/// A single FHIR extension.
///
/// Only `url` is typed. The `value[x]` member, nested `extension` array of
/// complex extensions, and anything else are kept verbatim, so two
/// extensions compare equal exactly when their JSON is structurally equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    pub url: String,
    #[serde(flatten)]
    pub value: Map<String, Value>,
}

impl Extension {
    /// Create an extension with a single `value[x]` member, e.g. `valueCanonical`.
    pub fn with_value(url: impl Into<String>, key: impl Into<String>, value: Value) -> Self {
        let mut members = Map::new();
        members.insert(key.into(), value);
        Self {
            url: url.into(),
            value: members,
        }
    }

    /// Create an `assembledFrom` provenance entry.
    pub fn assembled_from(canonical: impl Into<String>) -> Self {
        Self::with_value(
            ASSEMBLED_FROM_URL,
            "valueCanonical",
            Value::String(canonical.into()),
        )
    }

    pub fn is(&self, url: &str) -> bool {
        self.url == url
    }

    /// String payload of `valueCanonical`, `valueCode`, `valueUri`, `valueUrl` or `valueString`.
    pub fn value_str(&self) -> Option<&str> {
        ["valueCanonical", "valueCode", "valueUri", "valueUrl", "valueString"]
            .iter()
            .find_map(|key| self.value.get(*key).and_then(Value::as_str))
    }

    /// Extensions that must never be carried from a sub-questionnaire to the root.
    pub fn is_assembly_marker(&self) -> bool {
        self.is(SUB_QUESTIONNAIRE_URL) || self.is(ASSEMBLE_EXPECTATION_URL)
    }
}

/// Append `candidate` to `target` unless an identical extension is already there.
///
/// Returns whether the extension was added.
pub fn push_unique(target: &mut Vec<Extension>, candidate: Extension) -> bool {
    if target.contains(&candidate) {
        return false;
    }
    target.push(candidate);
    true
}
