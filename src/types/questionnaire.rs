//! Questionnaire and item definitions.
//!
//! Only the members the assembler reads or rewrites are typed. Everything
//! else (`text`, `required`, `answerOption`, `enableWhen`, ...) is carried in
//! a flattened map and written back untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::canonical::Canonical;
use super::extension::{ASSEMBLE_EXPECTATION_URL, Extension, SUB_QUESTIONNAIRE_URL};

fn questionnaire_resource_type() -> String {
    "Questionnaire".to_string()
}

/// A FHIR R4 Questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Questionnaire {
    #[serde(rename = "resourceType", default = "questionnaire_resource_type")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<Vec<Extension>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Vec<QuestionnaireItem>>,
    /// Remaining members, preserved verbatim
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Default for Questionnaire {
    fn default() -> Self {
        Self {
            resource_type: questionnaire_resource_type(),
            id: None,
            url: None,
            version: None,
            name: None,
            title: None,
            status: None,
            extension: None,
            item: None,
            other: Map::new(),
        }
    }
}

impl Questionnaire {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            status: Some("active".to_string()),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_item(mut self, item: QuestionnaireItem) -> Self {
        self.item.get_or_insert_with(Vec::new).push(item);
        self
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extension.get_or_insert_with(Vec::new).push(extension);
        self
    }

    /// Parse a Questionnaire from JSON, rejecting other resource types.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let questionnaire: Questionnaire = serde_json::from_value(value)?;
        if questionnaire.resource_type != "Questionnaire" {
            return Err(serde::de::Error::custom(format!(
                "expected resourceType Questionnaire, got {}",
                questionnaire.resource_type
            )));
        }
        Ok(questionnaire)
    }

    pub fn items(&self) -> &[QuestionnaireItem] {
        self.item.as_deref().unwrap_or_default()
    }

    pub fn extensions(&self) -> &[Extension] {
        self.extension.as_deref().unwrap_or_default()
    }

    /// The canonical this document is published under, if it has a url.
    pub fn canonical(&self) -> Option<Canonical> {
        self.url
            .as_deref()
            .map(|url| Canonical::new(url, self.version.clone()))
    }

    /// Whether any item at any depth is a sub-questionnaire reference.
    pub fn needs_assembly(&self) -> bool {
        fn any_reference(items: &[QuestionnaireItem]) -> bool {
            items
                .iter()
                .any(|item| item.is_sub_questionnaire() || any_reference(item.children()))
        }
        any_reference(self.items())
    }

    pub fn assemble_expectation(&self) -> Option<AssembleExpectation> {
        self.extensions()
            .iter()
            .find(|ext| ext.is(ASSEMBLE_EXPECTATION_URL))
            .and_then(Extension::value_str)
            .and_then(AssembleExpectation::parse_code)
    }
}

/// A Questionnaire item. Items own their children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireItem {
    #[serde(rename = "linkId")]
    pub link_id: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<Vec<Extension>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Vec<QuestionnaireItem>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Structural role of an item during assembly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemKind<'a> {
    /// Placeholder for another Questionnaire; holds the raw `valueCanonical`
    SubQuestionnaire(Option<&'a str>),
    /// Item with nested children
    Group(&'a [QuestionnaireItem]),
    Leaf,
}

impl QuestionnaireItem {
    pub fn new(link_id: impl Into<String>, item_type: impl Into<String>) -> Self {
        Self {
            link_id: link_id.into(),
            item_type: item_type.into(),
            text: None,
            extension: None,
            item: None,
            other: Map::new(),
        }
    }

    /// A display item that stands in for the referenced Questionnaire.
    pub fn sub_questionnaire(link_id: impl Into<String>, canonical: impl Into<String>) -> Self {
        Self::new(link_id, "display").with_extension(Extension::with_value(
            SUB_QUESTIONNAIRE_URL,
            "valueCanonical",
            Value::String(canonical.into()),
        ))
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: QuestionnaireItem) -> Self {
        self.item.get_or_insert_with(Vec::new).push(child);
        self
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extension.get_or_insert_with(Vec::new).push(extension);
        self
    }

    pub fn children(&self) -> &[QuestionnaireItem] {
        self.item.as_deref().unwrap_or_default()
    }

    pub fn extensions(&self) -> &[Extension] {
        self.extension.as_deref().unwrap_or_default()
    }

    pub fn is_sub_questionnaire(&self) -> bool {
        self.extensions().iter().any(|ext| ext.is(SUB_QUESTIONNAIRE_URL))
    }

    pub fn kind(&self) -> ItemKind<'_> {
        if let Some(ext) = self
            .extensions()
            .iter()
            .find(|ext| ext.is(SUB_QUESTIONNAIRE_URL))
        {
            return ItemKind::SubQuestionnaire(ext.value_str());
        }
        match self.item.as_deref() {
            Some(children) if !children.is_empty() => ItemKind::Group(children),
            _ => ItemKind::Leaf,
        }
    }
}

/// SDC `assemble-expectation` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssembleExpectation {
    AssembleRoot,
    AssembleRootOrChild,
    AssembleChild,
    Independent,
}

impl AssembleExpectation {
    pub fn parse_code(code: &str) -> Option<Self> {
        match code {
            "assemble-root" => Some(Self::AssembleRoot),
            "assemble-root-or-child" => Some(Self::AssembleRootOrChild),
            "assemble-child" => Some(Self::AssembleChild),
            "independent" => Some(Self::Independent),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::AssembleRoot => "assemble-root",
            Self::AssembleRootOrChild => "assemble-root-or-child",
            Self::AssembleChild => "assemble-child",
            Self::Independent => "independent",
        }
    }

    /// Whether a document with this expectation may be inlined into another one.
    pub fn allows_child(&self) -> bool {
        matches!(self, Self::AssembleChild | Self::AssembleRootOrChild)
    }
}
