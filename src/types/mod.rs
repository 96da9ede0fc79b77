//! Questionnaire data model.
//!
//! - [`questionnaire`] - Questionnaire and item tree
//! - [`extension`] - Extensions and the SDC extension URLs
//! - [`canonical`] - `url|version` references

pub mod canonical;
pub mod extension;
pub mod questionnaire;

pub use canonical::{Canonical, compare_versions};
pub use extension::{
    ASSEMBLE_EXPECTATION_URL, ASSEMBLED_FROM_URL, Extension, LAUNCH_CONTEXT_URL,
    SUB_QUESTIONNAIRE_URL, VARIABLE_URL, push_unique,
};
pub use questionnaire::{AssembleExpectation, ItemKind, Questionnaire, QuestionnaireItem};
