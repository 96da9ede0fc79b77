//! octofhir-sdc-assembler - client-side SDC `$assemble` for modular Questionnaires.
//!
//! A modular Questionnaire pulls in reusable sub-questionnaires through items
//! carrying the `sdc-questionnaire-subQuestionnaire` extension. This crate
//! produces the flattened Questionnaire a server-side `$assemble` would return:
//! every reference replaced by the referenced items, module-level extensions
//! merged into the root, and one `assembledFrom` entry per inlined module.
//!
//! # Quick Start
//!
//! ```ignore
//! use octofhir_sdc_assembler::{Assembler, InMemoryQuestionnaireResolver, Questionnaire};
//! use std::sync::Arc;
//!
//! let resolver = InMemoryQuestionnaireResolver::new().with(demographics_module);
//! let assembler = Assembler::new(Arc::new(resolver));
//!
//! let assembled = assembler.assemble(&root, None).await?;
//! assert!(!assembled.needs_assembly());
//! ```
//!
//! # Module Organization
//!
//! - [`types`] - Questionnaire, item, extension and canonical types
//! - [`resolver`] - Where sub-questionnaires come from
//! - [`assembler`] - The assembly algorithm
//! - [`operation`] - `$assemble` Parameters in and out
//! - [`config`] - Server and resolver configuration

pub mod assembler;
pub mod config;
pub mod error;
pub mod operation;
pub mod resolver;
pub mod types;

// Assembly exports
pub use assembler::{Assembler, ProgressSink, assemble};

// Error exports
pub use error::{AssembleError, AssembleErrorCode, Result};

// Config exports
pub use config::{AssembleConfig, FhirServerConfig, ServerAuth};

// Operation exports
pub use operation::{assemble_operation, output_parameters, questionnaire_from_parameters};

// Resolver exports
#[cfg(feature = "http-client")]
pub use resolver::FhirServerResolver;
pub use resolver::{
    CacheConfig, CachedQuestionnaireResolver, CompositeQuestionnaireResolver,
    InMemoryQuestionnaireResolver, MatchPolicy, QuestionnaireResolver, ResolveError,
    ResolveErrorCode, ResolveResult, select_match,
};

// Type exports
pub use types::{
    AssembleExpectation, Canonical, Extension, ItemKind, Questionnaire, QuestionnaireItem,
};
