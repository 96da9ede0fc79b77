//! Client-side SDC `$assemble`.
//!
//! Replaces every sub-questionnaire reference item with the items of the
//! Questionnaire it names, recursively, and records what was inlined.
//!
//! # Algorithm
//!
//! Items are walked depth-first, left to right. A reference is fully resolved,
//! including references inside the fetched module, before its next sibling is
//! looked at. The walk is a fold: each level returns its rebuilt items together
//! with the module-level extensions that must travel up to the root, and only
//! the top-level call touches the output document.
//!
//! Every call owns an [`AssemblyRun`] holding the fetch cache and the stack of
//! canonicals currently being inlined. Nothing is shared between calls, so
//! concurrent assemblies cannot observe each other.
//!
//! # Example
//!
//! ```ignore
//! use octofhir_sdc_assembler::{Assembler, InMemoryQuestionnaireResolver};
//! use std::sync::Arc;
//!
//! let resolver = InMemoryQuestionnaireResolver::from_directory("modules").await?;
//! let assembler = Assembler::new(Arc::new(resolver));
//!
//! let progress = |message: &str| eprintln!("{message}");
//! let assembled = assembler.assemble(&root, Some(&progress)).await?;
//! assert!(!assembled.needs_assembly());
//! ```

use std::sync::Arc;

use async_recursion::async_recursion;
use indexmap::IndexMap;
use serde_json::Map;

use crate::error::{AssembleError, Result};
use crate::resolver::QuestionnaireResolver;
use crate::types::{
    ASSEMBLE_EXPECTATION_URL, ASSEMBLED_FROM_URL, Canonical, Extension, ItemKind, Questionnaire,
    QuestionnaireItem, push_unique,
};

/// Receives human-readable status messages while an assembly runs.
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, message: &str) {
        self(message)
    }
}

/// Assembles modular Questionnaires using a resolver.
#[derive(Clone)]
pub struct Assembler {
    resolver: Arc<dyn QuestionnaireResolver>,
}

impl std::fmt::Debug for Assembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assembler").finish_non_exhaustive()
    }
}

impl Assembler {
    pub fn new(resolver: Arc<dyn QuestionnaireResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Arc<dyn QuestionnaireResolver> {
        &self.resolver
    }

    /// Assemble `root` into a Questionnaire without sub-questionnaire references.
    ///
    /// `root` is left untouched. Fails on the first reference that cannot be
    /// resolved or that loops back to a Questionnaire already being inlined;
    /// no partial document is returned.
    pub async fn assemble(
        &self,
        root: &Questionnaire,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<Questionnaire> {
        assemble(self.resolver.as_ref(), root, progress).await
    }
}

/// One-off assembly without constructing an [`Assembler`].
pub async fn assemble(
    resolver: &dyn QuestionnaireResolver,
    root: &Questionnaire,
    progress: Option<&dyn ProgressSink>,
) -> Result<Questionnaire> {
    let label = root
        .canonical()
        .map(|c| c.to_string())
        .or_else(|| root.id.clone())
        .unwrap_or_else(|| "<anonymous>".to_string());

    let mut run = AssemblyRun::new(resolver, progress);
    if let Some(canonical) = root.canonical() {
        run.resolving.push(canonical);
    }

    run.report(&format!("Assembling Questionnaire {label}"));
    let folded = run.assemble_items(root.items()).await?;

    let mut output = questionnaire_shell(root);
    output.item = match &root.item {
        Some(original) if !original.is_empty() && folded.items.is_empty() => None,
        Some(_) => Some(folded.items),
        None => None,
    };

    let mut extensions: Vec<Extension> = root
        .extensions()
        .iter()
        .filter(|ext| !ext.is(ASSEMBLE_EXPECTATION_URL))
        .cloned()
        .collect();
    for ext in folded.extensions {
        push_unique(&mut extensions, ext);
    }
    for canonical in run.fetched.keys() {
        push_unique(&mut extensions, Extension::assembled_from(canonical.to_string()));
    }
    output.extension = (!extensions.is_empty()).then_some(extensions);

    let count = run.fetched.len();
    run.report(&format!(
        "Assembly of {label} complete: {count} sub-questionnaire(s) resolved"
    ));

    Ok(output)
}

/// Items and hoisted extensions produced by one level of the walk.
#[derive(Debug, Default)]
struct Folded {
    items: Vec<QuestionnaireItem>,
    extensions: Vec<Extension>,
}

impl Folded {
    fn absorb_extensions(&mut self, extensions: Vec<Extension>) {
        for ext in extensions {
            push_unique(&mut self.extensions, ext);
        }
    }
}

/// State of a single assembly call.
struct AssemblyRun<'a> {
    resolver: &'a dyn QuestionnaireResolver,
    progress: Option<&'a dyn ProgressSink>,
    /// Fetch cache; insertion order is provenance order
    fetched: IndexMap<Canonical, Arc<Questionnaire>>,
    /// Resolved canonicals of the documents being inlined, outermost first
    resolving: Vec<Canonical>,
}

impl<'a> AssemblyRun<'a> {
    fn new(resolver: &'a dyn QuestionnaireResolver, progress: Option<&'a dyn ProgressSink>) -> Self {
        Self {
            resolver,
            progress,
            fetched: IndexMap::new(),
            resolving: Vec::new(),
        }
    }

    fn report(&self, message: &str) {
        tracing::info!("{}", message);
        if let Some(sink) = self.progress {
            sink.report(message);
        }
    }

    #[async_recursion]
    async fn assemble_items(&mut self, items: &[QuestionnaireItem]) -> Result<Folded> {
        let mut folded = Folded::default();

        for item in items {
            match item.kind() {
                ItemKind::SubQuestionnaire(reference) => {
                    let inlined = self.inline(reference.unwrap_or_default()).await?;
                    folded.items.extend(inlined.items);
                    folded.absorb_extensions(inlined.extensions);
                }
                ItemKind::Group(children) => {
                    let nested = self.assemble_items(children).await?;
                    let mut group = item_shell(item);
                    group.item = (!nested.items.is_empty()).then_some(nested.items);
                    folded.items.push(group);
                    folded.absorb_extensions(nested.extensions);
                }
                ItemKind::Leaf => folded.items.push(item.clone()),
            }
        }

        Ok(folded)
    }

    /// Items of the referenced module, assembled, plus the extensions it hoists.
    async fn inline(&mut self, reference: &str) -> Result<Folded> {
        let canonical = Canonical::parse(reference)
            .map_err(|e| AssembleError::resolution_failed(reference, e))?;

        if self.resolving.iter().any(|active| canonical.refers_to(active)) {
            let mut chain: Vec<String> = self.resolving.iter().map(ToString::to_string).collect();
            chain.push(canonical.to_string());
            return Err(AssembleError::cycle_detected(canonical.to_string(), chain));
        }

        let module = self.fetch(&canonical).await?;

        // Resolved canonical: `mod://a|2.0` may include `mod://a|1.0`
        self.resolving.push(module.canonical().unwrap_or(canonical));
        let nested = self.assemble_items(module.items()).await;
        self.resolving.pop();
        let nested = nested?;

        let mut inlined = Folded {
            items: nested.items,
            extensions: hoisted_extensions(&module),
        };
        inlined.absorb_extensions(nested.extensions);
        Ok(inlined)
    }

    async fn fetch(&mut self, canonical: &Canonical) -> Result<Arc<Questionnaire>> {
        if let Some(module) = self.fetched.get(canonical) {
            tracing::debug!("Reusing fetched sub-questionnaire {}", canonical);
            return Ok(Arc::clone(module));
        }

        self.report(&format!("Fetching sub-questionnaire {canonical}"));
        let module = self
            .resolver
            .resolve(canonical)
            .await
            .map_err(|e| AssembleError::resolution_failed(canonical.to_string(), e))?;

        if let Some(expectation) = module.assemble_expectation()
            && !expectation.allows_child()
        {
            tracing::warn!(
                "Sub-questionnaire {} declares assemble-expectation '{}' but is inlined as a child",
                canonical,
                expectation.code()
            );
        }

        let module = Arc::new(module);
        self.fetched.insert(canonical.clone(), Arc::clone(&module));
        Ok(module)
    }
}

/// Root-level extensions of a module that propagate to the assembled root.
fn hoisted_extensions(module: &Questionnaire) -> Vec<Extension> {
    let mut hoisted = Vec::new();
    for ext in module.extensions() {
        if ext.is_assembly_marker() || ext.is(ASSEMBLED_FROM_URL) {
            continue;
        }
        push_unique(&mut hoisted, ext.clone());
    }
    hoisted
}

/// Copy of an item without its children.
fn item_shell(item: &QuestionnaireItem) -> QuestionnaireItem {
    QuestionnaireItem {
        link_id: item.link_id.clone(),
        item_type: item.item_type.clone(),
        text: item.text.clone(),
        extension: item.extension.clone(),
        item: None,
        other: item.other.clone(),
    }
}

/// Copy of a Questionnaire without items or extensions.
fn questionnaire_shell(root: &Questionnaire) -> Questionnaire {
    Questionnaire {
        resource_type: root.resource_type.clone(),
        id: root.id.clone(),
        url: root.url.clone(),
        version: root.version.clone(),
        name: root.name.clone(),
        title: root.title.clone(),
        status: root.status.clone(),
        extension: None,
        item: None,
        other: Map::clone(&root.other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{InMemoryQuestionnaireResolver, ResolveError};
    use crate::types::{SUB_QUESTIONNAIRE_URL, VARIABLE_URL};
    use serde_json::json;
    use std::sync::Mutex;

    fn leaf(link_id: &str) -> QuestionnaireItem {
        QuestionnaireItem::new(link_id, "string")
    }

    fn link_ids(q: &Questionnaire) -> Vec<&str> {
        q.items().iter().map(|i| i.link_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_replaces_reference_in_place() {
        let resolver = InMemoryQuestionnaireResolver::new().with(
            Questionnaire::new("mod://demo")
                .with_version("1.0")
                .with_item(leaf("x"))
                .with_item(leaf("y")),
        );
        let root = Questionnaire::new("mod://root")
            .with_item(leaf("a"))
            .with_item(QuestionnaireItem::sub_questionnaire("b", "mod://demo|1.0"))
            .with_item(leaf("c"));

        let assembled = assemble(&resolver, &root, None).await.unwrap();
        assert_eq!(link_ids(&assembled), vec!["a", "x", "y", "c"]);
        assert_eq!(
            assembled.extensions(),
            &[Extension::assembled_from("mod://demo|1.0")]
        );
    }

    #[tokio::test]
    async fn test_reference_children_discarded() {
        let resolver = InMemoryQuestionnaireResolver::new()
            .with(Questionnaire::new("mod://demo").with_item(leaf("x")));
        let root = Questionnaire::new("mod://root").with_item(
            QuestionnaireItem::sub_questionnaire("ref", "mod://demo").with_child(leaf("stale")),
        );

        let assembled = assemble(&resolver, &root, None).await.unwrap();
        assert_eq!(link_ids(&assembled), vec!["x"]);
    }

    #[tokio::test]
    async fn test_group_emptied_by_empty_module_drops_item_array() {
        let resolver = InMemoryQuestionnaireResolver::new().with(Questionnaire::new("mod://empty"));
        let root = Questionnaire::new("mod://root").with_item(
            QuestionnaireItem::new("g", "group")
                .with_child(QuestionnaireItem::sub_questionnaire("ref", "mod://empty")),
        );

        let assembled = assemble(&resolver, &root, None).await.unwrap();
        assert_eq!(assembled.items().len(), 1);
        assert!(assembled.items()[0].item.is_none());
    }

    #[tokio::test]
    async fn test_missing_value_canonical() {
        let resolver = InMemoryQuestionnaireResolver::new();
        let broken = QuestionnaireItem::new("ref", "display").with_extension(Extension::with_value(
            SUB_QUESTIONNAIRE_URL,
            "valueString",
            json!(""),
        ));
        let root = Questionnaire::new("mod://root").with_item(broken);

        let err = assemble(&resolver, &root, None).await.unwrap_err();
        match err {
            AssembleError::ResolutionFailed { source, .. } => {
                assert!(matches!(source, ResolveError::InvalidCanonical { .. }))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_self_reference_of_root_is_cycle() {
        let resolver = InMemoryQuestionnaireResolver::new().with(
            Questionnaire::new("mod://child")
                .with_item(QuestionnaireItem::sub_questionnaire("back", "mod://root")),
        );
        let root = Questionnaire::new("mod://root")
            .with_item(QuestionnaireItem::sub_questionnaire("c", "mod://child"));

        let err = assemble(&resolver, &root, None).await.unwrap_err();
        match err {
            AssembleError::CycleDetected { canonical, chain } => {
                assert_eq!(canonical, "mod://root");
                assert_eq!(chain, vec!["mod://root", "mod://child", "mod://root"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_hoisting_skips_markers_and_provenance() {
        let variable = Extension::with_value(VARIABLE_URL, "valueExpression", json!({"name": "bmi"}));
        let module = Questionnaire::new("mod://demo")
            .with_extension(Extension::with_value(
                ASSEMBLE_EXPECTATION_URL,
                "valueCode",
                json!("assemble-child"),
            ))
            .with_extension(Extension::assembled_from("mod://older"))
            .with_extension(variable.clone());

        assert_eq!(hoisted_extensions(&module), vec![variable]);
    }

    #[tokio::test]
    async fn test_progress_messages() {
        let resolver = InMemoryQuestionnaireResolver::new()
            .with(Questionnaire::new("mod://demo").with_item(leaf("x")));
        let root = Questionnaire::new("mod://root")
            .with_item(QuestionnaireItem::sub_questionnaire("r1", "mod://demo"))
            .with_item(QuestionnaireItem::sub_questionnaire("r2", "mod://demo"));

        let messages = Mutex::new(Vec::new());
        let sink = |message: &str| messages.lock().unwrap().push(message.to_string());
        let assembler = Assembler::new(Arc::new(resolver));
        assembler.assemble(&root, Some(&sink)).await.unwrap();

        let messages = messages.into_inner().unwrap();
        assert_eq!(
            messages,
            vec![
                "Assembling Questionnaire mod://root",
                "Fetching sub-questionnaire mod://demo",
                "Assembly of mod://root complete: 1 sub-questionnaire(s) resolved",
            ]
        );
    }

    #[tokio::test]
    async fn test_input_not_mutated() {
        let resolver = InMemoryQuestionnaireResolver::new()
            .with(Questionnaire::new("mod://demo").with_item(leaf("x")));
        let root = Questionnaire::new("mod://root")
            .with_extension(Extension::with_value(
                ASSEMBLE_EXPECTATION_URL,
                "valueCode",
                json!("assemble-root"),
            ))
            .with_item(QuestionnaireItem::sub_questionnaire("r", "mod://demo"));
        let before = root.clone();

        let assembled = assemble(&resolver, &root, None).await.unwrap();
        assert_eq!(root, before);
        assert_ne!(assembled, before);
    }
}
