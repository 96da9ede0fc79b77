//! `Questionnaire/$assemble` request and response shapes.
//!
//! Input is either a `Parameters` resource carrying the Questionnaire in a
//! `questionnaire` parameter, or the bare Questionnaire. Output is always a
//! `Parameters` resource: `return` on success, `outcome` on failure.

use serde_json::{Value, json};

use crate::assembler::{Assembler, ProgressSink};
use crate::error::{AssembleError, Result};
use crate::types::Questionnaire;

/// Extract the Questionnaire to assemble from `$assemble` input.
pub fn questionnaire_from_parameters(input: &Value) -> Result<Questionnaire> {
    match input.get("resourceType").and_then(Value::as_str) {
        Some("Questionnaire") => Ok(Questionnaire::from_value(input.clone())?),
        Some("Parameters") => {
            let resource = input
                .get("parameter")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .find(|p| p.get("name").and_then(Value::as_str) == Some("questionnaire"))
                .and_then(|p| p.get("resource"))
                .ok_or_else(|| {
                    AssembleError::invalid_parameters(
                        "Parameters has no 'questionnaire' parameter with a resource",
                    )
                })?;
            Questionnaire::from_value(resource.clone()).map_err(|e| {
                AssembleError::invalid_parameters(format!("'questionnaire' parameter: {e}"))
            })
        }
        Some(other) => Err(AssembleError::invalid_parameters(format!(
            "Expected Parameters or Questionnaire, got {other}"
        ))),
        None => Err(AssembleError::invalid_parameters("Missing resourceType")),
    }
}

/// OperationOutcome describing an assembly failure.
pub fn operation_outcome(error: &AssembleError) -> Value {
    let code = match error {
        AssembleError::ResolutionFailed { .. } => "not-found",
        AssembleError::CycleDetected { .. } => "processing",
        AssembleError::InvalidParameters { .. } | AssembleError::Serialization(_) => "invalid",
        AssembleError::Io(_) => "exception",
    };

    let mut issue = json!({
        "severity": "error",
        "code": code,
        "details": { "text": error.code().to_string() },
        "diagnostics": error.to_string(),
    });
    if let Some(canonical) = error.canonical() {
        issue["expression"] = json!([canonical]);
    }

    json!({
        "resourceType": "OperationOutcome",
        "issue": [issue],
    })
}

/// Build `$assemble` output from an assembly result.
pub fn output_parameters(result: &Result<Questionnaire>) -> Result<Value> {
    let parameter = match result {
        Ok(questionnaire) => json!({
            "name": "return",
            "resource": serde_json::to_value(questionnaire)?,
        }),
        Err(error) => json!({
            "name": "outcome",
            "resource": operation_outcome(error),
        }),
    };

    Ok(json!({
        "resourceType": "Parameters",
        "parameter": [parameter],
    }))
}

/// Run `$assemble` on raw JSON input and produce raw JSON output.
///
/// Assembly failures are reported inside the returned `Parameters`, not as `Err`.
pub async fn assemble_operation(
    assembler: &Assembler,
    input: &Value,
    progress: Option<&dyn ProgressSink>,
) -> Result<Value> {
    let result = match questionnaire_from_parameters(input) {
        Ok(root) => assembler.assemble(&root, progress).await,
        Err(error) => Err(error),
    };
    if let Err(error) = &result {
        tracing::warn!("$assemble failed: {}", error);
    }
    output_parameters(&result)
}
