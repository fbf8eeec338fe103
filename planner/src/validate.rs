//! Plan document validation: JSON Schema conformance plus semantic invariants.

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde_json::Value;

use crate::core::invariants::validate_invariants;
use crate::plan::Plan;

/// Bundled plan schema (Draft 2020-12).
pub const PLAN_SCHEMA_V1: &str = include_str!("../../schemas/plan/v1.schema.json");

/// Parse and validate a plan document.
///
/// Returns the parsed [`Plan`] on success, or an error listing every schema
/// or invariant violation.
pub fn validate_plan_document(raw: &str) -> Result<Plan> {
    let instance: Value = serde_json::from_str(raw).context("parse plan json")?;
    let schema: Value = serde_json::from_str(PLAN_SCHEMA_V1).context("parse plan schema")?;
    validate_schema(&instance, &schema)?;
    let plan: Plan = serde_json::from_value(instance).context("parse plan as v1 struct")?;
    let errors = validate_invariants(&plan);
    if !errors.is_empty() {
        bail!("invariant violations:\n- {}", errors.join("\n- "));
    }
    Ok(plan)
}

/// Validate JSON instance against a JSON Schema (Draft 2020-12).
fn validate_schema(instance: &Value, schema: &Value) -> Result<()> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}
