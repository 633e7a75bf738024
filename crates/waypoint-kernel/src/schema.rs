//! Compiled JSON Schema wrapper.
//!
//! Tool input/output schemas and agent final-answer schemas are compiled once
//! and validated many times.  This module wraps [`jsonschema::JSONSchema`]
//! behind a small API that converts borrow-carrying validation errors into
//! plain strings at the boundary.

use jsonschema::JSONSchema;
use serde_json::Value;

/// A JSON Schema compiled for repeated validation.
pub struct CompiledSchema {
    compiled: JSONSchema,
}

impl CompiledSchema {
    /// Compile a raw schema value.
    ///
    /// Returns a human-readable reason on failure; callers wrap it into their
    /// own error type.
    pub fn compile(schema: &Value) -> std::result::Result<Self, String> {
        let compiled = JSONSchema::compile(schema).map_err(|e| e.to_string())?;
        Ok(Self { compiled })
    }

    /// Validate an instance against the schema.
    ///
    /// Collects every violation into one `; `-joined message so the caller
    /// (and ultimately the LLM, via a corrective message) sees all problems
    /// at once instead of one per retry.
    pub fn validate(&self, instance: &Value) -> std::result::Result<(), String> {
        if let Err(errors) = self.compiled.validate(instance) {
            let reasons: Vec<String> = errors.map(|e| e.to_string()).collect();
            return Err(reasons.join("; "));
        }
        Ok(())
    }

    /// Cheap validity check without error details.
    pub fn is_valid(&self, instance: &Value) -> bool {
        self.compiled.is_valid(instance)
    }
}

impl std::fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSchema").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compile_and_validate() {
        let schema = json!({
            "type": "object",
            "required": ["city"],
            "properties": {
                "city": {"type": "string"},
                "limit": {"type": "integer", "minimum": 1}
            }
        });
        let compiled = CompiledSchema::compile(&schema).expect("valid schema");

        assert!(compiled.validate(&json!({"city": "Beijing"})).is_ok());
        assert!(compiled.validate(&json!({"city": "Beijing", "limit": 5})).is_ok());
        assert!(compiled.validate(&json!({"limit": 5})).is_err());
        assert!(compiled.validate(&json!({"city": 42})).is_err());
    }

    #[test]
    fn invalid_schema_fails_to_compile() {
        let schema = json!({"type": "not-a-type"});
        assert!(CompiledSchema::compile(&schema).is_err());
    }

    #[test]
    fn validation_reports_all_violations() {
        let schema = json!({
            "type": "object",
            "required": ["a", "b"],
            "properties": {
                "a": {"type": "string"},
                "b": {"type": "integer"}
            }
        });
        let compiled = CompiledSchema::compile(&schema).expect("valid schema");

        let err = compiled
            .validate(&json!({"a": 1, "b": "x"}))
            .expect_err("both fields violate");
        assert!(err.contains("; "));
    }
}
