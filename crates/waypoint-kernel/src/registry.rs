//! Tool registry.
//!
//! Maps a unique tool name to its compiled specification.  The registry is
//! populated once at startup, before any planning activity, and is read-only
//! afterward: there is deliberately no unregister or overwrite operation in
//! the public API.
//!
//! Internally the registry is backed by [`DashMap`], which provides lock-free
//! concurrent reads, so it is safe to share across agent tasks without a
//! global `RwLock`.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::error::{Result, ToolError};
use crate::schema::CompiledSchema;
use crate::tool::{ToolClass, ToolDefinition, ToolHandler, ToolSpec};

// ---------------------------------------------------------------------------
// Registered tool
// ---------------------------------------------------------------------------

/// A [`ToolSpec`] whose schemas have been compiled for repeated validation.
pub struct RegisteredTool {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Latency class for timeout selection.
    pub class: ToolClass,
    /// Raw input schema, as exposed to the reasoning model.
    pub input_schema: Value,
    /// Raw output schema.
    pub output_schema: Value,
    /// The backend that executes the tool.
    pub handler: Arc<dyn ToolHandler>,
    pub(crate) input: CompiledSchema,
    pub(crate) output: CompiledSchema,
}

impl RegisteredTool {
    /// Definition handed to the reasoning model.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.name)
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Concurrent, name-keyed tool registry.
///
/// Cheaply cloneable (`Arc`-backed) and `Send + Sync`.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    inner: Arc<DashMap<String, Arc<RegisteredTool>>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// Compiles both schemas eagerly so that a malformed tool is rejected at
    /// startup rather than on first use.
    ///
    /// # Errors
    ///
    /// [`ToolError::DuplicateTool`] if the name is already taken, or
    /// [`ToolError::InvalidSchema`] if either schema fails to compile.
    pub fn register(&self, spec: ToolSpec) -> Result<()> {
        let input = CompiledSchema::compile(&spec.input_schema).map_err(|reason| {
            ToolError::InvalidSchema {
                name: spec.name.clone(),
                reason: format!("input schema: {reason}"),
            }
        })?;
        let output = CompiledSchema::compile(&spec.output_schema).map_err(|reason| {
            ToolError::InvalidSchema {
                name: spec.name.clone(),
                reason: format!("output schema: {reason}"),
            }
        })?;

        let registered = Arc::new(RegisteredTool {
            name: spec.name.clone(),
            description: spec.description,
            class: spec.class,
            input_schema: spec.input_schema,
            output_schema: spec.output_schema,
            handler: spec.handler,
            input,
            output,
        });

        // DashMap's entry API makes the existence check and insert atomic, so
        // two concurrent registrations of the same name cannot both win.
        match self.inner.entry(spec.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(ToolError::DuplicateTool { name: spec.name })
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                tracing::info!(tool = %spec.name, "tool registered");
                entry.insert(registered);
                Ok(())
            }
        }
    }

    /// Look up a tool by name.
    pub fn lookup(&self, name: &str) -> Result<Arc<RegisteredTool>> {
        self.inner
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
            })
    }

    /// Definitions of every registered tool.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.inner.iter().map(|e| e.value().definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Definitions restricted to an agent's allowed subset.
    ///
    /// Names in `allowed` that are not registered are silently skipped; the
    /// agent loop reports them as failures only if the model actually calls
    /// one.
    pub fn definitions_for<'a>(
        &self,
        allowed: impl IntoIterator<Item = &'a String>,
    ) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = allowed
            .into_iter()
            .filter_map(|name| self.inner.get(name.as_str()))
            .map(|entry| entry.value().definition())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Number of registered tools.
    pub fn count(&self) -> usize {
        self.inner.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
