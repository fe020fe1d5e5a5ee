//! Tool trait, parameter shapes and the immutable name-to-tool registry.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Keyword-style arguments of one tool invocation.
pub type ToolArguments = Map<String, Value>;

/// A named local capability the remote run may ask the client to execute.
///
/// Tools run on a blocking thread; a slow tool stalls the turn that called it.
pub trait Tool: Send + Sync {
    /// Name the assistant uses to call the tool. Lookup is exact and case-sensitive.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> &ToolParameters;

    fn call(&self, arguments: &ToolArguments) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
}

/// Expected argument shape of a tool: a flat object of typed keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolParameters {
    params: Vec<ParamSpec>,
    allow_unknown: bool,
}

impl ToolParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(
        self,
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        self.param(name.into(), kind, description.into(), true)
    }

    pub fn optional(
        self,
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        self.param(name.into(), kind, description.into(), false)
    }

    /// Accept keys that are not declared instead of rejecting the call.
    pub fn allow_unknown(mut self) -> Self {
        self.allow_unknown = true;
        self
    }

    fn param(mut self, name: String, kind: ParamKind, description: String, required: bool) -> Self {
        self.params.retain(|existing| existing.name != name);
        self.params.push(ParamSpec {
            name,
            kind,
            description,
            required,
        });
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Checks decoded arguments against the declared shape; the error names the
    /// first violation found.
    pub fn validate(&self, arguments: &ToolArguments) -> Result<(), String> {
        for spec in &self.params {
            match arguments.get(&spec.name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(format!("missing required field '{}'", spec.name));
                }
                None | Some(Value::Null) => {}
                Some(value) if !spec.kind.matches(value) => {
                    return Err(format!(
                        "field '{}' expected type '{}', got {}",
                        spec.name,
                        spec.kind.as_str(),
                        json_type_name(value)
                    ));
                }
                Some(_) => {}
            }
        }

        if !self.allow_unknown {
            if let Some(key) = arguments
                .keys()
                .find(|key| !self.params.iter().any(|spec| &spec.name == *key))
            {
                return Err(format!("unexpected field '{key}'"));
            }
        }
        Ok(())
    }

    /// JSON Schema form, as assistant function definitions expect it.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|spec| {
                (
                    spec.name.clone(),
                    json!({ "type": spec.kind.as_str(), "description": spec.description }),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|spec| spec.required)
            .map(|spec| spec.name.as_str())
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": self.allow_unknown,
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool '{0}' is registered twice")]
    Duplicate(String),
    #[error("tool names must be non-empty")]
    EmptyName,
}

/// Immutable mapping from tool name to capability, built once at startup.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    pub fn register(mut self, tool: impl Tool + 'static) -> Result<Self, RegistryError> {
        self.insert(Arc::new(tool))?;
        Ok(self)
    }

    pub fn register_arc(mut self, tool: Arc<dyn Tool>) -> Result<Self, RegistryError> {
        self.insert(tool)?;
        Ok(self)
    }

    fn insert(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.tools.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry { tools: self.tools }
    }
}
