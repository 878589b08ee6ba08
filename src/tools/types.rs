//! Tool specifications: names, descriptions, and ordered parameter schemas.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Name of the reserved reasoning pseudo-tool used during emulation.
pub const THINK_TOOL_NAME: &str = "think";

/// Type tag of a tool parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParameterType {
    String,
    Integer,
    Number,
    Boolean,
    /// Array of the given item type.
    Array(Box<ParameterType>),
    Object,
}

impl ParameterType {
    /// JSON Schema fragment for this type.
    pub fn json_schema(&self) -> serde_json::Value {
        match self {
            Self::String => serde_json::json!({ "type": "string" }),
            Self::Integer => serde_json::json!({ "type": "integer" }),
            Self::Number => serde_json::json!({ "type": "number" }),
            Self::Boolean => serde_json::json!({ "type": "boolean" }),
            Self::Object => serde_json::json!({ "type": "object" }),
            Self::Array(items) => serde_json::json!({
                "type": "array",
                "items": items.json_schema(),
            }),
        }
    }

    /// Human-readable type name used in emulation instructions.
    pub fn describe(&self) -> String {
        match self {
            Self::Array(items) => format!("array of {}", items.describe()),
            Self::Object => "map".to_string(),
            other => other.to_string(),
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterType,
    pub description: String,
    pub required: bool,
}

/// A callable tool as declared to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpecification {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
}

impl ToolSpecification {
    /// Start building a specification.
    pub fn builder(name: impl Into<String>, description: impl Into<String>) -> ParameterBuilder {
        ParameterBuilder {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// The reserved `think` tool offered to non-reasoning models during emulation.
    pub fn think() -> Self {
        Self::builder(
            THINK_TOOL_NAME,
            "Think carefully step by step about a complex problem. Use this tool to reason through \
             difficult questions or break problems into smaller pieces. Call it concurrently with other tools.",
        )
        .string("reasoning", "The step-by-step reasoning to work through", true)
        .build()
    }

    pub fn is_think(&self) -> bool {
        self.name == THINK_TOOL_NAME
    }

    pub fn parameter(&self, name: &str) -> Option<&ToolParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// JSON Schema object describing the parameters.
    pub fn parameters_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            let mut schema = param.kind.json_schema();
            if let Some(obj) = schema.as_object_mut() {
                obj.insert("description".into(), param.description.clone().into());
            }
            properties.insert(param.name.clone(), schema);
            if param.required {
                required.push(serde_json::Value::String(param.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Builder for tool specifications, preserving parameter order.
#[derive(Debug, Clone)]
pub struct ParameterBuilder {
    name: String,
    description: String,
    parameters: Vec<ToolParameter>,
}

impl ParameterBuilder {
    /// Add a parameter of any type.
    pub fn param(
        mut self,
        name: impl Into<String>,
        kind: ParameterType,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.parameters.push(ToolParameter {
            name: name.into(),
            kind,
            description: description.into(),
            required,
        });
        self
    }

    pub fn string(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.param(name, ParameterType::String, description, required)
    }

    pub fn integer(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.param(name, ParameterType::Integer, description, required)
    }

    pub fn number(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.param(name, ParameterType::Number, description, required)
    }

    pub fn boolean(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.param(name, ParameterType::Boolean, description, required)
    }

    /// Add an array parameter with the given item type.
    pub fn array(
        self,
        name: impl Into<String>,
        items: ParameterType,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.param(name, ParameterType::Array(Box::new(items)), description, required)
    }

    pub fn object(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.param(name, ParameterType::Object, description, required)
    }

    pub fn build(self) -> ToolSpecification {
        ToolSpecification {
            name: self.name,
            description: self.description,
            parameters: self.parameters,
        }
    }
}
