//! Tool specifications, execution requests, and argument validation.

pub mod request;
pub mod types;
pub mod validation;

pub use request::{ToolExecutionRequest, ToolRequestIds};
pub use types::{ParameterBuilder, ParameterType, ToolParameter, ToolSpecification, THINK_TOOL_NAME};

use crate::types::ToolChoice;

/// The tools offered for one call and whether the model must use one.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub specifications: Vec<ToolSpecification>,
    pub choice: ToolChoice,
}

impl ToolContext {
    pub fn new(specifications: Vec<ToolSpecification>, choice: ToolChoice) -> Self {
        Self {
            specifications,
            choice,
        }
    }

    /// No tools; the call is a plain chat turn.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Tools the model may call, without forcing it to.
    pub fn auto(specifications: Vec<ToolSpecification>) -> Self {
        Self::new(specifications, ToolChoice::Auto)
    }

    /// Tools of which the model must call at least one.
    pub fn required(specifications: Vec<ToolSpecification>) -> Self {
        Self::new(specifications, ToolChoice::Required)
    }

    pub fn is_empty(&self) -> bool {
        self.specifications.is_empty()
    }

    /// Whether at least one tool call must be produced.
    pub fn requires_tool_call(&self) -> bool {
        !self.is_empty() && self.choice == ToolChoice::Required
    }
}
