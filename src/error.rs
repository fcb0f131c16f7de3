//! Error types for the reasoning loop.
//!
//! Three layers, matching who is at fault:
//! - [`SchemaError`]: a tool was declared wrong (fatal at registration).
//! - [`ToolError`]: the model asked for something bad, or a tool failed.
//!   Always recoverable; rendered into the next observation.
//! - [`AgentError`]: the run itself gave up and returns to the caller.

use crate::tools::ParamType;
use crate::types::ChatMessage;
use thiserror::Error;

/// A tool was mis-declared. Raised while building schemas or the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Tool name is empty or whitespace.
    #[error("tool name cannot be empty")]
    EmptyToolName,

    /// A parameter was declared without a name.
    #[error("tool '{tool}' declares a parameter with an empty name")]
    EmptyParamName { tool: String },

    /// The same parameter name was declared twice.
    #[error("tool '{tool}' declares parameter '{param}' more than once")]
    DuplicateParam { tool: String, param: String },

    /// A parameter has no type, or a type outside {integer, string, boolean, float}.
    #[error("tool '{tool}' parameter '{param}' has unsupported type '{declared}'")]
    UntypedParam {
        tool: String,
        param: String,
        declared: String,
    },

    /// Two tools registered under one name.
    #[error("tool '{0}' is registered more than once")]
    DuplicateTool(String),
}

/// Per-call failures. None of these abort the loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("missing argument '{0}'")]
    MissingArgument(String),

    #[error("argument '{name}' expected {expected}, got {got}")]
    TypeMismatch {
        name: String,
        expected: ParamType,
        got: String,
    },

    #[error("unknown argument '{0}'")]
    UnknownArgument(String),

    /// A `<tool_call>` body that is not a well-formed call object.
    #[error("malformed tool call: {0}")]
    MalformedToolCall(String),

    /// The tool ran and failed.
    #[error("{0}")]
    Execution(String),
}

/// Terminal failures of a run. Each carries the transcript so callers can
/// inspect what happened.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The iteration cap was hit while the model kept calling tools.
    #[error("gave up after {max} iterations without a final response")]
    IterationLimitExceeded {
        max: u32,
        /// Best partial answer seen, or the no-answer sentinel.
        partial: String,
        history: Vec<ChatMessage>,
    },

    /// The model produced neither a tool call nor a response.
    #[error("model output contained no tool call and no response after {attempts} attempt(s)")]
    NoActionableOutput {
        attempts: u32,
        history: Vec<ChatMessage>,
    },

    /// The chat completion call itself failed.
    #[error("model call failed: {cause:#}")]
    Model {
        cause: anyhow::Error,
        history: Vec<ChatMessage>,
    },
}

impl AgentError {
    /// Conversation as it stood when the run stopped.
    pub fn history(&self) -> &[ChatMessage] {
        match self {
            Self::IterationLimitExceeded { history, .. }
            | Self::NoActionableOutput { history, .. }
            | Self::Model { history, .. } => history,
        }
    }
}
