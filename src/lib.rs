//! Tagloop — a ReAct tool-calling agent over a plain-text tag protocol.
//!
//! The model reasons in `<thought>` blocks, calls registered tools through
//! JSON `<tool_call>` blocks, reads results from `<observation>` blocks and
//! ends with a `<response>`. Tool schemas are declared once and drive both
//! the prompt catalogue and argument validation.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod tools;
pub mod types;
