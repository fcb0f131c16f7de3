//! Tag-protocol reasoning agent.

pub mod context;
pub mod loop_;
pub mod system_prompt;
pub mod tags;

pub use loop_::{Agent, AgentBuilder, RunOutcome, NO_ANSWER};
