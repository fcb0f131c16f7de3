//! Core ReAct loop: Think → Act → Observe.
//!
//! Each run:
//! 1. Seeds the history with the system prompt and the question
//! 2. Calls the model and records its output verbatim
//! 3. Dispatches every `<tool_call>` in order and appends one observation
//! 4. Repeats until a `<response>` arrives or the iteration cap is hit
//!
//! Failures attributable to the model (unknown tool, bad arguments, malformed
//! JSON) and tool failures become observations. Only the iteration cap, an
//! unactionable output, or a failed model call end a run early.

use crate::agent::context::{Conversation, Observation};
use crate::agent::system_prompt::{self, NUDGE};
use crate::agent::tags::{ParsedCall, TurnOutput};
use crate::config::{AgentConfig, EmptyTurnPolicy};
use crate::error::{AgentError, SchemaError, ToolError};
use crate::llm::ChatModel;
use crate::tools::{validate_arguments, Tool, ToolCallRequest, ToolRegistry};
use crate::types::*;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Returned as the partial answer when a run is cut off with nothing better.
pub const NO_ANSWER: &str = "No answer could be produced.";

/// A successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Content of the terminal `<response>` tag.
    pub response: String,
    /// Full transcript; the last turn holds the response.
    pub history: Vec<ChatMessage>,
    /// Model calls made.
    pub iterations: u32,
}

/// Tag-protocol reasoning agent over an injected chat model.
pub struct Agent<M> {
    model: M,
    registry: ToolRegistry,
    system_prompt: String,
    max_iterations: u32,
    empty_turn_policy: EmptyTurnPolicy,
}

impl<M: ChatModel> Agent<M> {
    pub fn builder(model: M) -> AgentBuilder<M> {
        AgentBuilder {
            model,
            tools: Vec::new(),
            max_iterations: AgentConfig::default().max_iterations,
            empty_turn_policy: EmptyTurnPolicy::Nudge,
            instructions: String::new(),
        }
    }

    /// Build an agent with loop settings taken from `config`.
    pub fn from_config(
        model: M,
        tools: Vec<Arc<dyn Tool>>,
        config: &AgentConfig,
    ) -> Result<Self, SchemaError> {
        Self::builder(model)
            .tools(tools)
            .max_iterations(config.max_iterations)
            .empty_turn_policy(config.empty_turn_policy)
            .instructions(&config.instructions)
            .build()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Answer one question. The history lives only for this call.
    pub async fn run(&self, question: &str) -> Result<RunOutcome, AgentError> {
        let span = info_span!("run", id = %ulid::Ulid::new());
        self.run_inner(question).instrument(span).await
    }

    async fn run_inner(&self, question: &str) -> Result<RunOutcome, AgentError> {
        info!("Question: {}", question.trim());

        let mut convo = Conversation::start(&self.system_prompt, question);
        let mut state = LoopState::AwaitingModel;
        // Best partial answer if the cap is hit.
        let mut ignored_response: Option<String> = None;
        let mut last_thought: Option<String> = None;
        let mut consecutive_empty: u32 = 0;

        for iteration in 1..=self.max_iterations {
            enter(&mut state, LoopState::AwaitingModel);
            debug!("Iteration {}/{}", iteration, self.max_iterations);

            let output = match self.model.complete(convo.turns()).await {
                Ok(output) => output,
                Err(cause) => {
                    enter(&mut state, LoopState::Aborted);
                    warn!("Model call failed: {:#}", cause);
                    return Err(AgentError::Model {
                        cause,
                        history: convo.into_turns(),
                    });
                }
            };
            convo.push_assistant(&output);

            enter(&mut state, LoopState::ProcessingOutput);
            let turn = TurnOutput::parse(&output);
            if let Some(thought) = turn.thoughts.last() {
                info!("[Iteration {}] Thought: {}", iteration, truncate(thought, 200));
                last_thought = Some(thought.clone());
            }

            if turn.has_tool_calls() {
                consecutive_empty = 0;
                enter(&mut state, LoopState::DispatchingTools);
                if let Some(response) = turn.response {
                    warn!("[Iteration {}] Response alongside tool calls ignored", iteration);
                    ignored_response = Some(response);
                }
                let observation = self.dispatch(iteration, &turn.tool_calls).await;
                convo.push_observation(&observation);
                continue;
            }

            if let Some(response) = turn.response {
                enter(&mut state, LoopState::Done);
                info!("[Iteration {}] Response: {}", iteration, truncate(&response, 200));
                return Ok(RunOutcome {
                    response,
                    history: convo.into_turns(),
                    iterations: iteration,
                });
            }

            consecutive_empty += 1;
            match self.empty_turn_policy {
                EmptyTurnPolicy::Nudge if consecutive_empty == 1 => {
                    warn!("[Iteration {}] No tool call or response; nudging", iteration);
                    convo.push_nudge(NUDGE);
                }
                _ => {
                    enter(&mut state, LoopState::Aborted);
                    warn!("[Iteration {}] No actionable output; giving up", iteration);
                    return Err(AgentError::NoActionableOutput {
                        attempts: consecutive_empty,
                        history: convo.into_turns(),
                    });
                }
            }
        }

        enter(&mut state, LoopState::Aborted);
        warn!("Iteration limit ({}) reached", self.max_iterations);
        Err(AgentError::IterationLimitExceeded {
            max: self.max_iterations,
            partial: ignored_response
                .or(last_thought)
                .unwrap_or_else(|| NO_ANSWER.to_string()),
            history: convo.into_turns(),
        })
    }

    /// Run every call of one turn, in order, into a single observation.
    async fn dispatch(&self, iteration: u32, calls: &[ParsedCall]) -> Observation {
        let mut observation = Observation::new();

        for (position, call) in calls.iter().enumerate() {
            match call {
                ParsedCall::Malformed { id, error } => {
                    let key = observation_key(&observation, *id, position);
                    warn!("[Iteration {}] Call {}: {}", iteration, key, error);
                    observation.push_err(key, error);
                }
                ParsedCall::Call(request) => {
                    let key = request.id.to_string();
                    if observation.contains(&key) {
                        let key = observation_key(&observation, Some(request.id), position);
                        let error = ToolError::MalformedToolCall(format!(
                            "duplicate id {} in the same turn",
                            request.id
                        ));
                        warn!("[Iteration {}] Call {}: {}", iteration, key, error);
                        observation.push_err(key, error);
                        continue;
                    }

                    match self.execute(iteration, request).await {
                        Ok(value) => observation.push_ok(key, value),
                        Err(error) => {
                            warn!("[Iteration {}] Tool {} failed: {}", iteration, request.name, error);
                            observation.push_err(key, error);
                        }
                    }
                }
            }
        }

        observation
    }

    /// Look up, validate and invoke one call.
    ///
    /// The tool runs on its own task so a panic comes back as an
    /// `Execution` error. Under the release profile (`panic = "abort"`) a
    /// panic still ends the process.
    async fn execute(&self, iteration: u32, request: &ToolCallRequest) -> Result<Value, ToolError> {
        let tool = self.registry.lookup(&request.name)?;
        let args = validate_arguments(&request.arguments, tool.schema())?;

        info!(
            "[Iteration {}] Tool: {}({})",
            iteration,
            request.name,
            serde_json::to_string(&args).unwrap_or_default()
        );

        let tool = Arc::clone(tool);
        let value = tokio::spawn(async move { tool.invoke(args).await })
            .await
            .map_err(|e| ToolError::Execution(format!("tool panicked: {e}")))?
            .map_err(|e| ToolError::Execution(format!("{e:#}")))?;

        debug!("[Iteration {}] Tool result: {}", iteration, value);
        Ok(value)
    }
}

/// Observation key for a call: its id, or a position-qualified key when the
/// id is missing or already taken.
fn observation_key(observation: &Observation, id: Option<u64>, position: usize) -> String {
    match id {
        Some(id) if !observation.contains(&id.to_string()) => id.to_string(),
        Some(id) => format!("{id}#{position}"),
        None => format!("#{position}"),
    }
}

fn enter(state: &mut LoopState, next: LoopState) {
    if *state != next {
        debug!("Loop state: {} -> {}", state, next);
    }
    *state = next;
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures and builds an [`Agent`]. The tool list is fixed at `build`.
pub struct AgentBuilder<M> {
    model: M,
    tools: Vec<Arc<dyn Tool>>,
    max_iterations: u32,
    empty_turn_policy: EmptyTurnPolicy,
    instructions: String,
}

impl<M: ChatModel> AgentBuilder<M> {
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn empty_turn_policy(mut self, policy: EmptyTurnPolicy) -> Self {
        self.empty_turn_policy = policy;
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Register the tools and render the system prompt once.
    pub fn build(self) -> Result<Agent<M>, SchemaError> {
        let registry = ToolRegistry::new(self.tools)?;
        let system_prompt = system_prompt::build_system_prompt(&registry, &self.instructions);
        Ok(Agent {
            model: self.model,
            registry,
            system_prompt,
            max_iterations: self.max_iterations,
            empty_turn_policy: self.empty_turn_policy,
        })
    }
}
