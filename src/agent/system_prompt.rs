//! ReAct system prompt builder.
//!
//! Sections (in order):
//! 1. Protocol (thought → tool call → observation → response)
//! 2. Tool catalogue, one JSON schema per tool inside `<tools>`
//! 3. Worked example sessions
//! 4. Operator instructions from config, if any

use crate::tools::ToolRegistry;
use tracing::debug;

const PROTOCOL: &str = r#"
You are a function calling AI model. You operate by running a loop with the following steps: Thought, Action, Observation.
You are provided with function signatures within <tools></tools> XML tags.
You may call one or more functions to assist with the user query. Don't make assumptions about what values to plug into functions.
Pay special attention to the properties 'type': every argument must be a JSON value of that type (integer, string, boolean or float).

For each function call return a JSON object with the function name and arguments within <tool_call></tool_call> XML tags as follows:

<tool_call>{"name": <function-name>, "arguments": <args-dict>, "id": <monotonically-increasing-id>}</tool_call>

You may put several <tool_call> blocks in one message. You will then be called again with a single
<observation></observation> block mapping each call id to its result. A result of the form {"error": ...}
means the call failed; fix the call and try again.
"#;

const EXAMPLES: &str = r#"
Example session:

<question>What is the current price of Solana?</question>
<thought>I need to get the current price of solana</thought>
<tool_call>{"name": "get_current_price", "arguments": {"coin": "solana"}, "id": 0}</tool_call>

You will be called again with this:

<observation>{"0": {"price": "$96.07"}}</observation>

You then output:

<response>The current price of Solana is $96.07</response>

Example session 2:

<question>What was the price of Ethereum on January 12, 2024?</question>
<thought>I need to get the historical data for ethereum on January 12, 2024</thought>
<tool_call>{"name": "get_historical_data", "arguments": {"coin": "ethereum", "date": "Jan 12, 2024"}, "id": 0}</tool_call>

You will be called again with this:

<observation>{"0": {"date": "Jan 12, 2024", "price": "$2,619.36", "market_cap": "$314,724,823,094.00", "volume": "$12,000,000,000.50"}}</observation>

You then output:

<response>On January 12, 2024 Ethereum traded at $2,619.36 with a market cap of about $314.7 billion.</response>

Additional constraints:

- Only output <response></response> once you have everything you need; never together with a <tool_call>.
- If the user asks you something unrelated to any of the tools above, answer freely enclosing your answer with <response></response> tags.
"#;

/// Sent as a system turn when the model produced neither a tool call nor a response.
pub const NUDGE: &str = "Your last message contained no <tool_call> and no <response>. \
Reply with one or more <tool_call></tool_call> blocks, or with your final answer inside <response></response>.";

/// Build the complete system prompt for a run.
pub fn build_system_prompt(registry: &ToolRegistry, instructions: &str) -> String {
    let catalogue = registry.catalogue_json();
    let mut prompt = String::with_capacity(PROTOCOL.len() + EXAMPLES.len() + catalogue.len() + 64);

    // Section 1: protocol
    prompt.push_str(PROTOCOL);

    // Section 2: tool catalogue
    prompt.push_str("\nHere are the available tools / actions:\n\n<tools>\n");
    prompt.push_str(&catalogue);
    prompt.push_str("\n</tools>\n");

    // Section 3: examples
    prompt.push_str(EXAMPLES);

    // Section 4: operator instructions
    let instructions = instructions.trim();
    if !instructions.is_empty() {
        prompt.push_str("\n# Operator Instructions\n\n");
        prompt.push_str(instructions);
        prompt.push('\n');
    }

    debug!("System prompt: {} chars, {} tools", prompt.len(), registry.len());
    prompt
}
