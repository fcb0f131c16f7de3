//! Tag grammar spoken between the loop and the model.
//!
//! The model writes `<thought>`, `<tool_call>` and `<response>` blocks; the
//! loop writes `<question>` and `<observation>` blocks. A block only counts
//! when both delimiters are present, and bodies may span lines.

use crate::error::ToolError;
use crate::tools::ToolCallRequest;
use regex::Regex;
use std::sync::OnceLock;
use tracing::error;

pub const QUESTION: &str = "question";
pub const THOUGHT: &str = "thought";
pub const TOOL_CALL: &str = "tool_call";
pub const OBSERVATION: &str = "observation";
pub const RESPONSE: &str = "response";

const PROTOCOL_TAGS: [&str; 5] = [QUESTION, THOUGHT, TOOL_CALL, OBSERVATION, RESPONSE];

fn compile(tag: &str) -> Result<Regex, regex::Error> {
    let tag = regex::escape(tag);
    Regex::new(&format!(r"(?s)<{tag}>(.*?)</{tag}>"))
}

/// Compiled pattern for one of the protocol tags, built on first use.
fn protocol_pattern(tag: &str) -> Option<&'static Regex> {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            PROTOCOL_TAGS
                .iter()
                .filter_map(|t| compile(t).ok().map(|re| (*t, re)))
                .collect()
        })
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, re)| re)
}

/// All bodies of `<tag>…</tag>` in `text`, in order of appearance, trimmed.
///
/// A body starts after the last `<tag>` before its `</tag>`, so a stray
/// unclosed opener earlier in the text is never glued onto a real block.
pub fn extract_tag_content(text: &str, tag: &str) -> Vec<String> {
    let owned;
    let re = match protocol_pattern(tag) {
        Some(re) => re,
        None => match compile(tag) {
            Ok(re) => {
                owned = re;
                &owned
            }
            Err(e) => {
                error!("Invalid tag pattern for <{}>: {}", tag, e);
                return Vec::new();
            }
        },
    };

    let open = format!("<{tag}>");
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| {
            let body = m.as_str();
            let body = match body.rfind(&open) {
                Some(idx) => &body[idx + open.len()..],
                None => body,
            };
            body.trim().to_string()
        })
        .collect()
}

/// Wrap `body` in `<tag>` delimiters.
pub fn wrap(tag: &str, body: &str) -> String {
    format!("<{tag}>{body}</{tag}>")
}

/// One `<tool_call>` block after parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedCall {
    Call(ToolCallRequest),
    Malformed {
        /// The id, when the body got far enough to carry one.
        id: Option<u64>,
        error: ToolError,
    },
}

/// Everything the loop acts on in one model output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutput {
    pub thoughts: Vec<String>,
    pub tool_calls: Vec<ParsedCall>,
    /// First `<response>` block, if any.
    pub response: Option<String>,
}

impl TurnOutput {
    pub fn parse(text: &str) -> Self {
        let tool_calls = extract_tag_content(text, TOOL_CALL)
            .into_iter()
            .map(|body| match ToolCallRequest::parse(&body) {
                Ok(call) => ParsedCall::Call(call),
                Err(error) => ParsedCall::Malformed {
                    id: ToolCallRequest::peek_id(&body),
                    error,
                },
            })
            .collect();

        Self {
            thoughts: extract_tag_content(text, THOUGHT),
            tool_calls,
            response: extract_tag_content(text, RESPONSE).into_iter().next(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_blocks_in_source_order() {
        let text = r#"<thought>two lookups</thought>
<tool_call>{"name": "a", "arguments": {}, "id": 0}</tool_call>
some chatter
<tool_call>
  {"name": "b", "arguments": {}, "id": 1}
</tool_call>"#;

        let calls = extract_tag_content(text, TOOL_CALL);
        assert_eq!(
            calls,
            vec![
                r#"{"name": "a", "arguments": {}, "id": 0}"#.to_string(),
                r#"{"name": "b", "arguments": {}, "id": 1}"#.to_string(),
            ]
        );
    }

    #[test]
    fn unclosed_tag_does_not_match() {
        let text = r#"<tool_call>{"name": "a", "arguments": {}, "id": 0}"#;
        assert!(extract_tag_content(text, TOOL_CALL).is_empty());
    }

    #[test]
    fn stray_opener_in_prose_does_not_swallow_the_next_block() {
        let text = "<thought>I will emit a <tool_call> block now</thought>\n\
<tool_call>{\"name\": \"a\", \"arguments\": {}, \"id\": 0}</tool_call>";

        assert_eq!(
            extract_tag_content(text, TOOL_CALL),
            vec![r#"{"name": "a", "arguments": {}, "id": 0}"#.to_string()]
        );
        assert_eq!(
            extract_tag_content(text, THOUGHT),
            vec!["I will emit a <tool_call> block now".to_string()]
        );

        let out = TurnOutput::parse(text);
        assert_eq!(out.tool_calls.len(), 1);
        assert!(matches!(&out.tool_calls[0], ParsedCall::Call(c) if c.name == "a" && c.id == 0));
    }

    #[test]
    fn stray_openers_before_each_block() {
        let text = "<response> draft <response>final</response> then <response> x <response>again</response>";
        assert_eq!(
            extract_tag_content(text, RESPONSE),
            vec!["final".to_string(), "again".to_string()]
        );
    }

    #[test]
    fn protocol_patterns_are_compiled_once() {
        for tag in PROTOCOL_TAGS {
            let first = protocol_pattern(tag).unwrap();
            let second = protocol_pattern(tag).unwrap();
            assert!(std::ptr::eq(first, second), "{tag}");
        }
        assert!(protocol_pattern("a.b").is_none());
    }

    #[test]
    fn absent_tag_yields_empty() {
        assert!(extract_tag_content("just prose", RESPONSE).is_empty());
    }

    #[test]
    fn multiline_body_with_unrelated_markup() {
        let text = "<response>\n  Price is <b>$96</b>\n  today.\n</response>";
        assert_eq!(
            extract_tag_content(text, RESPONSE),
            vec!["Price is <b>$96</b>\n  today.".to_string()]
        );
    }

    #[test]
    fn tag_names_are_literal() {
        let text = "<a.b>x</a.b><aXb>y</aXb>";
        assert_eq!(extract_tag_content(text, "a.b"), vec!["x".to_string()]);
    }

    #[test]
    fn turn_output_separates_calls_and_response() {
        let text = r#"<thought>need price</thought>
<tool_call>{"name": "p", "arguments": {"coin": "btc"}, "id": 4}</tool_call>
<tool_call>{"name": "p", "arguments": "btc", "id": 5}</tool_call>
<tool_call>{broken</tool_call>
<response>early guess</response>"#;

        let out = TurnOutput::parse(text);
        assert_eq!(out.thoughts, vec!["need price".to_string()]);
        assert_eq!(out.response.as_deref(), Some("early guess"));
        assert_eq!(out.tool_calls.len(), 3);
        assert!(matches!(&out.tool_calls[0], ParsedCall::Call(c) if c.id == 4));
        assert!(matches!(
            &out.tool_calls[1],
            ParsedCall::Malformed { id: Some(5), error: ToolError::MalformedToolCall(_) }
        ));
        assert!(matches!(&out.tool_calls[2], ParsedCall::Malformed { id: None, .. }));
    }

    #[test]
    fn wrap_round_trips_through_extract() {
        let wrapped = wrap(OBSERVATION, r#"{"0":{"price":"$1"}}"#);
        assert_eq!(
            extract_tag_content(&wrapped, OBSERVATION),
            vec![r#"{"0":{"price":"$1"}}"#.to_string()]
        );
    }
}
