//! Per-run conversation history and the observation turns the loop injects.
//!
//! The history is append-only and owned by a single run; nothing outside the
//! loop can mutate it.

use crate::agent::tags;
use crate::types::*;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use tracing::debug;

/// Append-only transcript of one run.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ChatMessage>,
}

impl Conversation {
    /// Seed the history with the system prompt and the framed question.
    pub fn start(system_prompt: &str, question: &str) -> Self {
        Self {
            turns: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(tags::wrap(tags::QUESTION, question.trim())),
            ],
        }
    }

    /// Record model output verbatim.
    pub fn push_assistant(&mut self, output: &str) {
        self.turns.push(ChatMessage::assistant(output));
    }

    pub fn push_observation(&mut self, observation: &Observation) {
        let rendered = observation.render();
        debug!("Observation: {} chars", rendered.len());
        self.turns.push(ChatMessage::user(rendered));
    }

    /// Corrective instruction after an output with nothing to act on.
    pub fn push_nudge(&mut self, nudge: &str) {
        self.turns.push(ChatMessage::system(nudge));
    }

    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    pub fn into_turns(self) -> Vec<ChatMessage> {
        self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Results of every tool call in one model turn, keyed by call id in the
/// order the calls were made.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    results: Vec<(String, Value)>,
}

impl Observation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.results.iter().any(|(k, _)| k == key)
    }

    pub fn push_ok(&mut self, key: String, value: Value) {
        self.results.push((key, value));
    }

    /// Failures are reported to the model as `{"error": message}`.
    pub fn push_err(&mut self, key: String, message: impl std::fmt::Display) {
        self.results
            .push((key, json!({ "error": message.to_string() })));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.results.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// `<observation>{"id": result, ...}</observation>`
    pub fn render(&self) -> String {
        let body = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        tags::wrap(tags::OBSERVATION, &body)
    }
}

impl Serialize for Observation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.results.len()))?;
        for (key, value) in &self.results {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_frames_the_question() {
        let convo = Conversation::start("sys", "  What is BTC?  ");
        assert_eq!(
            convo.turns(),
            &[
                ChatMessage::system("sys"),
                ChatMessage::user("<question>What is BTC?</question>"),
            ]
        );
    }

    #[test]
    fn observation_keeps_call_order() {
        let mut obs = Observation::new();
        for id in [10, 2, 1] {
            obs.push_ok(id.to_string(), json!(id));
        }
        obs.push_err("11".into(), "boom");
        assert_eq!(
            obs.render(),
            r#"<observation>{"10":10,"2":2,"1":1,"11":{"error":"boom"}}</observation>"#
        );
        assert!(obs.contains("2"));
        assert_eq!(obs.get("11"), Some(&json!({"error": "boom"})));
    }

    #[test]
    fn observation_turn_is_user_role() {
        let mut convo = Conversation::start("sys", "q");
        convo.push_observation(&Observation::new());
        assert!(convo.turns()[2].is_observation());
        assert_eq!(convo.turns()[2].content, "<observation>{}</observation>");
    }
}
