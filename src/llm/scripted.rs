//! Canned-reply model for tests and offline demos.

use crate::llm::ChatModel;
use crate::types::ChatMessage;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Replays a fixed list of replies, one per call.
#[derive(Debug)]
pub struct ScriptedModel {
    replies: Vec<String>,
    /// Repeat the last reply forever instead of failing when exhausted.
    repeat_last: bool,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            repeat_last: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A model that gives the same reply on every call.
    pub fn repeating(reply: impl Into<String>) -> Self {
        Self {
            replies: vec![reply.into()],
            repeat_last: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times `complete` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, _history: &[ChatMessage]) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.get(n) {
            Some(reply) => Ok(reply.clone()),
            None if self.repeat_last && !self.replies.is_empty() => {
                Ok(self.replies[self.replies.len() - 1].clone())
            }
            None => bail!("scripted model exhausted after {} replies", self.replies.len()),
        }
    }
}
