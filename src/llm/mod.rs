//! Chat model boundary.
//!
//! The loop only needs `complete(history) -> text`; transport, auth and model
//! choice live behind [`ChatModel`] and are injected into the agent.

pub mod client;
pub mod scripted;

pub use client::ChatClient;
pub use scripted::ScriptedModel;

use crate::types::ChatMessage;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A chat completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete the conversation and return the model's raw text.
    async fn complete(&self, history: &[ChatMessage]) -> Result<String>;
}

#[async_trait]
impl<M: ChatModel + ?Sized> ChatModel for Arc<M> {
    async fn complete(&self, history: &[ChatMessage]) -> Result<String> {
        (**self).complete(history).await
    }
}

#[async_trait]
impl<M: ChatModel + ?Sized> ChatModel for Box<M> {
    async fn complete(&self, history: &[ChatMessage]) -> Result<String> {
        (**self).complete(history).await
    }
}
