//! Transport abstraction for the streaming chat call

use async_trait::async_trait;
use koach_api::{ChatRequest, CoachClient, ReplyEventStream};

/// Transport for submitting one chat turn and receiving the reply stream.
///
/// [`CoachClient`] is the production implementation; tests substitute a
/// scripted one.
#[async_trait]
pub trait CoachTransport: Send + Sync {
    /// Submit a chat request and return the decoded reply stream
    async fn stream_chat(&self, request: &ChatRequest) -> koach_api::Result<ReplyEventStream>;
}

#[async_trait]
impl CoachTransport for CoachClient {
    async fn stream_chat(&self, request: &ChatRequest) -> koach_api::Result<ReplyEventStream> {
        CoachClient::stream_chat(self, request).await
    }
}
