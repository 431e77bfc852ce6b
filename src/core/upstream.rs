//! Assistant service access.

mod client;
mod error;
mod model;

use bytes::Bytes;
use futures_util::stream::BoxStream;

pub use client::OpenAiClient;
pub use error::UpstreamError;
pub use model::{
    ContentPart, MessageDeltaEvent, MessageList, Run, RunError, RunStatus, StreamErrorEvent,
    TextPart, ThreadMessage, ThreadObject,
};

use crate::core::session::ConversationHandle;

/// Raw bytes of a run's event stream.
pub type ByteStream = BoxStream<'static, Result<Bytes, UpstreamError>>;

/// Operations the relay needs from the assistant service.
#[async_trait::async_trait]
pub trait AssistantApi: Send + Sync + 'static {
    async fn create_thread(&self) -> Result<ConversationHandle, UpstreamError>;

    async fn add_user_message(
        &self,
        thread: &ConversationHandle,
        content: &str,
    ) -> Result<(), UpstreamError>;

    /// Starts a run with streaming enabled and returns its event stream.
    async fn stream_run(&self, thread: &ConversationHandle) -> Result<ByteStream, UpstreamError>;

    /// Starts a run without streaming.
    async fn create_run(&self, thread: &ConversationHandle) -> Result<Run, UpstreamError>;

    async fn retrieve_run(
        &self,
        thread: &ConversationHandle,
        run_id: &str,
    ) -> Result<Run, UpstreamError>;

    /// Text of the newest assistant message produced by `run_id`.
    async fn latest_reply(
        &self,
        thread: &ConversationHandle,
        run_id: &str,
    ) -> Result<Option<String>, UpstreamError>;
}
