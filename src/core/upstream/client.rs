use core::time::Duration;

use futures_util::{StreamExt as _, TryStreamExt as _};
use http::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::model::{CreateMessage, CreateRun, MessageList, Run, ThreadObject};
use super::{AssistantApi, ByteStream, UpstreamError};
use crate::app::config::{ApiKey, Config};
use crate::app::constant::header::{EVENT_STREAM, OPENAI_BETA};
use crate::app::constant::{OPENAI_BETA_ASSISTANTS, PKG_NAME, PKG_VERSION};
use crate::core::session::ConversationHandle;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the OpenAI Assistants API (v2).
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: ApiKey,
    assistant_id: String,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .user_agent(format!("{PKG_NAME}/{PKG_VERSION}"))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: config.upstream_base_url.clone(),
            api_key: config.api_key.clone(),
            assistant_id: config.assistant_id.clone(),
        })
    }

    #[inline]
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(self.api_key.expose())
            .header(OPENAI_BETA, OPENAI_BETA_ASSISTANTS)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, UpstreamError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(%status, "upstream request rejected");
        Err(UpstreamError::from_status(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, UpstreamError> {
        let bytes = self.send(request).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait::async_trait]
impl AssistantApi for OpenAiClient {
    async fn create_thread(&self) -> Result<ConversationHandle, UpstreamError> {
        let request = self
            .request(Method::POST, "/threads")
            .header(CONTENT_TYPE, "application/json")
            .body("{}");
        let thread: ThreadObject = self.send_json(request).await?;
        Ok(ConversationHandle::new(thread.id))
    }

    async fn add_user_message(
        &self,
        thread: &ConversationHandle,
        content: &str,
    ) -> Result<(), UpstreamError> {
        let request = self
            .request(Method::POST, &format!("/threads/{thread}/messages"))
            .json(&CreateMessage { role: "user", content });
        self.send(request).await?;
        Ok(())
    }

    async fn stream_run(&self, thread: &ConversationHandle) -> Result<ByteStream, UpstreamError> {
        let request = self
            .request(Method::POST, &format!("/threads/{thread}/runs"))
            .header(ACCEPT, EVENT_STREAM)
            .json(&CreateRun { assistant_id: &self.assistant_id, stream: true });
        let response = self.send(request).await?;
        tracing::debug!(thread = %thread, "run stream opened");
        Ok(response.bytes_stream().map_err(UpstreamError::from).boxed())
    }

    async fn create_run(&self, thread: &ConversationHandle) -> Result<Run, UpstreamError> {
        let request = self
            .request(Method::POST, &format!("/threads/{thread}/runs"))
            .json(&CreateRun { assistant_id: &self.assistant_id, stream: false });
        let run: Run = self.send_json(request).await?;
        tracing::debug!(thread = %thread, run = %run.id, status = run.status.as_str(), "run created");
        Ok(run)
    }

    async fn retrieve_run(
        &self,
        thread: &ConversationHandle,
        run_id: &str,
    ) -> Result<Run, UpstreamError> {
        self.send_json(self.request(Method::GET, &format!("/threads/{thread}/runs/{run_id}"))).await
    }

    async fn latest_reply(
        &self,
        thread: &ConversationHandle,
        run_id: &str,
    ) -> Result<Option<String>, UpstreamError> {
        let path = format!("/threads/{thread}/messages?order=desc&limit=20&run_id={run_id}");
        let list: MessageList = self.send_json(self.request(Method::GET, &path)).await?;
        Ok(list.latest_reply(run_id))
    }
}

impl core::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("assistant_id", &self.assistant_id)
            .finish_non_exhaustive()
    }
}
