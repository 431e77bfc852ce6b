//! Producers of reply fragments.
//!
//! Both sources start a run on the conversation and yield the reply as
//! [`SourceEvent`]s; the stream ends when the run is over.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use core::time::Duration;

use futures_util::StreamExt as _;
use futures_util::stream::{self, BoxStream};
use sse_stream::{Event, StreamDecoder};

use crate::core::session::ConversationHandle;
use crate::core::upstream::{
    AssistantApi, ByteStream, MessageDeltaEvent, Run, RunStatus, StreamErrorEvent, UpstreamError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A piece of reply text with arbitrary boundaries.
    Fragment(String),
    /// The run ended without completing; carries the reason.
    RunFailed(String),
}

pub type FragmentStream = BoxStream<'static, Result<SourceEvent, UpstreamError>>;

#[async_trait::async_trait]
pub trait FragmentSource: Send + Sync + 'static {
    /// Starts a run on `thread`.
    ///
    /// Errors returned here happen before any reply text exists; errors
    /// yielded by the stream happen mid-reply.
    async fn open(
        &self,
        api: Arc<dyn AssistantApi>,
        thread: ConversationHandle,
    ) -> Result<FragmentStream, UpstreamError>;

    fn name(&self) -> &'static str;
}

/// Relays the run's own event stream as it arrives.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamingSource;

#[async_trait::async_trait]
impl FragmentSource for StreamingSource {
    async fn open(
        &self,
        api: Arc<dyn AssistantApi>,
        thread: ConversationHandle,
    ) -> Result<FragmentStream, UpstreamError> {
        let bytes = api.stream_run(&thread).await?;
        Ok(run_events(bytes).boxed())
    }

    #[inline]
    fn name(&self) -> &'static str { "stream" }
}

enum Control {
    Continue,
    Stop,
}

struct RunEvents {
    bytes: ByteStream,
    decoder: StreamDecoder,
    pending: VecDeque<Result<SourceEvent, UpstreamError>>,
    /// `thread.run.completed` or `done` was seen.
    completed: bool,
    finished: bool,
}

impl RunEvents {
    fn translate(&mut self, event: Event) -> Control {
        match event.name() {
            "thread.message.delta" => match serde_json::from_str::<MessageDeltaEvent>(&event.data) {
                Ok(delta) => {
                    self.pending
                        .extend(delta.texts().map(|t| Ok(SourceEvent::Fragment(t.to_owned()))));
                    Control::Continue
                }
                Err(e) => {
                    self.pending.push_back(Err(e.into()));
                    Control::Stop
                }
            },
            "thread.run.failed"
            | "thread.run.cancelled"
            | "thread.run.expired"
            | "thread.run.incomplete"
            | "thread.run.requires_action" => {
                let reason = match serde_json::from_str::<Run>(&event.data) {
                    Ok(run) => run.failure_message(),
                    Err(_) => event.name().trim_start_matches("thread.").to_owned(),
                };
                self.pending.push_back(Ok(SourceEvent::RunFailed(reason)));
                Control::Stop
            }
            "error" => {
                let message = serde_json::from_str::<StreamErrorEvent>(&event.data)
                    .map(StreamErrorEvent::into_message)
                    .unwrap_or_else(|_| event.data.clone());
                self.pending.push_back(Err(UpstreamError::Stream(message)));
                Control::Stop
            }
            "thread.run.completed" => {
                self.completed = true;
                Control::Continue
            }
            "done" => {
                self.completed = true;
                Control::Stop
            }
            other => {
                tracing::trace!(event = other, "run event ignored");
                Control::Continue
            }
        }
    }

    fn feed(&mut self, events: Vec<Event>) {
        for event in events {
            if let Control::Stop = self.translate(event) {
                self.finished = true;
                return;
            }
        }
    }
}

/// Translates the raw bytes of a run stream into [`SourceEvent`]s.
///
/// A stream that ends before the run reports completion yields an error.
pub fn run_events(
    bytes: ByteStream,
) -> impl futures_core::Stream<Item = Result<SourceEvent, UpstreamError>> + Send + 'static {
    let state = RunEvents {
        bytes,
        decoder: StreamDecoder::new(),
        pending: VecDeque::new(),
        completed: false,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.decode_default(&chunk);
                    state.feed(events);
                }
                Some(Err(e)) => {
                    state.pending.push_back(Err(e));
                    state.finished = true;
                }
                None => {
                    let tail = state.decoder.finish();
                    state.feed(tail.into_iter().collect());
                    // 连接在运行结束前断开
                    if !state.finished && !state.completed {
                        state.pending.push_back(Err(UpstreamError::Stream(
                            "stream ended before run completed".to_owned(),
                        )));
                    }
                    state.finished = true;
                }
            }
        }
    })
}

/// Starts a run and checks its status at a fixed interval.
///
/// The reply is fetched once the run completes and delivered as a single
/// fragment; the reassembler splits it like any streamed text.
#[derive(Debug, Clone, Copy)]
pub struct PollingSource {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollingSource {
    #[inline]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self { Self { interval, max_attempts } }
}

#[async_trait::async_trait]
impl FragmentSource for PollingSource {
    async fn open(
        &self,
        api: Arc<dyn AssistantApi>,
        thread: ConversationHandle,
    ) -> Result<FragmentStream, UpstreamError> {
        let run = api.create_run(&thread).await?;
        let this = *self;
        Ok(stream::once(async move { this.wait(&*api, &thread, run).await }).boxed())
    }

    #[inline]
    fn name(&self) -> &'static str { "poll" }
}

impl PollingSource {
    async fn wait(
        self,
        api: &dyn AssistantApi,
        thread: &ConversationHandle,
        mut run: Run,
    ) -> Result<SourceEvent, UpstreamError> {
        let mut attempts = 0;
        while !run.status.is_terminal() {
            if attempts >= self.max_attempts {
                tracing::warn!(thread = %thread, run = %run.id, attempts, "run polling gave up");
                return Err(UpstreamError::PollTimeout { attempts });
            }
            tokio::time::sleep(self.interval).await;
            run = api.retrieve_run(thread, &run.id).await?;
            attempts += 1;
        }

        if run.status != RunStatus::Completed {
            return Ok(SourceEvent::RunFailed(run.failure_message()));
        }
        let text = api.latest_reply(thread, &run.id).await?.unwrap_or_default();
        tracing::debug!(thread = %thread, run = %run.id, attempts, len = text.len(), "run completed");
        Ok(SourceEvent::Fragment(text))
    }
}
