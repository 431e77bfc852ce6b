//! SSE body of `POST /chat`.

use core::convert::Infallible;

use bytes::{BufMut as _, Bytes, BytesMut};
use futures_util::StreamExt as _;
use futures_util::stream;

use crate::app::constant::{DONE_SENTINEL, ERROR_PREFIX, SSE_DATA_PREFIX, SSE_FRAME_END};
use crate::core::reassembler::{Reassembler, TokenSink};
use crate::core::source::{FragmentStream, SourceEvent};

/// Accumulates `data:` frames until the body stream takes them.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    #[inline]
    pub fn new() -> Self { Self { buf: BytesMut::with_capacity(256) } }

    /// Writes one event carrying `parts` concatenated.
    ///
    /// Line breaks inside the payload become additional `data:` lines,
    /// which SSE clients join back with `\n`.
    fn write_frame(&mut self, parts: &[&str]) {
        self.buf.put_slice(SSE_DATA_PREFIX.as_bytes());
        for part in parts {
            let mut rest = *part;
            while let Some(pos) = rest.find(['\r', '\n']) {
                self.buf.put_slice(rest[..pos].as_bytes());
                self.buf.put_u8(b'\n');
                self.buf.put_slice(SSE_DATA_PREFIX.as_bytes());
                let skip = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
                rest = &rest[pos + skip..];
            }
            self.buf.put_slice(rest.as_bytes());
        }
        self.buf.put_slice(SSE_FRAME_END.as_bytes());
    }

    /// Frames written since the last call, if any.
    #[inline]
    pub fn take(&mut self) -> Option<Bytes> {
        if self.buf.is_empty() { None } else { Some(self.buf.split().freeze()) }
    }
}

impl TokenSink for FrameBuffer {
    #[inline]
    fn token(&mut self, token: &str) { self.write_frame(&[token]) }

    #[inline]
    fn error(&mut self, message: &str) { self.write_frame(&[ERROR_PREFIX, " ", message]) }

    #[inline]
    fn done(&mut self) { self.write_frame(&[DONE_SENTINEL]) }
}

/// Held by [`relay`] for as long as the body stream exists.
pub trait RelayGuard: Send + 'static {
    /// The reply ended with an error frame.
    #[inline]
    fn failed(&self) {}
}

impl RelayGuard for () {}

struct Relay<G> {
    events: FragmentStream,
    reassembler: Reassembler<FrameBuffer>,
    guard: G,
}

/// Re-segments `events` into word-aligned SSE frames.
///
/// Every way the source can end, including failures, produces the
/// terminal sentinel. `guard` lives exactly as long as the stream, so
/// dropping the body on client disconnect releases it and stops the source.
pub fn relay<G>(
    events: FragmentStream,
    guard: G,
) -> impl futures_core::Stream<Item = Result<Bytes, Infallible>> + Send + 'static
where
    G: RelayGuard,
{
    let state = Relay { events, reassembler: Reassembler::open(FrameBuffer::new()), guard };

    stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        loop {
            // 只有流结束后才会关闭，push/close/fail 不会返回 Closed
            let finished = match state.events.next().await {
                Some(Ok(SourceEvent::Fragment(text))) => {
                    let _ = state.reassembler.push(&text);
                    false
                }
                Some(Ok(SourceEvent::RunFailed(reason))) => {
                    tracing::warn!(%reason, "assistant run did not complete");
                    state.guard.failed();
                    let _ = state.reassembler.fail(&reason);
                    true
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "upstream failed mid-stream");
                    state.guard.failed();
                    let _ = state.reassembler.fail(&e.to_string());
                    true
                }
                None => {
                    let _ = state.reassembler.close();
                    true
                }
            };

            if finished {
                tracing::debug!(tokens = state.reassembler.emitted(), "stream finished");
            }
            if let Some(bytes) = state.reassembler.sink_mut().take() {
                return Some((Ok(bytes), (!finished).then_some(state)));
            }
            if finished {
                return None;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use futures_util::StreamExt as _;

    use super::*;
    use crate::core::upstream::UpstreamError;

    #[derive(Clone, Default)]
    struct FailureCounter(Arc<AtomicUsize>);

    impl RelayGuard for FailureCounter {
        fn failed(&self) { self.0.fetch_add(1, Ordering::SeqCst); }
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) { self.0.store(true, Ordering::SeqCst) }
    }

    fn frames(events: Vec<Result<SourceEvent, UpstreamError>>) -> impl Future<Output = String> {
        let body = relay(stream::iter(events).boxed(), ());
        async move {
            let chunks: Vec<_> = body.collect().await;
            chunks.into_iter().map(|c| String::from_utf8(c.unwrap().to_vec()).unwrap()).collect()
        }
    }

    fn fragment(text: &str) -> Result<SourceEvent, UpstreamError> { Ok(SourceEvent::Fragment(text.into())) }

    #[tokio::test]
    async fn test_frames_and_sentinel() {
        let body = frames(vec![fragment("Hel"), fragment("lo wor"), fragment("ld")]).await;
        assert_eq!(body, "data: Hello \n\ndata: world\n\ndata: [DONE]\n\n");
    }

    #[tokio::test]
    async fn test_empty_source() {
        assert_eq!(frames(vec![]).await, "data: [DONE]\n\n");
    }

    #[tokio::test]
    async fn test_run_failure_is_written_into_stream() {
        let body = frames(vec![
            fragment("Partial "),
            Ok(SourceEvent::RunFailed("rate limited".into())),
            fragment("never"),
        ])
        .await;
        assert_eq!(body, "data: Partial \n\ndata: [ERROR] rate limited\n\ndata: [DONE]\n\n");
    }

    #[tokio::test]
    async fn test_transport_error_mid_stream() {
        let body = frames(vec![fragment("abc"), Err(UpstreamError::Stream("reset".into()))]).await;
        assert_eq!(
            body,
            "data: abc\n\ndata: [ERROR] upstream stream error: reset\n\ndata: [DONE]\n\n"
        );
    }

    #[tokio::test]
    async fn test_guard_released_when_stream_ends() {
        let guard = FailureCounter::default();
        let body = relay(stream::iter(vec![fragment("x ")]).boxed(), guard.clone());
        let _: Vec<_> = body.collect().await;
        assert_eq!(Arc::strong_count(&guard.0), 1);
        assert_eq!(guard.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failures_reach_guard() {
        for failure in [
            Ok(SourceEvent::RunFailed("expired".into())),
            Err(UpstreamError::Stream("reset".into())),
        ] {
            let guard = FailureCounter::default();
            let body = relay(stream::iter(vec![fragment("a"), failure]).boxed(), guard.clone());
            let _: Vec<_> = body.collect().await;
            assert_eq!(guard.0.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_disconnect_drops_source() {
        let dropped = Arc::new(AtomicBool::new(false));
        let marker = SetOnDrop(dropped.clone());
        let events = stream::iter(vec![fragment("first ")])
            .chain(stream::pending::<Result<SourceEvent, UpstreamError>>())
            .map(move |event| {
                let _marker = &marker;
                event
            })
            .boxed();
        let guard = FailureCounter::default();

        let mut body = Box::pin(relay(events, guard.clone()));
        let first = body.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"data: first \n\n");
        assert!(!dropped.load(Ordering::SeqCst));

        // 客户端断开即丢弃响应体
        drop(body);
        assert!(dropped.load(Ordering::SeqCst));
        assert_eq!(Arc::strong_count(&guard.0), 1);
        assert_eq!(guard.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_multiline_token_framing() {
        let mut frames = FrameBuffer::new();
        frames.token("one\ntwo\r\nthree");
        frames.done();
        let bytes = frames.take().unwrap();
        assert_eq!(&bytes[..], b"data: one\ndata: two\ndata: three\n\ndata: [DONE]\n\n");
        assert_eq!(frames.take(), None);
    }
}
