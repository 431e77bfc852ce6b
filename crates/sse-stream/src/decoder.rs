//! 流式事件解码器

use crate::buffer::Buffer;
use crate::frame::{Event, RawEvent};

/// SSE 流式事件解码器
///
/// 处理增量数据块，产出完整的事件。
///
/// # 示例
///
/// ```
/// use sse_stream::StreamDecoder;
///
/// let mut decoder = StreamDecoder::new();
///
/// // 使用自定义处理器：只保留 data 字段
/// let data: Vec<String> = decoder.decode(b"data: hi\n\n", |raw| raw.parse().map(|e| e.data));
/// assert_eq!(data, ["hi"]);
/// ```
pub struct StreamDecoder {
    buffer: Buffer,
}

impl StreamDecoder {
    /// 创建新的解码器
    #[inline]
    pub fn new() -> Self { Self { buffer: Buffer::new() } }

    /// 使用自定义处理器解码数据块
    ///
    /// # 参数
    /// - `data`: 接收到的数据块
    /// - `processor`: 接收原始事件并返回处理结果，返回 `None` 的事件被丢弃
    pub fn decode<T, F>(&mut self, data: &[u8], mut processor: F) -> Vec<T>
    where F: FnMut(RawEvent<'_>) -> Option<T> {
        self.buffer.extend_from_slice(data);

        let mut iter = (&self.buffer).into_iter();
        let mut events = Vec::new();

        for raw in &mut iter {
            if let Some(event) = processor(raw) {
                events.push(event);
            }
        }

        self.buffer.advance(iter.offset());
        events
    }

    /// 使用默认处理器解码数据块，产出 [`Event`]
    #[inline]
    pub fn decode_default(&mut self, data: &[u8]) -> Vec<Event> { self.decode(data, |raw| raw.parse()) }

    /// 流结束时处理缓冲区中剩余的内容
    ///
    /// 上游可能在最后一个事件后省略空行，此时将剩余字节视为一个完整事件。
    pub fn finish(&mut self) -> Option<Event> {
        if self.buffer.is_empty() {
            return None;
        }
        let event = RawEvent { data: self.buffer.as_ref() }.parse();
        self.buffer.clear();
        event
    }

    /// 缓冲区中尚未构成完整事件的字节数
    #[inline]
    pub fn pending(&self) -> usize { self.buffer.len() }
}

impl Default for StreamDecoder {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = StreamDecoder::new();
        let input: &[u8] = b"event: thread.message.delta\ndata: {\"a\":1}\n\nevent: done\ndata: [DONE]\n\n";

        let mut events = Vec::new();
        for chunk in input.chunks(3) {
            events.extend(decoder.decode_default(chunk));
        }

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name(), "thread.message.delta");
        assert_eq!(events[0].data, "{\"a\":1}");
        assert_eq!(events[1].name(), "done");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_comments_are_dropped() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.decode_default(b": ping\n\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.decode_default(b"event: done\ndata: [DONE]").is_empty());

        let event = decoder.finish().unwrap();
        assert_eq!(event.name(), "done");
        assert_eq!(event.data, "[DONE]");
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_multibyte_text_split() {
        let mut decoder = StreamDecoder::new();
        let input = "data: héllo wörld\n\n".as_bytes();
        let (a, b) = input.split_at(8); // 切在 é 中间

        assert!(decoder.decode_default(a).is_empty());
        let events = decoder.decode_default(b);
        assert_eq!(events[0].data, "héllo wörld");
    }
}
