//! Server-Sent Events 流式解码器
//!
//! 增量解析 `text/event-stream` 字节流，数据块边界可以落在任意位置。
//!
//! # 示例
//!
//! ```
//! use sse_stream::StreamDecoder;
//!
//! let mut decoder = StreamDecoder::new();
//!
//! // 第一个数据块只包含半个事件
//! assert!(decoder.decode_default(b"event: ping\nda").is_empty());
//!
//! // 补齐后得到完整事件
//! let events = decoder.decode_default(b"ta: {\"ok\":true}\n\n");
//! assert_eq!(events.len(), 1);
//! assert_eq!(events[0].event.as_deref(), Some("ping"));
//! assert_eq!(events[0].data, "{\"ok\":true}");
//! ```

mod buffer;
mod decoder;
mod frame;

// 公开 API
pub use buffer::{Buffer, EventIter};
pub use decoder::StreamDecoder;
pub use frame::{Event, Field, RawEvent};
