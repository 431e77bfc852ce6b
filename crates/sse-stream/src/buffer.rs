//! 内部缓冲区管理

use core::iter::FusedIterator;

use bytes::{Buf as _, BytesMut};

use crate::frame::RawEvent;

/// 事件缓冲区
pub struct Buffer {
    inner: BytesMut,
}

impl Buffer {
    #[inline]
    pub fn new() -> Self { Self { inner: BytesMut::new() } }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { inner: BytesMut::with_capacity(capacity) }
    }

    #[inline]
    pub fn len(&self) -> usize { self.inner.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.inner.is_empty() }

    #[inline]
    pub fn extend_from_slice(&mut self, data: &[u8]) { self.inner.extend_from_slice(data) }

    #[inline]
    pub fn advance(&mut self, cnt: usize) { self.inner.advance(cnt) }

    #[inline]
    pub fn clear(&mut self) { self.inner.clear() }
}

impl Default for Buffer {
    #[inline]
    fn default() -> Self { Self::new() }
}

impl AsRef<[u8]> for Buffer {
    #[inline]
    fn as_ref(&self) -> &[u8] { self.inner.as_ref() }
}

/// 事件迭代器
///
/// 每次产出一个以空行结束的完整事件块，不完整的尾部留在缓冲区中。
#[derive(Debug, Clone)]
pub struct EventIter<'b> {
    buffer: &'b [u8],
    offset: usize,
}

impl<'b> EventIter<'b> {
    #[inline]
    pub const fn new(buffer: &'b [u8]) -> Self { Self { buffer, offset: 0 } }

    /// 返回当前已消耗的字节数
    #[inline]
    pub fn offset(&self) -> usize { self.offset }
}

/// 从 `start` 开始查找一行
///
/// 返回 `(行内容结束位置, 下一行起始位置)`。行尾可以是 `\n`、`\r\n` 或 `\r`。
/// 缓冲区末尾的单个 `\r` 无法判断是否后接 `\n`，视为不完整。
#[inline]
fn next_line(buffer: &[u8], start: usize) -> Option<(usize, usize)> {
    let mut i = start;
    while i < buffer.len() {
        match buffer[i] {
            b'\n' => return Some((i, i + 1)),
            b'\r' => {
                return match buffer.get(i + 1) {
                    Some(b'\n') => Some((i, i + 2)),
                    Some(_) => Some((i, i + 1)),
                    None => None,
                };
            }
            _ => i += 1,
        }
    }
    None
}

impl<'b> Iterator for EventIter<'b> {
    type Item = RawEvent<'b>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.offset;
        let mut cursor = start;

        loop {
            let (end, next) = next_line(self.buffer, cursor)?;

            if end == cursor {
                // 空行：事件结束
                self.offset = next;
                return Some(RawEvent { data: &self.buffer[start..end] });
            }

            cursor = next;
        }
    }
}

impl FusedIterator for EventIter<'_> {}

impl<'b> IntoIterator for &'b Buffer {
    type Item = RawEvent<'b>;
    type IntoIter = EventIter<'b>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter { EventIter::new(self.inner.as_ref()) }
}
