//! Word-aligned re-segmentation of an incremental text stream.
//!
//! Upstream fragments arrive with arbitrary boundaries. The reassembler
//! buffers them and emits a token at every space (U+0020), the space kept
//! attached to the preceding word. Whatever follows the last space stays
//! buffered until more text arrives or the stream is closed.

use crate::app::constant::DONE_SENTINEL;

/// The single delimiter tokens are cut after.
pub const DELIMITER: char = ' ';

/// Receives the reassembler's output in order.
pub trait TokenSink {
    /// A non-empty piece of reply text.
    fn token(&mut self, token: &str);

    /// A failure indicator written into the stream.
    fn error(&mut self, message: &str);

    /// The terminal sentinel; called exactly once.
    fn done(&mut self);
}

/// Collects plain strings, mostly useful for inspection.
impl TokenSink for Vec<String> {
    #[inline]
    fn token(&mut self, token: &str) { self.push(token.to_owned()) }

    #[inline]
    fn error(&mut self, message: &str) {
        self.push(format!("{} {message}", crate::app::constant::ERROR_PREFIX))
    }

    #[inline]
    fn done(&mut self) { self.push(DONE_SENTINEL.to_owned()) }
}

/// Returned by any operation on a reassembler that is already closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("reassembler is closed")]
pub struct Closed;

pub struct Reassembler<S> {
    buffer: String,
    sink: S,
    emitted: usize,
    closed: bool,
}

impl<S: TokenSink> Reassembler<S> {
    /// Starts a reassembly session with an empty buffer.
    #[inline]
    pub fn open(sink: S) -> Self { Self { buffer: String::new(), sink, emitted: 0, closed: false } }

    /// Appends `fragment` and emits every complete token it produces.
    ///
    /// Returns the number of tokens emitted by this call.
    pub fn push(&mut self, fragment: &str) -> Result<usize, Closed> {
        if self.closed {
            return Err(Closed);
        }
        if fragment.is_empty() {
            return Ok(0);
        }

        // 缓冲区中不含空格，新的切分点只可能出现在追加部分
        let scan_from = self.buffer.len();
        self.buffer.push_str(fragment);

        let mut start = 0;
        let mut count = 0;
        let mut cursor = scan_from;
        while let Some(pos) = self.buffer[cursor..].find(DELIMITER) {
            let end = cursor + pos + DELIMITER.len_utf8();
            self.sink.token(&self.buffer[start..end]);
            count += 1;
            start = end;
            cursor = end;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        self.emitted += count;
        Ok(count)
    }

    /// Flushes the residual and writes the terminal sentinel.
    ///
    /// A residual made only of whitespace is dropped.
    pub fn close(&mut self) -> Result<(), Closed> {
        if self.closed {
            return Err(Closed);
        }
        self.flush_residual();
        self.sink.done();
        self.closed = true;
        Ok(())
    }

    /// Terminates the stream after a failure.
    ///
    /// Text received so far is still flushed, followed by an error
    /// indicator and the terminal sentinel.
    pub fn fail(&mut self, message: &str) -> Result<(), Closed> {
        if self.closed {
            return Err(Closed);
        }
        self.flush_residual();
        self.sink.error(message);
        self.sink.done();
        self.closed = true;
        Ok(())
    }

    fn flush_residual(&mut self) {
        if !self.buffer.trim().is_empty() {
            self.sink.token(&self.buffer);
            self.emitted += 1;
        }
        self.buffer.clear();
    }

    /// Text received but not yet emitted.
    #[inline]
    pub fn buffered(&self) -> &str { &self.buffer }

    /// Tokens emitted so far, excluding error indicators and the sentinel.
    #[inline]
    pub fn emitted(&self) -> usize { self.emitted }

    #[inline]
    pub fn is_closed(&self) -> bool { self.closed }

    #[inline]
    pub fn sink(&self) -> &S { &self.sink }

    #[inline]
    pub fn sink_mut(&mut self) -> &mut S { &mut self.sink }

    #[inline]
    pub fn into_sink(self) -> S { self.sink }
}
