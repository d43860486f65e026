use std::io::{self, Read};

fn count_newlines(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| b == b'\n').count()
}

/// Line bookkeeping for the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCursor {
    /// 1-based line of the window's first byte.
    pub window_start_line: usize,
    /// Newline bytes read from the source so far.
    pub newlines_read: usize,
}

impl Default for LineCursor {
    fn default() -> Self {
        Self {
            window_start_line: 1,
            newlines_read: 0,
        }
    }
}

impl LineCursor {
    /// Line on which the most recently read chunk ends.
    pub fn chunk_end_line(&self) -> usize {
        self.newlines_read + 1
    }
}

/// Owns the read window: unconsumed leftover followed by the latest chunk.
pub struct WindowBuffer<R> {
    input: Option<R>,
    buffer_size: usize,
    max_window: usize,
    window: Vec<u8>,
    cursor: LineCursor,
}

impl<R: Read> WindowBuffer<R> {
    pub fn new(input: R, buffer_size: usize, max_window: usize) -> Self {
        Self {
            input: Some(input),
            buffer_size,
            max_window,
            window: Vec::new(),
            cursor: LineCursor::default(),
        }
    }

    pub fn window(&self) -> &[u8] {
        &self.window
    }

    pub fn cursor(&self) -> LineCursor {
        self.cursor
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn is_exhausted(&self) -> bool {
        self.input.is_none()
    }

    /// True when an unmatched window of this size must abort the parse.
    /// A window whose block only waits for its line end may hold one more
    /// chunk.
    pub fn overflows(&self, block_pending: bool) -> bool {
        let limit = if block_pending {
            self.max_window.saturating_add(self.buffer_size)
        } else {
            self.max_window
        };
        self.window.len() > limit
    }

    /// Appends the next chunk to the leftover. Returns the number of bytes
    /// read; zero means end of stream, at which point the source is dropped.
    pub fn next_window(&mut self) -> io::Result<usize> {
        let Some(input) = self.input.as_mut() else {
            return Ok(0);
        };

        let start = self.window.len();
        let read = input
            .by_ref()
            .take(self.buffer_size as u64)
            .read_to_end(&mut self.window)?;

        if read == 0 {
            self.release();
        } else {
            self.cursor.newlines_read += count_newlines(&self.window[start..]);
        }
        Ok(read)
    }

    /// Drops the first `consumed` bytes of the window; the rest becomes the
    /// leftover for the next read.
    pub fn consume(&mut self, consumed: usize) {
        let consumed = consumed.min(self.window.len());
        self.cursor.window_start_line += count_newlines(&self.window[..consumed]);
        self.window.drain(..consumed);
    }

    /// Closes the source early.
    pub fn release(&mut self) {
        self.input = None;
    }

    /// Line of the byte at `offset` in the current window.
    pub fn line_at(&self, offset: usize) -> usize {
        let offset = offset.min(self.window.len());
        self.cursor.window_start_line + count_newlines(&self.window[..offset])
    }
}
