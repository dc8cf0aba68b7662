//! Execution trace log.
//!
//! A fixed ring of pre-allocated rows. Each row carries the raw machine
//! state plus a formatted text line written in place, so logging an
//! instruction allocates nothing. Rows are only recorded while the logger
//! is enabled; the backing storage is allocated on first enable.

use std::fmt;

/// Formatted text capacity of one row.
const TEXT_CAPACITY: usize = 80;

/// One logged instruction.
///
/// The text line is written through the row's [`fmt::Write`] impl and
/// silently truncates at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRow {
    pub pc: u16,
    /// Raw instruction bytes; `opcode_len` of them are valid.
    pub opcode: [u8; 3],
    pub opcode_len: u8,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub s: u8,
    pub p: u8,
    pub cycle: u64,
    pub scanline: u16,
    text: [u8; TEXT_CAPACITY],
    text_len: u8,
}

impl Default for TraceRow {
    fn default() -> Self {
        Self {
            pc: 0,
            opcode: [0; 3],
            opcode_len: 0,
            a: 0,
            x: 0,
            y: 0,
            s: 0,
            p: 0,
            cycle: 0,
            scanline: 0,
            text: [0; TEXT_CAPACITY],
            text_len: 0,
        }
    }
}

impl TraceRow {
    /// The formatted line for this row.
    #[must_use]
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.text[..usize::from(self.text_len)]).unwrap_or("")
    }
}

impl fmt::Write for TraceRow {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let used = usize::from(self.text_len);
        let n = s.len().min(TEXT_CAPACITY - used);
        self.text[used..used + n].copy_from_slice(&s.as_bytes()[..n]);
        self.text_len += n as u8;
        Ok(())
    }
}

/// Ring buffer of executed instructions.
#[derive(Debug)]
pub struct TraceLogger {
    rows: Vec<TraceRow>,
    capacity: usize,
    /// Next slot to write.
    head: usize,
    len: usize,
    enabled: bool,
}

impl TraceLogger {
    /// Create a logger holding up to `capacity` rows. Storage is not
    /// allocated until the logger is first enabled.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            rows: Vec::new(),
            capacity,
            head: 0,
            len: 0,
            enabled: false,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled && self.capacity > 0;
        if self.enabled && self.rows.is_empty() {
            self.rows = vec![TraceRow::default(); self.capacity];
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Claim the next row for writing. Returns `None` while disabled, so
    /// the caller skips all formatting work.
    pub fn begin_row(&mut self) -> Option<&mut TraceRow> {
        if !self.enabled {
            return None;
        }
        let idx = self.head;
        self.head = (self.head + 1) % self.capacity;
        self.len = (self.len + 1).min(self.capacity);
        let row = &mut self.rows[idx];
        *row = TraceRow::default();
        Some(row)
    }

    /// Logged rows, oldest first.
    pub fn rows(&self) -> impl Iterator<Item = &TraceRow> {
        let start = (self.head + self.capacity).wrapping_sub(self.len);
        (0..self.len).map(move |i| &self.rows[(start + i) % self.capacity])
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop all rows but keep the storage and the enabled flag.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}
