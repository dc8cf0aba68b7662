//! Bidirectional state serialization.
//!
//! One `serialize` method per component covers both directions, so save and
//! load can never disagree on field order. Components wrap their fields in a
//! tagged, length-prefixed [`Serializer::section`]; loading tolerates extra
//! trailing bytes inside a section (newer writer) and flags tag mismatches
//! and underruns instead of panicking. Derived state (lookup tables, decoded
//! pointers, framebuffers) is never serialized; rebuild it after load.

/// Direction of a [`Serializer`] stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Writing component state out to bytes.
    Save,
    /// Restoring component state from bytes.
    Load,
}

/// A component with serializable state.
pub trait Snapshot {
    /// Save or restore this component's state, depending on the stream mode.
    ///
    /// Implementations call the `Serializer` value methods in a fixed order;
    /// the same code path runs for both directions.
    fn serialize(&mut self, s: &mut Serializer);
}

/// Byte stream for saving or restoring machine state.
#[derive(Debug)]
pub struct Serializer {
    mode: StreamMode,
    data: Vec<u8>,
    pos: usize,
    failed: bool,
    failed_section: Option<&'static [u8; 4]>,
}

impl Serializer {
    /// Create a serializer that collects state into bytes.
    #[must_use]
    pub fn writer() -> Self {
        Self {
            mode: StreamMode::Save,
            data: Vec::with_capacity(0x1_0000),
            pos: 0,
            failed: false,
            failed_section: None,
        }
    }

    /// Create a serializer that restores state from `data`.
    #[must_use]
    pub fn reader(data: Vec<u8>) -> Self {
        Self {
            mode: StreamMode::Load,
            data,
            pos: 0,
            failed: false,
            failed_section: None,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> StreamMode {
        self.mode
    }

    #[must_use]
    pub const fn is_saving(&self) -> bool {
        matches!(self.mode, StreamMode::Save)
    }

    /// True once any section tag mismatched or the stream ran short.
    #[must_use]
    pub const fn has_failed(&self) -> bool {
        self.failed
    }

    /// Tag of the first section that failed to restore, if any.
    #[must_use]
    pub fn failed_section(&self) -> Option<&'static str> {
        self.failed_section.and_then(|t| core::str::from_utf8(t).ok())
    }

    /// Consume the serializer and return the collected bytes.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.data
    }

    /// Bytes left to read (load mode).
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn fetch(&mut self, out: &mut [u8]) -> bool {
        if self.failed {
            return false;
        }
        let end = self.pos + out.len();
        if end > self.data.len() {
            self.failed = true;
            return false;
        }
        out.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        true
    }

    pub fn u8(&mut self, v: &mut u8) {
        match self.mode {
            StreamMode::Save => self.data.push(*v),
            StreamMode::Load => {
                let mut b = [0u8; 1];
                if self.fetch(&mut b) {
                    *v = b[0];
                }
            }
        }
    }

    pub fn i8(&mut self, v: &mut i8) {
        let mut raw = *v as u8;
        self.u8(&mut raw);
        *v = raw as i8;
    }

    pub fn bool(&mut self, v: &mut bool) {
        let mut raw = u8::from(*v);
        self.u8(&mut raw);
        *v = raw != 0;
    }

    pub fn u16(&mut self, v: &mut u16) {
        match self.mode {
            StreamMode::Save => self.data.extend_from_slice(&v.to_le_bytes()),
            StreamMode::Load => {
                let mut b = [0u8; 2];
                if self.fetch(&mut b) {
                    *v = u16::from_le_bytes(b);
                }
            }
        }
    }

    pub fn i16(&mut self, v: &mut i16) {
        let mut raw = *v as u16;
        self.u16(&mut raw);
        *v = raw as i16;
    }

    pub fn u32(&mut self, v: &mut u32) {
        match self.mode {
            StreamMode::Save => self.data.extend_from_slice(&v.to_le_bytes()),
            StreamMode::Load => {
                let mut b = [0u8; 4];
                if self.fetch(&mut b) {
                    *v = u32::from_le_bytes(b);
                }
            }
        }
    }

    pub fn i32(&mut self, v: &mut i32) {
        let mut raw = *v as u32;
        self.u32(&mut raw);
        *v = raw as i32;
    }

    pub fn u64(&mut self, v: &mut u64) {
        match self.mode {
            StreamMode::Save => self.data.extend_from_slice(&v.to_le_bytes()),
            StreamMode::Load => {
                let mut b = [0u8; 8];
                if self.fetch(&mut b) {
                    *v = u64::from_le_bytes(b);
                }
            }
        }
    }

    pub fn i64(&mut self, v: &mut i64) {
        let mut raw = *v as u64;
        self.u64(&mut raw);
        *v = raw as i64;
    }

    /// Serialize a raw byte region (RAM, ROM-backed RAM, register files).
    pub fn bytes(&mut self, v: &mut [u8]) {
        match self.mode {
            StreamMode::Save => self.data.extend_from_slice(v),
            StreamMode::Load => {
                let _ = self.fetch(v);
            }
        }
    }

    /// Wrap one component's fields in a tagged, length-prefixed block.
    ///
    /// On load, a tag mismatch or overrun marks the stream failed and skips
    /// the body; extra trailing bytes within the block are skipped so newer
    /// writers stay loadable.
    pub fn section(&mut self, tag: &'static [u8; 4], body: impl FnOnce(&mut Self)) {
        match self.mode {
            StreamMode::Save => {
                self.data.extend_from_slice(tag);
                let len_pos = self.data.len();
                self.data.extend_from_slice(&[0u8; 4]);
                body(self);
                let len = (self.data.len() - len_pos - 4) as u32;
                self.data[len_pos..len_pos + 4].copy_from_slice(&len.to_le_bytes());
            }
            StreamMode::Load => {
                if self.failed {
                    return;
                }
                let mut found = [0u8; 4];
                if !self.fetch(&mut found) {
                    self.mark_failed(tag);
                    return;
                }
                let mut len_bytes = [0u8; 4];
                if !self.fetch(&mut len_bytes) {
                    self.mark_failed(tag);
                    return;
                }
                let len = u32::from_le_bytes(len_bytes) as usize;
                if found != *tag {
                    log::warn!(
                        "state section mismatch: expected {:?}, found {:?}",
                        core::str::from_utf8(tag).unwrap_or("?"),
                        core::str::from_utf8(&found).unwrap_or("?")
                    );
                    self.mark_failed(tag);
                    return;
                }
                let end = self.pos + len;
                if end > self.data.len() {
                    self.mark_failed(tag);
                    return;
                }
                body(self);
                if self.failed || self.pos > end {
                    self.mark_failed(tag);
                } else {
                    self.pos = end;
                }
            }
        }
    }

    fn mark_failed(&mut self, tag: &'static [u8; 4]) {
        self.failed = true;
        if self.failed_section.is_none() {
            self.failed_section = Some(tag);
        }
    }
}
