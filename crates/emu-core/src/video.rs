//! Host handoff types for finished frames and audio.

/// Pixel encoding of a framebuffer.
///
/// Buffers are `u32`-backed either way; `Rgb555` machines leave the top 17
/// bits clear and hosts expand on their side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb555,
    Argb8888,
}

/// Physical screen rotation requested by the running title.
///
/// Vertically-oriented games expect the handheld rotated; the core renders
/// unrotated and reports which way the host should turn the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Rotation {
    #[default]
    None = 0,
    /// Rotate 90° counter-clockwise (left edge becomes the bottom).
    Left = 1,
    /// Rotate 90° clockwise (right edge becomes the bottom).
    Right = 2,
}

impl Rotation {
    /// Clockwise degrees the host should rotate the image.
    #[must_use]
    pub const fn degrees_cw(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Left => 270,
            Self::Right => 90,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Left,
            2 => Self::Right,
            _ => Self::None,
        }
    }
}

impl From<u8> for Rotation {
    fn from(raw: u8) -> Self {
        Self::from_u8(raw)
    }
}

/// A completed frame, borrowed from the machine's completed buffer.
///
/// Valid until the next `run_frame` call flips the double buffer.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo<'a> {
    pub pixels: &'a [u32],
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Monotonic frame counter since power-on.
    pub frame_number: u64,
    pub rotation: Rotation,
}

/// Interleaved stereo sample accumulator.
///
/// The mixer pushes left/right pairs; the host drains once per frame. The
/// backing storage is reserved up front and reused, so steady-state pushes
/// never allocate.
pub struct SampleBuffer {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl SampleBuffer {
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        Self {
            // Room for two frames of stereo pairs at typical rates.
            samples: Vec::with_capacity(4096),
            sample_rate,
        }
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn push_stereo(&mut self, left: i16, right: i16) {
        self.samples.push(left);
        self.samples.push(right);
    }

    /// Interleaved samples accumulated since the last clear.
    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Number of stereo pairs accumulated.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.samples.len() / 2
    }

    /// Discard accumulated samples, keeping the reserved storage.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_buffer_accumulates_pairs() {
        let mut buf = SampleBuffer::new(22_050);
        buf.push_stereo(100, -100);
        buf.push_stereo(200, -200);
        assert_eq!(buf.pair_count(), 2);
        assert_eq!(buf.samples(), &[100, -100, 200, -200]);
        let capacity_before = buf.samples.capacity();
        buf.clear();
        assert_eq!(buf.pair_count(), 0);
        assert_eq!(buf.samples.capacity(), capacity_before);
    }

    #[test]
    fn rotation_degrees() {
        assert_eq!(Rotation::None.degrees_cw(), 0);
        assert_eq!(Rotation::Left.degrees_cw(), 270);
        assert_eq!(Rotation::Right.degrees_cw(), 90);
        assert_eq!(Rotation::from(1u8), Rotation::Left);
        assert_eq!(Rotation::from(9u8), Rotation::None);
    }
}
