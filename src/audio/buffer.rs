//! # Accumulation Buffer
//!
//! Collects 16-bit samples until a minimum threshold is reached, then
//! releases them as one block. Used to batch small capture chunks before
//! they are handed to a consumer that prefers larger writes.
//!
//! Every operation is a pure state transition; nothing here can fail.

/// Default threshold: 800 samples = 50ms at 16kHz.
pub const DEFAULT_MIN_SAMPLES: usize = 800;

/// Growable sample store with minimum-threshold release semantics.
///
/// `add_samples` returns a block if and only if the accumulated length has
/// reached the threshold, and the buffer is empty immediately after
/// returning that block. The buffer never auto-resets; `clear` is explicit.
#[derive(Debug)]
pub struct SampleBuffer {
    buffer: Vec<i16>,
    min_samples: usize,
}

impl SampleBuffer {
    pub fn new(min_samples: usize) -> Self {
        Self {
            buffer: Vec::new(),
            min_samples,
        }
    }

    /// Append a chunk; returns the full accumulated block once the
    /// threshold is reached, or `None` while still accumulating.
    pub fn add_samples(&mut self, samples: &[i16]) -> Option<Vec<i16>> {
        self.buffer.extend_from_slice(samples);

        if self.buffer.len() >= self.min_samples {
            return Some(std::mem::take(&mut self.buffer));
        }
        None
    }

    /// Drain whatever is accumulated, regardless of the threshold.
    pub fn flush(&mut self) -> Vec<i16> {
        std::mem::take(&mut self.buffer)
    }

    /// Discard the accumulated contents without returning them.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SAMPLES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_threshold_accumulates() {
        let mut buffer = SampleBuffer::new(10);

        assert!(buffer.add_samples(&[1, 2, 3]).is_none());
        assert!(buffer.add_samples(&[4, 5, 6]).is_none());
        assert_eq!(buffer.len(), 6);
    }

    #[test]
    fn test_crossing_threshold_releases_block() {
        let mut buffer = SampleBuffer::new(10);
        buffer.add_samples(&[0; 7]);

        // The crossing call returns the exact accumulated length
        let block = buffer.add_samples(&[1, 2, 3, 4]).expect("threshold crossed");
        assert_eq!(block.len(), 11);
        assert_eq!(&block[7..], &[1, 2, 3, 4]);

        // Buffer is empty immediately after the release
        assert!(buffer.is_empty());
        assert!(buffer.add_samples(&[1]).is_none());
    }

    #[test]
    fn test_exact_threshold_releases() {
        let mut buffer = SampleBuffer::new(4);
        let block = buffer.add_samples(&[1, 2, 3, 4]).expect("exact threshold");
        assert_eq!(block, vec![1, 2, 3, 4]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_flush_ignores_threshold() {
        let mut buffer = SampleBuffer::new(100);
        buffer.add_samples(&[1, 2, 3]);

        assert_eq!(buffer.flush(), vec![1, 2, 3]);
        assert!(buffer.is_empty());
        assert!(buffer.flush().is_empty());
    }

    #[test]
    fn test_clear_discards() {
        let mut buffer = SampleBuffer::new(100);
        buffer.add_samples(&[1, 2, 3]);
        buffer.clear();

        assert!(buffer.is_empty());
        assert!(buffer.flush().is_empty());
    }
}
