//! Interleaved PCM audio carried alongside video frames.

/// Interleaved signed 16-bit samples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioBuffer {
    samples: Vec<i16>,
}

impl AudioBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop all samples, keeping the allocation.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Replace the contents with `samples`.
    pub fn copy_from(&mut self, samples: &[i16]) {
        self.samples.clear();
        self.samples.extend_from_slice(samples);
    }

    pub fn extend_from_slice(&mut self, samples: &[i16]) {
        self.samples.extend_from_slice(samples);
    }

    /// Merge `other` into this buffer sample by sample.
    ///
    /// Overlapping samples are summed with saturation; the buffer grows to
    /// the longer of the two lengths.
    pub fn mix_from(&mut self, other: &[i16]) {
        let overlap = self.samples.len().min(other.len());
        for (dst, &src) in self.samples[..overlap].iter_mut().zip(other) {
            *dst = dst.saturating_add(src);
        }
        self.samples.extend_from_slice(&other[overlap..]);
    }
}

impl From<Vec<i16>> for AudioBuffer {
    fn from(samples: Vec<i16>) -> Self {
        Self::from_samples(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_into_empty_copies() {
        let mut buf = AudioBuffer::new();
        buf.mix_from(&[1, -2, 3]);
        assert_eq!(buf.samples(), &[1, -2, 3]);
    }

    #[test]
    fn test_mix_sums_and_extends() {
        let mut buf = AudioBuffer::from_samples(vec![10, 20]);
        buf.mix_from(&[1, 2, 3, 4]);
        assert_eq!(buf.samples(), &[11, 22, 3, 4]);
    }

    #[test]
    fn test_mix_saturates() {
        let mut buf = AudioBuffer::from_samples(vec![i16::MAX, i16::MIN]);
        buf.mix_from(&[100, -100]);
        assert_eq!(buf.samples(), &[i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_copy_from_replaces() {
        let mut buf = AudioBuffer::from_samples(vec![9, 9, 9]);
        buf.copy_from(&[1]);
        assert_eq!(buf.samples(), &[1]);
        buf.clear();
        assert!(buf.is_empty());
    }
}
