//! Encoded output frames.

/// Which of the two output streams a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Waveform,
    Fft,
}

impl StreamKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Waveform => "waveform",
            Self::Fft => "fft",
        }
    }
}

/// One `capture_size`-byte visualizer frame.
///
/// The waveform and FFT frames derived from the same delivery share a
/// `sequence` number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub kind: StreamKind,
    pub sequence: u64,
    /// Informational, copied from the pipeline configuration.
    pub sampling_rate: u32,
    data: Vec<i8>,
}

impl EncodedFrame {
    pub fn new(kind: StreamKind, sequence: u64, sampling_rate: u32, data: Vec<i8>) -> Self {
        Self {
            kind,
            sequence,
            sampling_rate,
            data,
        }
    }

    pub fn data(&self) -> &[i8] {
        &self.data
    }

    /// The same payload reinterpreted as raw bytes, for byte-oriented transports.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.iter().map(|&b| b as u8).collect()
    }

    pub fn into_inner(self) -> Vec<i8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_bytes_is_twos_complement() {
        let frame = EncodedFrame::new(StreamKind::Fft, 0, 48000, vec![0, 127, -1, -128]);
        assert_eq!(frame.to_bytes(), vec![0u8, 127, 255, 128]);
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.into_inner(), vec![0, 127, -1, -128]);
    }
}
