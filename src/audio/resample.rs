//! Channel mixing and sample-rate conversion to the 16 kHz mono format the
//! phrase detector and Whisper expect.
//!
//! cpal delivers audio in callback-sized buffers, so conversion is streaming:
//! [`Mono16k`] keeps the resampler position between chunks and the output
//! length tracks `input_len * 16000 / device_rate` over the whole phrase.

use super::capture::AudioChunk;
use super::SAMPLE_RATE;

/// Average interleaved channels into one.  A trailing partial frame is
/// dropped; zero channels yields nothing.
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    let n = channels as usize;
    match n {
        0 => Vec::new(),
        1 => samples.to_vec(),
        _ => samples
            .chunks_exact(n)
            .map(|frame| frame.iter().sum::<f32>() / n as f32)
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// StreamResampler
// ---------------------------------------------------------------------------

/// Linear-interpolation resampler that can be fed in pieces.
///
/// Good enough for speech recognition.  An output sample is produced once
/// both of its neighbouring input samples have arrived; the fractional read
/// position and the samples still needed carry over to the next call.
#[derive(Debug, Clone)]
pub struct StreamResampler {
    from: u32,
    to: u32,
    step: f64,
    /// Read position of the next output, relative to `pending[0]`.
    pos: f64,
    pending: Vec<f32>,
}

impl StreamResampler {
    pub fn new(from: u32, to: u32) -> Self {
        let step = if from == 0 || to == 0 {
            1.0
        } else {
            from as f64 / to as f64
        };
        Self {
            from,
            to,
            step,
            pos: 0.0,
            pending: Vec::new(),
        }
    }

    pub fn input_rate(&self) -> u32 {
        self.from
    }

    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.from == self.to || self.from == 0 || self.to == 0 {
            return input.to_vec();
        }

        self.pending.extend_from_slice(input);
        let mut out = Vec::with_capacity((input.len() as f64 / self.step) as usize + 1);

        while (self.pos as usize) + 1 < self.pending.len() {
            let idx = self.pos as usize;
            let frac = (self.pos - idx as f64) as f32;
            let (a, b) = (self.pending[idx], self.pending[idx + 1]);
            out.push(a + (b - a) * frac);
            self.pos += self.step;
        }

        let consumed = (self.pos as usize).min(self.pending.len());
        self.pending.drain(..consumed);
        self.pos -= consumed as f64;
        out
    }
}

// ---------------------------------------------------------------------------
// Mono16k
// ---------------------------------------------------------------------------

/// Converts a stream of capture chunks to 16 kHz mono.  One per capture.
#[derive(Debug, Default)]
pub struct Mono16k {
    resampler: Option<StreamResampler>,
}

impl Mono16k {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn convert(&mut self, chunk: &AudioChunk) -> Vec<f32> {
        let mono = downmix(&chunk.samples, chunk.channels);
        if self.resampler.as_ref().map(StreamResampler::input_rate) != Some(chunk.sample_rate) {
            log::debug!("capture: resampling {} Hz → {SAMPLE_RATE} Hz", chunk.sample_rate);
            self.resampler = Some(StreamResampler::new(chunk.sample_rate, SAMPLE_RATE));
        }
        self.resampler
            .get_or_insert_with(|| StreamResampler::new(chunk.sample_rate, SAMPLE_RATE))
            .process(&mono)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_stereo() {
        let out = downmix(&[0.5, -0.5, 0.2, 0.4], 2);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[1] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn downmix_edge_channel_counts() {
        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);
        assert!(downmix(&[0.1, 0.2], 0).is_empty());
        // 5 samples, 2 channels: last half-frame dropped.
        assert_eq!(downmix(&[0.0; 5], 2).len(), 2);
    }

    #[test]
    fn same_rate_is_identity() {
        let input = vec![0.1_f32; 160];
        assert_eq!(StreamResampler::new(16_000, 16_000).process(&input), input);
    }

    #[test]
    fn upsampling_interpolates_between_samples() {
        // 8 kHz → 16 kHz: odd outputs are midpoints.
        let out = StreamResampler::new(8_000, 16_000).process(&[0.0, 1.0, 0.0]);
        assert_eq!(out.len(), 4);
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert!((out[2] - 1.0).abs() < 1e-6);
        assert!((out[3] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn odd_sized_chunks_do_not_drift() {
        // 12 s at 44.1 kHz in 441-frame callbacks; per-chunk rounding would
        // add up to one sample per callback.
        let mut rs = StreamResampler::new(44_100, 16_000);
        let chunk = vec![0.25_f32; 441];
        let produced: usize = (0..1_200).map(|_| rs.process(&chunk).len()).sum();

        let expected = 1_200 * 441 * 16_000 / 44_100;
        assert!(produced.abs_diff(expected) <= 1, "{produced} vs {expected}");
    }

    #[test]
    fn chunked_output_matches_one_shot() {
        let signal: Vec<f32> = (0..4_800).map(|i| (i as f32 * 0.01).sin()).collect();
        let whole = StreamResampler::new(48_000, 16_000).process(&signal);

        let mut rs = StreamResampler::new(48_000, 16_000);
        let pieces: Vec<f32> = signal.chunks(457).flat_map(|c| rs.process(c)).collect();

        assert_eq!(pieces.len(), whole.len());
        for (a, b) in pieces.iter().zip(&whole) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn mono16k_combines_both_steps() {
        let chunk = AudioChunk {
            samples: vec![0.2_f32; 960], // 480 stereo frames @ 48 kHz
            sample_rate: 48_000,
            channels: 2,
        };
        let mut conv = Mono16k::new();
        let first = conv.convert(&chunk);
        let second = conv.convert(&chunk);
        assert_eq!(first.len() + second.len(), 320);
        assert!(first.iter().all(|s| (s - 0.2).abs() < 1e-6));
    }
}
