//! Energy-based voice activity detection.
//!
//! A frame counts as voice when its RMS amplitude exceeds a threshold.  The
//! threshold is derived from a short sample of room noise taken before each
//! listen, never dropping below a configured floor.

/// Ambient RMS is multiplied by this to get the speech threshold.
const AMBIENT_MARGIN: f32 = 1.5;

/// RMS threshold classifier.
///
/// ```rust
/// use loki_assistant::audio::VadDetector;
///
/// // Quiet room (ambient RMS 0.002), floor 0.01 → floor wins.
/// let vad = VadDetector::calibrated(0.002, 0.01);
/// assert!(!vad.is_voice(&[0.005; 480]));
/// assert!(vad.is_voice(&[0.5; 480]));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadDetector {
    rms_threshold: f32,
}

impl VadDetector {
    pub fn new(rms_threshold: f32) -> Self {
        Self { rms_threshold }
    }

    /// Threshold from measured room noise: `max(floor, ambient × 1.5)`.
    pub fn calibrated(ambient_rms: f32, floor: f32) -> Self {
        Self::new((ambient_rms * AMBIENT_MARGIN).max(floor))
    }

    pub fn threshold(&self) -> f32 {
        self.rms_threshold
    }

    pub fn is_voice(&self, frame: &[f32]) -> bool {
        !frame.is_empty() && rms(frame) > self.rms_threshold
    }
}

/// Root-mean-square amplitude; `0.0` for an empty frame.
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_constant_signal_is_its_magnitude() {
        assert!((rms(&[0.5; 100]) - 0.5).abs() < 1e-6);
        assert!((rms(&[-0.5; 100]) - 0.5).abs() < 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn calibration_respects_floor() {
        assert_eq!(VadDetector::calibrated(0.0, 0.01).threshold(), 0.01);
        let noisy = VadDetector::calibrated(0.1, 0.01);
        assert!((noisy.threshold() - 0.15).abs() < 1e-6);
    }

    #[test]
    fn empty_frame_is_silence() {
        assert!(!VadDetector::new(0.0).is_voice(&[]));
    }

    #[test]
    fn noisy_room_raises_threshold() {
        let vad = VadDetector::calibrated(0.1, 0.01);
        // Loud enough for a quiet room, not for this one.
        assert!(!vad.is_voice(&[0.12; 480]));
        assert!(vad.is_voice(&[0.3; 480]));
    }
}
