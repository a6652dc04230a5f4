//! Phrase segmentation for a single listen.
//!
//! [`PhraseDetector`] consumes 16 kHz mono samples in arbitrary chunk sizes
//! and works on fixed 30 ms frames:
//!
//! ```text
//! Calibrating ──(calibration elapsed)──► Waiting ──(voice frame)──► Speaking
//!                                           │                          │
//!                                  (timeout elapsed)       (silence hang | phrase limit)
//!                                           ▼                          ▼
//!                                       TimedOut                  Complete(audio)
//! ```
//!
//! A short pre-roll of the frames heard just before speech started is kept
//! so the first syllable is not clipped.

use std::collections::VecDeque;
use std::time::Duration;

use super::vad::{rms, VadDetector};
use super::{AudioSample, SAMPLE_RATE};
use crate::config::AudioConfig;

/// 30 ms at 16 kHz.
pub const FRAME_LEN: usize = 480;

const PRE_ROLL: Duration = Duration::from_millis(300);

// ---------------------------------------------------------------------------
// PhraseParams
// ---------------------------------------------------------------------------

/// Timing and level settings for one listen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhraseParams {
    /// Room-noise sampling before the timeout starts counting.
    pub calibration: Duration,
    /// Maximum wait for speech to begin.
    pub timeout: Duration,
    /// Maximum length of one phrase once speech has begun.
    pub phrase_limit: Duration,
    /// Trailing silence that ends a phrase.
    pub silence_hang: Duration,
    /// Lowest RMS threshold calibration may settle on.
    pub energy_floor: f32,
}

impl PhraseParams {
    pub fn from_config(audio: &AudioConfig, timeout: Duration, phrase_limit: Duration) -> Self {
        Self {
            calibration: secs(audio.ambient_calibration_secs),
            timeout,
            phrase_limit,
            silence_hang: secs(audio.silence_hang_secs),
            energy_floor: audio.energy_floor,
        }
    }

    /// Upper bound on how long a listen with these settings can run.
    pub fn max_duration(&self) -> Duration {
        self.calibration + self.timeout + self.phrase_limit
    }
}

fn secs(value: f32) -> Duration {
    Duration::try_from_secs_f32(value.max(0.0)).unwrap_or_default()
}

fn frames_in(d: Duration) -> usize {
    (d.as_secs_f64() * SAMPLE_RATE as f64 / FRAME_LEN as f64).ceil() as usize
}

// ---------------------------------------------------------------------------
// PhraseDetector
// ---------------------------------------------------------------------------

/// Result of feeding samples to a [`PhraseDetector`].
#[derive(Debug, Clone, PartialEq)]
pub enum PhraseEvent {
    /// Need more audio.
    Pending,
    /// Speech began and ended; the captured phrase including pre-roll.
    Complete(AudioSample),
    /// No speech started within the timeout.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Calibrating { frames: usize, energy: f32 },
    Waiting { frames: usize },
    Speaking { silent_frames: usize },
    Finished,
}

/// Incremental speech start/end detector.
///
/// ```rust
/// use std::time::Duration;
/// use loki_assistant::audio::{PhraseDetector, PhraseEvent, PhraseParams};
///
/// let mut detector = PhraseDetector::new(PhraseParams {
///     calibration: Duration::ZERO,
///     timeout: Duration::from_millis(300),
///     phrase_limit: Duration::from_secs(5),
///     silence_hang: Duration::from_millis(300),
///     energy_floor: 0.01,
/// });
///
/// assert_eq!(detector.push(&vec![0.0; 16_000]), PhraseEvent::TimedOut);
/// ```
pub struct PhraseDetector {
    vad: VadDetector,
    phase: Phase,
    energy_floor: f32,
    calibration_frames: usize,
    timeout_frames: usize,
    limit_samples: usize,
    hang_frames: usize,
    pre_roll_frames: usize,
    partial: Vec<f32>,
    pre_roll: VecDeque<Vec<f32>>,
    phrase: Vec<f32>,
}

impl PhraseDetector {
    pub fn new(params: PhraseParams) -> Self {
        let calibration_frames = frames_in(params.calibration);
        let phase = if calibration_frames == 0 {
            Phase::Waiting { frames: 0 }
        } else {
            Phase::Calibrating {
                frames: 0,
                energy: 0.0,
            }
        };

        Self {
            vad: VadDetector::new(params.energy_floor),
            phase,
            energy_floor: params.energy_floor,
            calibration_frames,
            timeout_frames: frames_in(params.timeout).max(1),
            limit_samples: frames_in(params.phrase_limit).max(1) * FRAME_LEN,
            hang_frames: frames_in(params.silence_hang).max(1),
            pre_roll_frames: frames_in(PRE_ROLL),
            partial: Vec::with_capacity(FRAME_LEN),
            pre_roll: VecDeque::new(),
            phrase: Vec::new(),
        }
    }

    /// Threshold currently in use.
    pub fn threshold(&self) -> f32 {
        self.vad.threshold()
    }

    /// Feed 16 kHz mono samples.  After a non-pending event the detector is
    /// finished and further input is ignored.
    pub fn push(&mut self, samples: &[f32]) -> PhraseEvent {
        if self.phase == Phase::Finished {
            return PhraseEvent::Pending;
        }

        self.partial.extend_from_slice(samples);
        let mut offset = 0;
        while self.partial.len() - offset >= FRAME_LEN {
            let frame = self.partial[offset..offset + FRAME_LEN].to_vec();
            offset += FRAME_LEN;
            if let Some(event) = self.step(frame) {
                self.partial.clear();
                self.phase = Phase::Finished;
                return event;
            }
        }
        self.partial.drain(..offset);
        PhraseEvent::Pending
    }

    fn step(&mut self, frame: Vec<f32>) -> Option<PhraseEvent> {
        match self.phase {
            Phase::Calibrating { frames, energy } => {
                let frames = frames + 1;
                let energy = energy + rms(&frame);
                if frames >= self.calibration_frames {
                    let ambient = energy / frames as f32;
                    self.vad = VadDetector::calibrated(ambient, self.energy_floor);
                    log::debug!(
                        "capture: ambient rms {ambient:.4}, threshold {:.4}",
                        self.vad.threshold()
                    );
                    self.phase = Phase::Waiting { frames: 0 };
                } else {
                    self.phase = Phase::Calibrating { frames, energy };
                }
                None
            }
            Phase::Waiting { frames } => {
                if self.vad.is_voice(&frame) {
                    self.phrase = self.pre_roll.drain(..).flatten().collect();
                    self.phrase.extend_from_slice(&frame);
                    self.phase = Phase::Speaking { silent_frames: 0 };
                    return self.check_limit();
                }

                self.pre_roll.push_back(frame);
                if self.pre_roll.len() > self.pre_roll_frames {
                    self.pre_roll.pop_front();
                }

                let frames = frames + 1;
                if frames >= self.timeout_frames {
                    return Some(PhraseEvent::TimedOut);
                }
                self.phase = Phase::Waiting { frames };
                None
            }
            Phase::Speaking { silent_frames } => {
                let silent_frames = if self.vad.is_voice(&frame) {
                    0
                } else {
                    silent_frames + 1
                };
                self.phrase.extend_from_slice(&frame);

                if silent_frames >= self.hang_frames {
                    return Some(self.complete());
                }
                self.phase = Phase::Speaking { silent_frames };
                self.check_limit()
            }
            Phase::Finished => None,
        }
    }

    fn check_limit(&mut self) -> Option<PhraseEvent> {
        (self.phrase.len() >= self.limit_samples).then(|| self.complete())
    }

    fn complete(&mut self) -> PhraseEvent {
        PhraseEvent::Complete(AudioSample::new(std::mem::take(&mut self.phrase)))
    }
}
