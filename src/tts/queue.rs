//! Single-consumer speech output queue.
//!
//! Responses are pushed from the listen cycle and spoken one at a time, in
//! order, by a dedicated `speech-output` thread.  The worker runs until it
//! receives [`SpeechJob::Shutdown`].
//!
//! Status handling: every enqueue sets [`Status::Speaking`]; when the last
//! pending job finishes the worker moves `Speaking` back to `Idle`.
//! [`SpeechOutputQueue::stop`] cuts the current utterance short and moves
//! `Speaking` to `Idle` without touching jobs still waiting.  A listen cycle
//! in progress keeps its status.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use super::synth::SpeechSynthesizer;
use crate::pipeline::state::{Conversation, Status, StatusModel};

/// A unit of work for the speech worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechJob {
    Say { text: String, generation: u64 },
    /// Ends the worker loop.
    Shutdown,
}

struct Shared {
    synth: Arc<dyn SpeechSynthesizer>,
    status: StatusModel,
    history: Conversation,
    speaker: String,
    /// Jobs sent but not yet finished.  Held only while updating status.
    pending: Mutex<usize>,
    /// Jobs tagged with an older generation are skipped.
    generation: AtomicU64,
}

impl Shared {
    fn finish_job(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.status.transition(Status::Speaking, Status::Idle);
        }
    }
}

/// Handle to the speech worker.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use loki_assistant::pipeline::{Conversation, StatusModel};
/// use loki_assistant::tts::{SilentSynthesizer, SpeechOutputQueue};
///
/// let queue = SpeechOutputQueue::start(
///     Arc::new(SilentSynthesizer),
///     StatusModel::new(),
///     Conversation::new(),
///     "Loki",
/// )
/// .unwrap();
/// queue.enqueue("Hello.");
/// queue.shutdown();
/// ```
pub struct SpeechOutputQueue {
    tx: Sender<SpeechJob>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SpeechOutputQueue {
    /// Spawn the worker thread.  Worker errors are appended to `history`
    /// under `speaker`.
    pub fn start(
        synth: Arc<dyn SpeechSynthesizer>,
        status: StatusModel,
        history: Conversation,
        speaker: impl Into<String>,
    ) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            synth,
            status,
            history,
            speaker: speaker.into(),
            pending: Mutex::new(0),
            generation: AtomicU64::new(0),
        });

        let (tx, rx) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name("speech-output".into())
            .spawn({
                let shared = Arc::clone(&shared);
                move || run_worker(rx, shared)
            })?;

        Ok(Self {
            tx,
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue `text` for speech.  Never blocks.  Returns `false` when the text
    /// is blank or the worker has shut down.
    pub fn enqueue(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text.trim().is_empty() {
            return false;
        }

        let generation = self.shared.generation.load(Ordering::Acquire);
        let mut pending = self
            .shared
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.tx.send(SpeechJob::Say { text, generation }).is_err() {
            log::warn!("speech: worker is gone, dropping utterance");
            return false;
        }
        *pending += 1;
        self.shared.status.set(Status::Speaking);
        true
    }

    /// Interrupt the utterance being spoken.  Queued jobs still play.
    pub fn stop(&self) {
        match self.shared.synth.stop() {
            Ok(()) => {
                self.shared.status.transition(Status::Speaking, Status::Idle);
            }
            Err(e) => {
                log::warn!("speech: stop failed: {e}");
                self.shared
                    .history
                    .push(&self.shared.speaker, format!("Unable to stop speech: {e}"));
            }
        }
    }

    /// Drop every job queued but not yet started.
    pub fn flush(&self) {
        let previous = self.shared.generation.fetch_add(1, Ordering::AcqRel);
        log::debug!("speech: flushed generation {previous}");
    }

    /// Jobs queued or playing.
    pub fn pending(&self) -> usize {
        *self
            .shared
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Send the shutdown sentinel and wait for the worker to exit.  Jobs
    /// queued before the sentinel are still spoken.  Idempotent.
    pub fn shutdown(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            let _ = self.tx.send(SpeechJob::Shutdown);
            if handle.join().is_err() {
                log::error!("speech: worker panicked");
            }
            log::info!("speech: worker stopped");
        }
    }
}

impl Drop for SpeechOutputQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(rx: Receiver<SpeechJob>, shared: Arc<Shared>) {
    log::debug!("speech: worker started");

    while let Ok(job) = rx.recv() {
        let (text, generation) = match job {
            SpeechJob::Say { text, generation } => (text, generation),
            SpeechJob::Shutdown => break,
        };

        if generation < shared.generation.load(Ordering::Acquire) {
            log::debug!("speech: skipping flushed job");
            shared.finish_job();
            continue;
        }

        // A stop() may have reset status while this job was waiting.
        shared.status.transition(Status::Idle, Status::Speaking);

        if let Err(e) = shared.synth.speak(&text) {
            log::warn!("speech: {e}");
            shared
                .history
                .push(&shared.speaker, format!("Speech error: {e}"));
        }
        shared.finish_job();
    }

    log::debug!("speech: worker exiting");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::tts::SpeechError;

    /// Records utterances; optionally blocks each one until released.
    #[derive(Default)]
    struct RecordingSynth {
        spoken: Mutex<Vec<String>>,
        hold: AtomicBool,
        stops: Mutex<usize>,
        fail_on: Option<&'static str>,
    }

    impl SpeechSynthesizer for RecordingSynth {
        fn speak(&self, text: &str) -> Result<(), SpeechError> {
            self.spoken.lock().unwrap().push(text.to_string());
            while self.hold.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(5));
            }
            if self.fail_on == Some(text) {
                return Err(SpeechError::EmptyCommand);
            }
            Ok(())
        }

        fn stop(&self) -> Result<(), SpeechError> {
            *self.stops.lock().unwrap() += 1;
            self.hold.store(false, Ordering::Release);
            Ok(())
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in time");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn start(synth: Arc<RecordingSynth>) -> (SpeechOutputQueue, StatusModel, Conversation) {
        let status = StatusModel::new();
        let history = Conversation::new();
        let queue =
            SpeechOutputQueue::start(synth, status.clone(), history.clone(), "Loki").unwrap();
        (queue, status, history)
    }

    #[test]
    fn jobs_are_spoken_in_fifo_order() {
        let synth = Arc::new(RecordingSynth::default());
        let (queue, _, _) = start(Arc::clone(&synth));

        queue.enqueue("A");
        std::thread::sleep(Duration::from_millis(20));
        queue.enqueue("B");
        queue.enqueue("C");
        queue.shutdown();

        assert_eq!(*synth.spoken.lock().unwrap(), ["A", "B", "C"]);
    }

    #[test]
    fn status_is_speaking_until_last_job_finishes() {
        let synth = Arc::new(RecordingSynth::default());
        synth.hold.store(true, Ordering::Release);
        let (queue, status, _) = start(Arc::clone(&synth));

        queue.enqueue("Opening notepad.");
        assert_eq!(status.get(), Status::Speaking);
        wait_until(|| synth.spoken.lock().unwrap().len() == 1);
        assert_eq!(status.get(), Status::Speaking);

        synth.hold.store(false, Ordering::Release);
        wait_until(|| status.get() == Status::Idle);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn stop_interrupts_current_job_only() {
        let synth = Arc::new(RecordingSynth::default());
        synth.hold.store(true, Ordering::Release);
        let (queue, status, _) = start(Arc::clone(&synth));

        queue.enqueue("first");
        queue.enqueue("second");
        wait_until(|| synth.spoken.lock().unwrap().len() == 1);

        queue.stop();
        assert_eq!(*synth.stops.lock().unwrap(), 1);

        queue.shutdown();
        assert_eq!(*synth.spoken.lock().unwrap(), ["first", "second"]);
        assert_eq!(status.get(), Status::Idle);
    }

    #[test]
    fn stop_leaves_a_running_cycle_alone() {
        let synth = Arc::new(RecordingSynth::default());
        let (queue, status, _) = start(Arc::clone(&synth));

        for current in [Status::Listening, Status::Thinking] {
            status.set(current);
            queue.stop();
            assert_eq!(status.get(), current);
        }
        assert_eq!(*synth.stops.lock().unwrap(), 2);
    }

    #[test]
    fn flush_discards_jobs_not_yet_started() {
        let synth = Arc::new(RecordingSynth::default());
        synth.hold.store(true, Ordering::Release);
        let (queue, status, _) = start(Arc::clone(&synth));

        queue.enqueue("playing");
        wait_until(|| synth.spoken.lock().unwrap().len() == 1);
        queue.enqueue("stale 1");
        queue.enqueue("stale 2");
        queue.flush();
        queue.enqueue("fresh");

        synth.hold.store(false, Ordering::Release);
        queue.shutdown();

        assert_eq!(*synth.spoken.lock().unwrap(), ["playing", "fresh"]);
        assert_eq!(status.get(), Status::Idle);
    }

    #[test]
    fn speech_errors_are_logged_to_history() {
        let synth = Arc::new(RecordingSynth {
            fail_on: Some("bad"),
            ..RecordingSynth::default()
        });
        let (queue, status, history) = start(synth);

        queue.enqueue("bad");
        queue.enqueue("good");
        queue.shutdown();

        let last = history.last().unwrap();
        assert_eq!(last.speaker, "Loki");
        assert_eq!(last.text, "Speech error: no speech command configured");
        assert_eq!(history.len(), 1);
        assert_eq!(status.get(), Status::Idle);
    }

    #[test]
    fn blank_text_is_not_queued() {
        let synth = Arc::new(RecordingSynth::default());
        let (queue, status, _) = start(Arc::clone(&synth));

        assert!(!queue.enqueue("   "));
        assert_eq!(status.get(), Status::Idle);
        queue.shutdown();
        assert!(synth.spoken.lock().unwrap().is_empty());
    }

    #[test]
    fn enqueue_after_shutdown_is_rejected() {
        let (queue, status, _) = start(Arc::new(RecordingSynth::default()));
        queue.shutdown();
        queue.shutdown();

        assert!(!queue.enqueue("too late"));
        assert_eq!(status.get(), Status::Idle);
    }
}
