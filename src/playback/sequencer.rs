//! Serializes synthesized chunks into ordered playback.
//!
//! Synthesis finishes out of order, so chunks are staged by sequence number
//! and started strictly in order; at most one chunk is ever playing or
//! paused.  A generation counter fences off stale work: `stop` bumps it,
//! and chunks synthesized for an earlier generation are discarded on
//! arrival instead of being played into the new response.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc;

use super::decode::DecodedAudio;
use super::output::{AudioOutput, PlaybackEvent, PlaybackHandle};

/// Playback status reported to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Stopped,
    Playing,
    Paused,
}

pub struct PlaybackSequencer {
    output: Arc<dyn AudioOutput>,
    events_tx: mpsc::Sender<PlaybackEvent>,
    /// Chunks staged by sequence number; `None` marks a chunk whose
    /// synthesis failed so playback can step over it.
    pending: BTreeMap<u64, Option<DecodedAudio>>,
    /// Next sequence number eligible to play.
    next_seq: u64,
    current: Option<Arc<dyn PlaybackHandle>>,
    current_token: u64,
    token_counter: u64,
    generation: u64,
    paused: bool,
}

impl PlaybackSequencer {
    pub fn new(output: Arc<dyn AudioOutput>, events_tx: mpsc::Sender<PlaybackEvent>) -> Self {
        Self {
            output,
            events_tx,
            pending: BTreeMap::new(),
            next_seq: 0,
            current: None,
            current_token: 0,
            token_counter: 0,
            generation: 0,
            paused: false,
        }
    }

    /// Generation to stamp on synthesis work spawned right now.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> PlaybackStatus {
        if self.current.is_some() {
            if self.paused {
                PlaybackStatus::Paused
            } else {
                PlaybackStatus::Playing
            }
        } else {
            PlaybackStatus::Stopped
        }
    }

    /// Stage a decoded chunk.  Chunks from a superseded generation are
    /// dropped silently.
    pub async fn enqueue(&mut self, generation: u64, seq: u64, audio: DecodedAudio) {
        if generation != self.generation {
            debug!("discarding stale chunk {seq} (generation {generation})");
            return;
        }
        self.pending.insert(seq, Some(audio));
        self.try_start().await;
    }

    /// Record that chunk `seq` will never arrive so playback can skip it.
    pub async fn mark_failed(&mut self, generation: u64, seq: u64) {
        if generation != self.generation {
            return;
        }
        warn!("chunk {seq} failed to synthesize, skipping");
        self.pending.insert(seq, None);
        self.try_start().await;
    }

    /// Feed back a playback lifecycle event.
    pub async fn handle_event(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Started { token } => {
                debug!("chunk playback started (token {token})");
            }
            PlaybackEvent::Ended { token } | PlaybackEvent::Failed { token, .. }
                if token == self.current_token && self.current.is_some() =>
            {
                if let PlaybackEvent::Failed { reason, .. } = &event {
                    warn!("chunk playback failed: {reason}");
                }
                self.current = None;
                self.try_start().await;
            }
            // Event from a chunk that was already stopped or superseded.
            PlaybackEvent::Ended { token } | PlaybackEvent::Failed { token, .. } => {
                debug!("ignoring stale playback event (token {token})");
            }
        }
    }

    /// Pause the current chunk and hold the queue.  No-op while nothing is
    /// playing.
    pub fn pause(&mut self) {
        if let Some(handle) = &self.current {
            self.paused = true;
            handle.pause();
        }
    }

    /// Resume the current chunk, or start the next one if between chunks.
    pub async fn resume(&mut self) {
        self.paused = false;
        match &self.current {
            Some(handle) => handle.resume(),
            None => self.try_start().await,
        }
    }

    /// Stop everything and fence off in-flight synthesis for the old
    /// response.  The sequencer is immediately ready for a new response
    /// starting at sequence 0.
    pub fn stop(&mut self) {
        self.generation += 1;
        self.pending.clear();
        self.next_seq = 0;
        self.paused = false;
        if let Some(handle) = self.current.take() {
            handle.stop();
        }
    }

    /// Fast-forward the current chunk; its natural Ended event then
    /// advances the queue as usual.
    pub fn skip_to_end(&mut self) {
        self.paused = false;
        if let Some(handle) = &self.current {
            handle.skip_to_end();
        }
    }

    async fn try_start(&mut self) {
        while self.current.is_none() && !self.paused {
            let Some(slot) = self.pending.remove(&self.next_seq) else {
                return;
            };
            self.next_seq += 1;

            let Some(audio) = slot else {
                continue; // failed chunk, step over it
            };

            self.token_counter += 1;
            let token = self.token_counter;
            match self
                .output
                .play(audio, token, self.events_tx.clone())
                .await
            {
                Ok(handle) => {
                    self.current = Some(handle);
                    self.current_token = token;
                }
                Err(e) => {
                    warn!("failed to start chunk playback: {e}");
                    // fall through and try the next chunk
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::output::PlaybackError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn audio(marker: u32) -> DecodedAudio {
        DecodedAudio {
            samples: vec![0.0; marker as usize],
            sample_rate: 22050,
            channels: 1,
        }
    }

    #[derive(Default)]
    struct FakeHandle {
        pauses: AtomicU32,
        resumes: AtomicU32,
        stops: AtomicU32,
        skips: AtomicU32,
    }

    impl PlaybackHandle for FakeHandle {
        fn pause(&self) {
            self.pauses.fetch_add(1, Ordering::Relaxed);
        }
        fn resume(&self) {
            self.resumes.fetch_add(1, Ordering::Relaxed);
        }
        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::Relaxed);
        }
        fn skip_to_end(&self) {
            self.skips.fetch_add(1, Ordering::Relaxed);
        }
        fn is_paused(&self) -> bool {
            false
        }
    }

    /// Records play calls; playback never ends on its own, tests feed
    /// `Ended` events back by hand.
    #[derive(Default)]
    struct FakeOutput {
        // (token, sample count used as a chunk marker)
        plays: Mutex<Vec<(u64, usize)>>,
        handles: Mutex<Vec<Arc<FakeHandle>>>,
    }

    impl FakeOutput {
        fn play_markers(&self) -> Vec<usize> {
            self.plays.lock().unwrap().iter().map(|p| p.1).collect()
        }

        fn last_token(&self) -> u64 {
            self.plays.lock().unwrap().last().expect("no plays").0
        }

        fn last_handle(&self) -> Arc<FakeHandle> {
            Arc::clone(self.handles.lock().unwrap().last().expect("no handles"))
        }
    }

    #[async_trait]
    impl AudioOutput for FakeOutput {
        async fn play(
            &self,
            audio: DecodedAudio,
            token: u64,
            _events: mpsc::Sender<PlaybackEvent>,
        ) -> Result<Arc<dyn PlaybackHandle>, PlaybackError> {
            self.plays.lock().unwrap().push((token, audio.samples.len()));
            let handle = Arc::new(FakeHandle::default());
            self.handles.lock().unwrap().push(Arc::clone(&handle));
            Ok(handle)
        }
    }

    fn sequencer() -> (PlaybackSequencer, Arc<FakeOutput>) {
        let output = Arc::new(FakeOutput::default());
        let (tx, _rx) = mpsc::channel(16);
        (
            PlaybackSequencer::new(Arc::clone(&output) as Arc<dyn AudioOutput>, tx),
            output,
        )
    }

    #[tokio::test]
    async fn chunks_play_in_sequence_order() {
        let (mut seq, output) = sequencer();
        let generation = seq.generation();

        // Chunk 1 arrives before chunk 0; nothing may play yet.
        seq.enqueue(generation, 1, audio(11)).await;
        assert!(output.play_markers().is_empty());

        seq.enqueue(generation, 0, audio(10)).await;
        assert_eq!(output.play_markers(), vec![10]);

        let token = output.last_token();
        seq.handle_event(PlaybackEvent::Ended { token }).await;
        assert_eq!(output.play_markers(), vec![10, 11]);
    }

    #[tokio::test]
    async fn at_most_one_chunk_is_active() {
        let (mut seq, output) = sequencer();
        let generation = seq.generation();

        seq.enqueue(generation, 0, audio(10)).await;
        seq.enqueue(generation, 1, audio(11)).await;
        seq.enqueue(generation, 2, audio(12)).await;

        // Only the first chunk started; the rest wait for Ended.
        assert_eq!(output.play_markers(), vec![10]);
        assert_eq!(seq.status(), PlaybackStatus::Playing);
    }

    #[tokio::test]
    async fn stop_discards_queue_and_stale_chunks() {
        let (mut seq, output) = sequencer();
        let old_generation = seq.generation();

        seq.enqueue(old_generation, 0, audio(10)).await;
        seq.enqueue(old_generation, 1, audio(11)).await;
        seq.stop();

        assert_eq!(seq.status(), PlaybackStatus::Stopped);
        assert_eq!(output.last_handle().stops.load(Ordering::Relaxed), 1);

        // A chunk synthesized for the old response arrives late.
        seq.enqueue(old_generation, 2, audio(12)).await;
        assert_eq!(output.play_markers(), vec![10]);

        // The new response starts again at sequence 0.
        seq.enqueue(seq.generation(), 0, audio(20)).await;
        assert_eq!(output.play_markers(), vec![10, 20]);
    }

    #[tokio::test]
    async fn stale_ended_event_is_ignored_after_stop() {
        let (mut seq, output) = sequencer();
        let generation = seq.generation();

        seq.enqueue(generation, 0, audio(10)).await;
        let token = output.last_token();
        seq.stop();

        seq.enqueue(seq.generation(), 0, audio(20)).await;
        let new_token = output.last_token();

        // Late Ended from the stopped chunk must not end the new one.
        seq.handle_event(PlaybackEvent::Ended { token }).await;
        assert_eq!(seq.status(), PlaybackStatus::Playing);

        seq.handle_event(PlaybackEvent::Ended { token: new_token }).await;
        assert_eq!(seq.status(), PlaybackStatus::Stopped);
    }

    #[tokio::test]
    async fn failed_synthesis_is_stepped_over() {
        let (mut seq, output) = sequencer();
        let generation = seq.generation();

        seq.mark_failed(generation, 0).await;
        seq.enqueue(generation, 1, audio(11)).await;

        // Chunk 0 never arrives; chunk 1 plays anyway.
        assert_eq!(output.play_markers(), vec![11]);
    }

    #[tokio::test]
    async fn playback_failure_advances_to_next_chunk() {
        let (mut seq, output) = sequencer();
        let generation = seq.generation();

        seq.enqueue(generation, 0, audio(10)).await;
        seq.enqueue(generation, 1, audio(11)).await;

        let token = output.last_token();
        seq.handle_event(PlaybackEvent::Failed {
            token,
            reason: "device gone".into(),
        })
        .await;

        assert_eq!(output.play_markers(), vec![10, 11]);
    }

    #[tokio::test]
    async fn pause_without_active_chunk_is_a_noop() {
        let (mut seq, output) = sequencer();
        let generation = seq.generation();

        seq.pause();
        assert_eq!(seq.status(), PlaybackStatus::Stopped);

        // Not held back by the earlier pause.
        seq.enqueue(generation, 0, audio(10)).await;
        assert_eq!(output.play_markers(), vec![10]);
        assert_eq!(seq.status(), PlaybackStatus::Playing);
    }

    #[tokio::test]
    async fn pause_holds_the_queue_across_chunk_boundaries() {
        let (mut seq, output) = sequencer();
        let generation = seq.generation();

        seq.enqueue(generation, 0, audio(10)).await;
        seq.enqueue(generation, 1, audio(11)).await;
        seq.pause();

        // The current chunk ends while paused; the next one must wait.
        let token = output.last_token();
        seq.handle_event(PlaybackEvent::Ended { token }).await;
        assert_eq!(output.play_markers(), vec![10]);

        seq.resume().await;
        assert_eq!(output.play_markers(), vec![10, 11]);
    }

    #[tokio::test]
    async fn pause_and_resume_forward_to_current_handle() {
        let (mut seq, output) = sequencer();
        let generation = seq.generation();

        seq.enqueue(generation, 0, audio(10)).await;
        seq.pause();
        assert_eq!(seq.status(), PlaybackStatus::Paused);
        assert_eq!(output.last_handle().pauses.load(Ordering::Relaxed), 1);

        seq.resume().await;
        assert_eq!(seq.status(), PlaybackStatus::Playing);
        assert_eq!(output.last_handle().resumes.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn skip_to_end_only_fast_forwards_the_current_chunk() {
        let (mut seq, output) = sequencer();
        let generation = seq.generation();

        seq.enqueue(generation, 0, audio(10)).await;
        seq.enqueue(generation, 1, audio(11)).await;
        seq.skip_to_end();

        assert_eq!(output.last_handle().skips.load(Ordering::Relaxed), 1);

        // The skipped chunk's natural Ended advances the queue.
        let token = output.last_token();
        seq.handle_event(PlaybackEvent::Ended { token }).await;
        assert_eq!(output.play_markers(), vec![10, 11]);
        assert_eq!(seq.status(), PlaybackStatus::Playing);
    }
}
