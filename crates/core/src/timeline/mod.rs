use std::{cell::Cell, fmt, path::Path, rc::Rc, sync::Arc, time::Instant};

use serde::{Deserialize, Serialize};

use crate::{audio::decode_file, DecodedAudio, Result, VisualizerError};

/// Monotonic clock of the audio engine, in seconds.
pub trait EngineClock {
    fn now(&self) -> f64;
}

/// Wall clock measured from construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::start()
    }
}

impl EngineClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for offline rendering and tests. Clones share the same
/// time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    time_seconds: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.time_seconds.set(0.0);
    }

    pub fn advance(&self, delta: f64) {
        self.time_seconds
            .set((self.time_seconds.get() + delta.max(0.0)).max(0.0));
    }
}

impl EngineClock for ManualClock {
    fn now(&self) -> f64 {
        self.time_seconds.get()
    }
}

/// Identifier of a single-use playback source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(pub u64);

/// Output side of the transport. Sources are single-use: every play or seek
/// starts a new one.
pub trait PlaybackBackend {
    fn start_source(
        &mut self,
        id: SourceId,
        media: &Arc<DecodedAudio>,
        offset: f64,
        now: f64,
    ) -> Result<()>;

    fn stop_source(&mut self, id: SourceId);

    /// Returns sources that reached the end of the media since the last call.
    fn drain_completed(&mut self, now: f64) -> Vec<SourceId>;
}

/// Backend that produces no sound and reports completion when a source's
/// scheduled end passes on the engine clock.
#[derive(Debug, Default)]
pub struct SilentBackend {
    running: Vec<(SourceId, f64)>,
}

impl SilentBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn running(&self) -> usize {
        self.running.len()
    }
}

impl PlaybackBackend for SilentBackend {
    fn start_source(
        &mut self,
        id: SourceId,
        media: &Arc<DecodedAudio>,
        offset: f64,
        now: f64,
    ) -> Result<()> {
        let remaining = (media.duration() - offset).max(0.0);
        self.running.push((id, now + remaining));
        Ok(())
    }

    fn stop_source(&mut self, id: SourceId) {
        self.running.retain(|(running, _)| *running != id);
    }

    fn drain_completed(&mut self, now: f64) -> Vec<SourceId> {
        let (done, running): (Vec<_>, Vec<_>) =
            self.running.drain(..).partition(|(_, end)| now >= *end);
        self.running = running;
        done.into_iter().map(|(id, _)| id).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Snapshot of the transport as seen by the display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportState {
    pub position: f64,
    pub is_playing: bool,
    pub total_duration: f64,
}

/// Play/pause/stop/seek state machine. The underlying source is recreated
/// from a stored offset on every play, so the position is derived from the
/// engine clock rather than from the source.
pub struct Transport {
    clock: Box<dyn EngineClock>,
    backend: Box<dyn PlaybackBackend>,
    media: Option<Arc<DecodedAudio>>,
    state: PlaybackState,
    reference_start: f64,
    pause_time: f64,
    active_source: Option<SourceId>,
    next_source: u64,
}

impl Transport {
    pub fn new(clock: Box<dyn EngineClock>, backend: Box<dyn PlaybackBackend>) -> Self {
        Self {
            clock,
            backend,
            media: None,
            state: PlaybackState::Stopped,
            reference_start: 0.0,
            pause_time: 0.0,
            active_source: None,
            next_source: 0,
        }
    }

    pub fn headless(clock: Box<dyn EngineClock>) -> Self {
        Self::new(clock, Box::new(SilentBackend::new()))
    }

    /// Decodes and loads a file. On failure the transport is left stopped
    /// with no media.
    pub fn open_path(&mut self, path: &Path) -> Result<Arc<DecodedAudio>> {
        self.close();
        let media = decode_file(path)?.into_shared();
        self.open(media.clone());
        Ok(media)
    }

    pub fn open(&mut self, media: Arc<DecodedAudio>) {
        self.close();
        tracing::info!(duration = media.duration(), "media loaded");
        self.media = Some(media);
    }

    pub fn close(&mut self) {
        self.stop();
        self.media = None;
    }

    pub fn media(&self) -> Option<&Arc<DecodedAudio>> {
        self.media.as_ref()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn duration(&self) -> f64 {
        self.media.as_ref().map(|m| m.duration()).unwrap_or(0.0)
    }

    pub fn active_source(&self) -> Option<SourceId> {
        self.active_source
    }

    /// Current playback position in seconds. While playing this is always
    /// derived from the engine clock, never cached.
    pub fn position(&self) -> f64 {
        match self.state {
            PlaybackState::Playing => {
                (self.clock.now() - self.reference_start).clamp(0.0, self.duration())
            }
            PlaybackState::Paused | PlaybackState::Stopped => self.pause_time,
        }
    }

    pub fn snapshot(&self) -> TransportState {
        TransportState {
            position: self.position(),
            is_playing: self.is_playing(),
            total_duration: self.duration(),
        }
    }

    pub fn play(&mut self) -> Result<()> {
        if self.state == PlaybackState::Playing {
            return Ok(());
        }

        let media = self.media.clone().ok_or(VisualizerError::NoMedia)?;
        let offset = self.pause_time;
        let now = self.clock.now();
        let id = SourceId(self.next_source);
        self.next_source += 1;

        self.backend.start_source(id, &media, offset, now)?;
        self.active_source = Some(id);
        self.reference_start = now - offset;
        self.state = PlaybackState::Playing;
        tracing::debug!(source = id.0, offset, "playback started");
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }

        self.pause_time = self.position();
        self.teardown_source();
        self.state = PlaybackState::Paused;
        tracing::debug!(position = self.pause_time, "playback paused");
    }

    pub fn stop(&mut self) {
        self.teardown_source();
        self.pause_time = 0.0;
        if self.state != PlaybackState::Stopped {
            tracing::debug!("playback stopped");
        }
        self.state = PlaybackState::Stopped;
    }

    /// Moves the playhead. Out-of-range targets are clamped.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        let target = if seconds.is_nan() {
            0.0
        } else {
            seconds.clamp(0.0, self.duration())
        };

        if self.state == PlaybackState::Playing {
            self.teardown_source();
            self.state = PlaybackState::Stopped;
            self.pause_time = target;
            self.play()
        } else {
            self.pause_time = target;
            Ok(())
        }
    }

    /// Handles end-of-media for `id`. Completions from sources that have
    /// already been replaced are ignored.
    pub fn handle_source_ended(&mut self, id: SourceId) {
        if self.active_source != Some(id) {
            tracing::debug!(source = id.0, "ignoring completion of stale source");
            return;
        }

        tracing::info!("playback reached end of media");
        self.active_source = None;
        self.pause_time = 0.0;
        self.state = PlaybackState::Stopped;
    }

    /// Processes completion notifications from the backend.
    pub fn poll(&mut self) {
        let now = self.clock.now();
        for id in self.backend.drain_completed(now) {
            self.handle_source_ended(id);
        }
    }

    fn teardown_source(&mut self) {
        if let Some(id) = self.active_source.take() {
            self.backend.stop_source(id);
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("state", &self.state)
            .field("duration", &self.duration())
            .field("reference_start", &self.reference_start)
            .field("pause_time", &self.pause_time)
            .field("active_source", &self.active_source)
            .finish()
    }
}
