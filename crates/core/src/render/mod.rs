//! Drives the live visualization from the transport.
//!
//! The scheduler owns exactly one live renderer. Each display tick it pulls
//! raw samples from the analysis tap, builds an [`AnalysisFrame`], advances
//! the hue session and hands the frame to the renderer. Switching renderers
//! drops the loop handle before anything else so no tick can reach a
//! destroyed instance.

use std::{collections::BTreeMap, fmt};

use crate::{
    visual::{
        BuildContext, CameraControls, Cosmic, Holiday2d, Holiday3d, Particles, Psychedelic,
        Rectangular, Spectrum, Sunburst, SurfaceProvider, TickContext, Visualization,
        VisualizationKind, Waveform,
    },
    AnalysisTap, FeatureExtractor, HueTracker, Options, Result, SourceClassifier, Transport,
    VisualizerError,
};

/// Nominal display interval used for the first tick of a session.
const NOMINAL_DT: f64 = 1.0 / 60.0;

type Factory =
    Box<dyn Fn(&mut dyn SurfaceProvider, &BuildContext) -> Result<Box<dyn Visualization>>>;

/// Maps renderer identifiers to their constructors.
#[derive(Default)]
pub struct VisualizationRegistry {
    factories: BTreeMap<VisualizationKind, Factory>,
}

impl VisualizationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in renderer.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(VisualizationKind::Spectrum, |s, c| boxed(Spectrum::new(s, c)));
        registry.register(VisualizationKind::Waveform, |s, c| boxed(Waveform::new(s, c)));
        registry.register(VisualizationKind::Particles, |s, c| boxed(Particles::new(s, c)));
        registry.register(VisualizationKind::Cosmic, |s, c| boxed(Cosmic::new(s, c)));
        registry.register(VisualizationKind::Psychedelic, |s, c| boxed(Psychedelic::new(s, c)));
        registry.register(VisualizationKind::Sunburst, |s, c| boxed(Sunburst::new(s, c)));
        registry.register(VisualizationKind::Rectangular, |s, c| boxed(Rectangular::new(s, c)));
        registry.register(VisualizationKind::Holiday2d, |s, c| boxed(Holiday2d::new(s, c)));
        registry.register(VisualizationKind::Holiday3d, |s, c| boxed(Holiday3d::new(s, c)));
        registry
    }

    /// Adds or replaces the constructor for `kind`.
    pub fn register<F>(&mut self, kind: VisualizationKind, factory: F)
    where
        F: Fn(&mut dyn SurfaceProvider, &BuildContext) -> Result<Box<dyn Visualization>> + 'static,
    {
        self.factories.insert(kind, Box::new(factory));
    }

    pub fn kinds(&self) -> impl Iterator<Item = VisualizationKind> + '_ {
        self.factories.keys().copied()
    }

    pub fn build(
        &self,
        kind: VisualizationKind,
        surfaces: &mut dyn SurfaceProvider,
        ctx: &BuildContext,
    ) -> Result<Box<dyn Visualization>> {
        let factory = self
            .factories
            .get(&kind)
            .ok_or_else(|| VisualizerError::UnknownVisualization(kind.to_string()))?;
        factory(surfaces, ctx)
    }
}

impl fmt::Debug for VisualizationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

fn boxed<V: Visualization + 'static>(visualization: Result<V>) -> Result<Box<dyn Visualization>> {
    Ok(Box::new(visualization?))
}

/// Token for the armed tick loop. Ticks only reach the renderer while a
/// handle is held.
#[derive(Debug)]
struct LoopHandle {
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was drawn: not playing, loop not armed or nothing live.
    Idle,
    Rendered,
}

/// Owns the live renderer and everything that feeds it.
pub struct RenderScheduler {
    registry: VisualizationRegistry,
    surfaces: Box<dyn SurfaceProvider>,
    context: BuildContext,
    extractor: FeatureExtractor,
    classifier: Box<dyn SourceClassifier>,
    hue: HueTracker,
    options: Options,
    media: Vec<String>,
    active: Option<Box<dyn Visualization>>,
    handle: Option<LoopHandle>,
    generation: u64,
    session_start: Option<f64>,
    last_tick: Option<f64>,
}

impl RenderScheduler {
    pub fn new(
        registry: VisualizationRegistry,
        surfaces: Box<dyn SurfaceProvider>,
        context: BuildContext,
        classifier: Box<dyn SourceClassifier>,
    ) -> Self {
        Self {
            registry,
            surfaces,
            context,
            extractor: FeatureExtractor::new(),
            classifier,
            hue: HueTracker::new(),
            options: Options::new(),
            media: Vec::new(),
            active: None,
            handle: None,
            generation: 0,
            session_start: None,
            last_tick: None,
        }
    }

    pub fn active_kind(&self) -> Option<VisualizationKind> {
        self.active.as_ref().map(|visualization| visualization.kind())
    }

    pub fn is_scheduled(&self) -> bool {
        self.handle.is_some()
    }

    pub fn hue(&self) -> &HueTracker {
        &self.hue
    }

    /// Arms the tick loop if the transport is playing and a renderer is live.
    pub fn ensure_scheduled(&mut self, transport: &Transport) {
        if self.handle.is_some() || self.active.is_none() || !transport.is_playing() {
            return;
        }
        self.generation += 1;
        tracing::debug!(generation = self.generation, "arming tick loop");
        self.handle = Some(LoopHandle {
            generation: self.generation,
        });
    }

    /// Stops delivering ticks until the loop is armed again.
    pub fn halt(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::debug!(generation = handle.generation, "tick loop halted");
        }
    }

    /// One display tick. `timestamp` is the display clock in seconds.
    pub fn tick(
        &mut self,
        timestamp: f64,
        transport: &mut Transport,
        tap: &mut dyn AnalysisTap,
    ) -> Result<TickOutcome> {
        transport.poll();
        if !transport.is_playing() {
            self.halt();
            return Ok(TickOutcome::Idle);
        }
        if self.handle.is_none() {
            return Ok(TickOutcome::Idle);
        }
        let Some(visualization) = self.active.as_mut() else {
            return Ok(TickOutcome::Idle);
        };

        let position = transport.position();
        let raw = tap.capture(position)?;
        let estimate = self.classifier.classify(&raw.frequency);
        let frame = self
            .extractor
            .extract_with_source(&raw.frequency, &raw.time_domain, estimate)?;
        let hue = self
            .hue
            .observe(frame.source_label.as_deref(), frame.average_intensity);

        let start = *self.session_start.get_or_insert(timestamp);
        let dt = match self.last_tick {
            Some(last) => (timestamp - last).max(0.0),
            None => NOMINAL_DT,
        };
        self.last_tick = Some(timestamp);

        let ctx = TickContext {
            time: (timestamp - start).max(0.0),
            dt,
            hue: hue.current_hue,
            position,
        };
        visualization.update(&frame, &ctx)?;
        visualization.render()?;
        Ok(TickOutcome::Rendered)
    }

    /// Tears down the live renderer and builds `kind` in its place. On a
    /// construction failure nothing is live and the error is returned.
    pub fn switch_to(&mut self, kind: VisualizationKind) -> Result<()> {
        let was_scheduled = self.handle.is_some();
        self.halt();

        if let Some(mut previous) = self.active.take() {
            tracing::info!(from = %previous.kind(), to = %kind, "switching visualization");
            previous.destroy();
        }
        self.hue.reset();
        self.session_start = None;
        self.last_tick = None;

        let mut next = match self.registry.build(kind, self.surfaces.as_mut(), &self.context) {
            Ok(next) => next,
            Err(err) => {
                tracing::warn!(%kind, error = %err, "visualization could not be built");
                return Err(err);
            }
        };

        next.configure(&self.options);
        if !self.media.is_empty() {
            if let Some(host) = next.media_host() {
                host.set_media(&self.media);
            }
        }
        self.active = Some(next);

        if was_scheduled {
            self.generation += 1;
            self.handle = Some(LoopHandle {
                generation: self.generation,
            });
        }
        Ok(())
    }

    /// Stores the options and applies them to the live renderer.
    pub fn configure(&mut self, options: &Options) {
        self.options.merge(options);
        if let Some(active) = self.active.as_mut() {
            active.configure(&self.options);
        }
    }

    /// Hands media URLs to the live renderer if it can show them. The list
    /// is kept for renderers built later.
    pub fn set_media(&mut self, urls: &[String]) -> bool {
        self.media = urls.to_vec();
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        if !active.capabilities().media_items {
            tracing::debug!(kind = %active.kind(), "renderer does not take media items");
            return false;
        }
        match active.media_host() {
            Some(host) => {
                host.set_media(urls);
                true
            }
            None => false,
        }
    }

    /// Camera of the live renderer, if it has one.
    pub fn camera(&mut self) -> Option<&mut dyn CameraControls> {
        let active = self.active.as_mut()?;
        if !active.capabilities().camera_controls {
            return None;
        }
        active.camera_controls()
    }

    /// Destroys the live renderer and halts the loop.
    pub fn shutdown(&mut self) {
        self.halt();
        if let Some(mut active) = self.active.take() {
            active.destroy();
        }
    }
}

impl fmt::Debug for RenderScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderScheduler")
            .field("registry", &self.registry)
            .field("active", &self.active_kind())
            .field("scheduled", &self.handle.is_some())
            .field("hue", &self.hue.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc, sync::Arc};

    use super::*;
    use crate::{
        visual::{HeadlessSurfaces, SurfaceSize},
        AnalysisFrame, AudioConfig, BandHeuristicClassifier, DecodedAudio, FileAssetLoader,
        ManualClock, RawSamples, SignalTap, SourceEstimate,
    };

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recording {
        name: &'static str,
        log: Log,
    }

    impl Visualization for Recording {
        fn kind(&self) -> VisualizationKind {
            if self.name == "a" {
                VisualizationKind::Spectrum
            } else {
                VisualizationKind::Waveform
            }
        }

        fn configure(&mut self, _options: &Options) {
            self.log.borrow_mut().push(format!("{}:configure", self.name));
        }

        fn update(&mut self, _frame: &AnalysisFrame, _ctx: &TickContext) -> Result<()> {
            self.log.borrow_mut().push(format!("{}:update", self.name));
            Ok(())
        }

        fn render(&mut self) -> Result<()> {
            Ok(())
        }

        fn destroy(&mut self) {
            self.log.borrow_mut().push(format!("{}:destroy", self.name));
        }
    }

    struct FixedTap;

    impl AnalysisTap for FixedTap {
        fn bin_count(&self) -> usize {
            64
        }

        fn capture(&mut self, _position: f64) -> Result<RawSamples> {
            Ok(RawSamples {
                frequency: vec![180; 64],
                time_domain: vec![128; 64],
            })
        }
    }

    struct FixedLabel(&'static str);

    impl SourceClassifier for FixedLabel {
        fn classify(&mut self, _frequency: &[u8]) -> Option<SourceEstimate> {
            Some(SourceEstimate::new(self.0, 0.9))
        }
    }

    fn context() -> BuildContext {
        BuildContext {
            size: SurfaceSize::new(200, 100),
            seed: 3,
            loader: Arc::new(FileAssetLoader),
        }
    }

    fn recording_scheduler(log: &Log) -> RenderScheduler {
        let mut registry = VisualizationRegistry::new();
        for (kind, name) in [
            (VisualizationKind::Spectrum, "a"),
            (VisualizationKind::Waveform, "b"),
        ] {
            let log = log.clone();
            registry.register(kind, move |_, _| {
                Ok(Box::new(Recording {
                    name,
                    log: log.clone(),
                }) as Box<dyn Visualization>)
            });
        }
        registry.register(VisualizationKind::Holiday3d, |_, _| {
            Err(VisualizerError::surface_unavailable("3d scene", "test"))
        });
        RenderScheduler::new(
            registry,
            Box::new(HeadlessSurfaces::new()),
            context(),
            Box::new(FixedLabel("drums")),
        )
    }

    fn playing_transport(clock: &ManualClock) -> Transport {
        let mut transport = Transport::headless(Box::new(clock.clone()));
        transport.open(DecodedAudio::from_samples(vec![0.0; 44_100 * 4], 44_100).into_shared());
        transport.play().unwrap();
        transport
    }

    #[test]
    fn switching_destroys_before_the_next_update() {
        let log: Log = Rc::default();
        let clock = ManualClock::new();
        let mut transport = playing_transport(&clock);
        let mut scheduler = recording_scheduler(&log);

        scheduler.switch_to(VisualizationKind::Spectrum).unwrap();
        scheduler.ensure_scheduled(&transport);
        scheduler.tick(0.0, &mut transport, &mut FixedTap).unwrap();
        scheduler.switch_to(VisualizationKind::Waveform).unwrap();
        scheduler.tick(0.016, &mut transport, &mut FixedTap).unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["a:configure", "a:update", "a:destroy", "b:configure", "b:update"]
        );
        assert!(scheduler.is_scheduled());
    }

    #[test]
    fn failed_construction_leaves_nothing_live() {
        let log: Log = Rc::default();
        let clock = ManualClock::new();
        let mut transport = playing_transport(&clock);
        let mut scheduler = recording_scheduler(&log);

        scheduler.switch_to(VisualizationKind::Spectrum).unwrap();
        scheduler.ensure_scheduled(&transport);
        let err = scheduler.switch_to(VisualizationKind::Holiday3d).unwrap_err();
        assert!(matches!(err, VisualizerError::SurfaceUnavailable { .. }));
        assert_eq!(scheduler.active_kind(), None);
        assert!(!scheduler.is_scheduled());

        let outcome = scheduler.tick(0.0, &mut transport, &mut FixedTap).unwrap();
        assert_eq!(outcome, TickOutcome::Idle);
        assert_eq!(*log.borrow(), vec!["a:configure", "a:destroy"]);
    }

    #[test]
    fn unregistered_kinds_are_rejected() {
        let log: Log = Rc::default();
        let mut scheduler = recording_scheduler(&log);
        assert!(matches!(
            scheduler.switch_to(VisualizationKind::Cosmic),
            Err(VisualizerError::UnknownVisualization(_))
        ));
    }

    #[test]
    fn stopping_playback_halts_the_loop() {
        let log: Log = Rc::default();
        let clock = ManualClock::new();
        let mut transport = playing_transport(&clock);
        let mut scheduler = recording_scheduler(&log);
        scheduler.switch_to(VisualizationKind::Spectrum).unwrap();
        scheduler.ensure_scheduled(&transport);

        transport.pause();
        let outcome = scheduler.tick(0.0, &mut transport, &mut FixedTap).unwrap();
        assert_eq!(outcome, TickOutcome::Idle);
        assert!(!scheduler.is_scheduled());

        // Resuming alone does not restart ticks; the loop must be re-armed.
        transport.play().unwrap();
        let outcome = scheduler.tick(0.1, &mut transport, &mut FixedTap).unwrap();
        assert_eq!(outcome, TickOutcome::Idle);
        scheduler.ensure_scheduled(&transport);
        let outcome = scheduler.tick(0.2, &mut transport, &mut FixedTap).unwrap();
        assert_eq!(outcome, TickOutcome::Rendered);
    }

    #[test]
    fn hue_session_follows_the_classifier() {
        let log: Log = Rc::default();
        let clock = ManualClock::new();
        let mut transport = playing_transport(&clock);
        let mut scheduler = recording_scheduler(&log);
        scheduler.switch_to(VisualizationKind::Spectrum).unwrap();
        scheduler.ensure_scheduled(&transport);

        for i in 0..10 {
            scheduler
                .tick(i as f64 / 60.0, &mut transport, &mut FixedTap)
                .unwrap();
        }
        let state = scheduler.hue().state();
        assert_eq!(state.target_hue, 30.0);
        assert!(state.current_hue > 0.0 && state.current_hue < 30.0);

        scheduler.switch_to(VisualizationKind::Waveform).unwrap();
        assert_eq!(scheduler.hue().hue(), 0.0);
    }

    #[test]
    fn capabilities_gate_media_and_camera() {
        let mut scheduler = RenderScheduler::new(
            VisualizationRegistry::with_defaults(),
            Box::new(HeadlessSurfaces::new()),
            context(),
            Box::new(BandHeuristicClassifier::new(1)),
        );
        let urls = vec!["poster.png".to_string()];

        scheduler.switch_to(VisualizationKind::Spectrum).unwrap();
        assert!(!scheduler.set_media(&urls));
        assert!(scheduler.camera().is_none());

        scheduler.switch_to(VisualizationKind::Holiday3d).unwrap();
        assert!(scheduler.set_media(&urls));
        let camera = scheduler.camera().unwrap();
        camera.zoom(2.0);
    }

    #[test]
    fn every_default_renderer_runs_end_to_end() {
        let clock = ManualClock::new();
        let samples: Vec<f32> = (0..44_100 * 2)
            .map(|i| (i as f32 * 0.05).sin() * 0.6 + if i % 11_025 < 400 { 0.3 } else { 0.0 })
            .collect();
        let audio = DecodedAudio::from_samples(samples, 44_100).into_shared();
        let mut tap = SignalTap::new(audio.clone(), &AudioConfig::default()).unwrap();
        let mut transport = Transport::headless(Box::new(clock.clone()));
        transport.open(audio);

        let mut scheduler = RenderScheduler::new(
            VisualizationRegistry::with_defaults(),
            Box::new(HeadlessSurfaces::new()),
            context(),
            Box::new(BandHeuristicClassifier::new(7)),
        );
        scheduler.configure(&Options::new().with("brightness", crate::OptionValue::Number(1.5)));
        transport.play().unwrap();

        let mut timestamp = 0.0;
        for kind in VisualizationKind::ALL {
            scheduler.switch_to(kind).unwrap();
            scheduler.ensure_scheduled(&transport);
            for _ in 0..12 {
                clock.advance(1.0 / 60.0);
                timestamp += 1.0 / 60.0;
                let outcome = scheduler.tick(timestamp, &mut transport, &mut tap).unwrap();
                assert_eq!(outcome, TickOutcome::Rendered, "{kind}");
            }
        }
        scheduler.shutdown();
        assert_eq!(scheduler.active_kind(), None);
    }
}
