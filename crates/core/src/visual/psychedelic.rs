use std::f32::consts::TAU;

use glam::Vec2;
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    scene::split_bands, AnalysisFrame, AnimatedElement, Options, Pattern, PatternAnimator, Result,
};

use super::{
    released, BuildContext, Canvas, Color, CommonOptions, DrawCommand, SurfaceProvider,
    TickContext, Visualization, VisualizationKind,
};

const DEFAULT_SEGMENTS: usize = 8;
const RINGS: usize = 6;

/// Kaleidoscope of mirrored segments around the centre. The whole figure
/// spins with overall intensity and pulses outward on the bass; each ring is
/// a wave element tied to its own slice of the spectrum.
#[derive(Debug)]
pub struct Psychedelic {
    canvas: Option<Canvas>,
    common: CommonOptions,
    rng: StdRng,
    segments: usize,
    rings: Vec<AnimatedElement>,
    rotation: f32,
    zoom: f32,
    hue: f32,
    bins: usize,
}

impl Psychedelic {
    pub fn new(surfaces: &mut dyn SurfaceProvider, ctx: &BuildContext) -> Result<Self> {
        let canvas = surfaces.acquire_canvas(ctx.size)?;
        Ok(Self {
            canvas: Some(canvas),
            common: CommonOptions::default(),
            rng: StdRng::seed_from_u64(ctx.seed ^ 0x5E9),
            segments: DEFAULT_SEGMENTS,
            rings: Vec::new(),
            rotation: 0.0,
            zoom: 1.0,
            hue: 0.0,
            bins: 0,
        })
    }

    fn rebuild_rings(&mut self, bins: usize) {
        self.rings = split_bands(bins, RINGS, 0.6)
            .into_iter()
            .enumerate()
            .map(|(i, band)| {
                AnimatedElement::new(Pattern::Wave, band).with_phase(i as f32 / RINGS as f32)
            })
            .collect();
        self.bins = bins;
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }
}

impl Visualization for Psychedelic {
    fn kind(&self) -> VisualizationKind {
        VisualizationKind::Psychedelic
    }

    fn configure(&mut self, options: &Options) {
        self.common.apply(options);
        if let Some(segments) = options.number("segments") {
            self.segments = (segments as usize).clamp(2, 32);
        }
    }

    fn update(&mut self, frame: &AnalysisFrame, ctx: &TickContext) -> Result<()> {
        if frame.bin_count() != self.bins {
            self.rebuild_rings(frame.bin_count());
        }
        self.hue = ctx.hue;
        let reactivity = self.common.reactivity;

        self.rotation = (self.rotation
            + ctx.dt as f32 * (0.2 + frame.average_intensity * 2.0 * reactivity))
            .rem_euclid(TAU);

        let target = 1.0 + frame.bass_energy * 0.5 * reactivity;
        self.zoom += (target - self.zoom) * 0.3;

        for ring in &mut self.rings {
            PatternAnimator::step(ring, frame, ctx.time, &mut self.rng)?;
        }
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let canvas = self.canvas.as_mut().ok_or_else(|| released("2d canvas"))?;
        let center = canvas.size().center();
        let radius = canvas.size().radius() * self.zoom;
        canvas.begin_frame(Color::BLACK);

        let sector = TAU / self.segments as f32;
        for (r, ring) in self.rings.iter().enumerate() {
            let level = ring.display_level() * self.common.brightness;
            let ring_radius = radius * (r + 1) as f32 / (RINGS + 1) as f32;
            let offset = (ring.state.wave_position + r as f32 / RINGS as f32).fract();
            let color = self.common.theme.color(self.hue, offset, 0.25 + level * 0.35);

            for s in 0..self.segments {
                let start = self.rotation + s as f32 * sector;
                // Mirror every other segment so adjacent sectors reflect.
                let bend = if s % 2 == 0 { 0.35 } else { -0.35 };
                let wobble = 1.0 + (ring.state.wave_position * TAU).sin() * 0.15 * level;
                let apex = Vec2::from_angle(start + sector * (0.5 + bend * 0.3));
                let points = vec![
                    center + Vec2::from_angle(start) * ring_radius,
                    center + apex * ring_radius * wobble,
                    center + Vec2::from_angle(start + sector) * ring_radius,
                ];
                canvas.draw(DrawCommand::Polyline {
                    points,
                    width: 1.0 + level * 4.0,
                    color,
                });
            }
        }

        canvas.present();
        Ok(())
    }

    fn destroy(&mut self) {
        self.canvas = None;
    }
}
