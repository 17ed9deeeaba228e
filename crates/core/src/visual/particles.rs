use std::f32::consts::TAU;

use glam::Vec2;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{AnalysisFrame, Options, Result};

use super::{
    released, BuildContext, Canvas, Color, CommonOptions, SurfaceProvider, TickContext,
    Visualization, VisualizationKind,
};

const DEFAULT_MAX_PARTICLES: usize = 400;
const DRAG: f32 = 0.98;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Particle {
    position: Vec2,
    velocity: Vec2,
    age: f32,
    lifetime: f32,
    size: f32,
    hue_offset: f32,
}

/// Burst emitter: onsets and loud frames spawn particles from the centre that
/// drift outward and fade over their lifetime.
#[derive(Debug)]
pub struct Particles {
    canvas: Option<Canvas>,
    common: CommonOptions,
    rng: StdRng,
    particles: Vec<Particle>,
    max_particles: usize,
    trails: bool,
    center: Vec2,
    hue: f32,
}

impl Particles {
    pub fn new(surfaces: &mut dyn SurfaceProvider, ctx: &BuildContext) -> Result<Self> {
        let canvas = surfaces.acquire_canvas(ctx.size)?;
        Ok(Self {
            center: canvas.size().center(),
            canvas: Some(canvas),
            common: CommonOptions::default(),
            rng: StdRng::seed_from_u64(ctx.seed ^ 0x9A27),
            particles: Vec::new(),
            max_particles: DEFAULT_MAX_PARTICLES,
            trails: false,
            hue: 0.0,
        })
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    fn spawn(&mut self, count: usize, speed: f32) {
        let room = self.max_particles.saturating_sub(self.particles.len());
        for _ in 0..count.min(room) {
            let angle = self.rng.random::<f32>() * TAU;
            let magnitude = speed * (0.5 + self.rng.random::<f32>());
            self.particles.push(Particle {
                position: self.center,
                velocity: Vec2::from_angle(angle) * magnitude,
                age: 0.0,
                lifetime: 1.0 + self.rng.random::<f32>() * 2.0,
                size: 1.5 + self.rng.random::<f32>() * 3.0,
                hue_offset: self.rng.random::<f32>() * 0.2,
            });
        }
    }
}

impl Visualization for Particles {
    fn kind(&self) -> VisualizationKind {
        VisualizationKind::Particles
    }

    fn configure(&mut self, options: &Options) {
        self.common.apply(options);
        if let Some(max) = options.number("maxParticles") {
            self.max_particles = (max.max(0.0) as usize).min(5_000);
            self.particles.truncate(self.max_particles);
        }
        if let Some(trails) = options.flag("trails") {
            self.trails = trails;
        }
    }

    fn update(&mut self, frame: &AnalysisFrame, ctx: &TickContext) -> Result<()> {
        self.hue = ctx.hue;
        let dt = ctx.dt as f32;
        let reactivity = self.common.reactivity;

        let burst = (frame.beat_onsets.len() as f32 * 4.0 + frame.average_intensity * 3.0)
            * reactivity;
        let speed = 1.0 + frame.bass_energy * 6.0 * reactivity;
        self.spawn(burst.round() as usize, speed);

        let step = dt * 60.0;
        for particle in &mut self.particles {
            particle.position += particle.velocity * step;
            particle.velocity *= DRAG;
            particle.age += dt;
        }
        self.particles.retain(|p| p.age < p.lifetime);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let canvas = self.canvas.as_mut().ok_or_else(|| released("2d canvas"))?;
        let background = if self.trails {
            Color::BLACK.with_alpha(0.15)
        } else {
            Color::BLACK
        };
        canvas.begin_frame(background);

        for particle in &self.particles {
            let life = 1.0 - particle.age / particle.lifetime;
            let color = self
                .common
                .theme
                .color(self.hue, particle.hue_offset, 0.6)
                .scaled(self.common.brightness)
                .with_alpha(life);
            canvas.circle(particle.position, particle.size * (0.5 + life * 0.5), color);
        }

        canvas.present();
        Ok(())
    }

    fn destroy(&mut self) {
        self.canvas = None;
        self.particles.clear();
    }
}
