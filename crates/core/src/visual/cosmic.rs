use glam::Vec2;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    scene::split_bands, AnalysisFrame, AnimatedElement, Options, Pattern, PatternAnimator, Result,
};

use super::{
    released, BuildContext, Canvas, Color, CommonOptions, SurfaceProvider, TickContext,
    Visualization, VisualizationKind,
};

const DEFAULT_STARS: usize = 120;
const NEBULAE: usize = 4;

#[derive(Debug, Clone)]
struct Star {
    position: Vec2,
    element: AnimatedElement,
}

#[derive(Debug, Clone, Copy)]
struct Nebula {
    orbit: f32,
    angle: f32,
    radius: f32,
    hue_offset: f32,
}

#[derive(Debug, Clone, Copy)]
struct Comet {
    position: Vec2,
    velocity: Vec2,
    life: f32,
}

/// Star field with slowly orbiting nebulae. Stars twinkle with their band,
/// the nebulae swell with the bass, and onsets launch comets.
#[derive(Debug)]
pub struct Cosmic {
    canvas: Option<Canvas>,
    common: CommonOptions,
    rng: StdRng,
    stars: Vec<Star>,
    nebulae: Vec<Nebula>,
    comets: Vec<Comet>,
    show_nebulae: bool,
    bass: f32,
    hue: f32,
    bins: usize,
}

impl Cosmic {
    pub fn new(surfaces: &mut dyn SurfaceProvider, ctx: &BuildContext) -> Result<Self> {
        let canvas = surfaces.acquire_canvas(ctx.size)?;
        let mut rng = StdRng::seed_from_u64(ctx.seed ^ 0xC05);
        let nebulae = (0..NEBULAE)
            .map(|i| Nebula {
                orbit: 0.15 + 0.1 * i as f32,
                angle: rng.random::<f32>() * std::f32::consts::TAU,
                radius: 0.2 + rng.random::<f32>() * 0.15,
                hue_offset: i as f32 / NEBULAE as f32,
            })
            .collect();

        let mut cosmic = Self {
            canvas: Some(canvas),
            common: CommonOptions::default(),
            rng,
            stars: Vec::new(),
            nebulae,
            comets: Vec::new(),
            show_nebulae: true,
            bass: 0.0,
            hue: 0.0,
            bins: 0,
        };
        cosmic.populate(DEFAULT_STARS, 1024);
        Ok(cosmic)
    }

    /// Recreates the star field; each star listens to its own narrow band.
    fn populate(&mut self, count: usize, bins: usize) {
        let bands = split_bands(bins, count, 0.8);
        self.stars = bands
            .into_iter()
            .map(|band| Star {
                position: Vec2::new(self.rng.random::<f32>(), self.rng.random::<f32>()),
                element: AnimatedElement::new(Pattern::Twinkle, band),
            })
            .collect();
        self.bins = bins;
    }

    pub fn active_stars(&self) -> usize {
        self.stars.iter().filter(|s| s.element.active).count()
    }

    pub fn comets(&self) -> usize {
        self.comets.len()
    }
}

impl Visualization for Cosmic {
    fn kind(&self) -> VisualizationKind {
        VisualizationKind::Cosmic
    }

    fn configure(&mut self, options: &Options) {
        self.common.apply(options);
        if let Some(stars) = options.number("stars") {
            let count = (stars.max(1.0) as usize).min(1_000);
            if count != self.stars.len() {
                self.populate(count, self.bins);
            }
        }
        if let Some(nebulae) = options.flag("nebulae") {
            self.show_nebulae = nebulae;
        }
    }

    fn update(&mut self, frame: &AnalysisFrame, ctx: &TickContext) -> Result<()> {
        if frame.bin_count() != self.bins {
            self.populate(self.stars.len(), frame.bin_count());
        }
        self.hue = ctx.hue;
        self.bass += (frame.bass_energy - self.bass) * 0.2;

        for star in &mut self.stars {
            PatternAnimator::step(&mut star.element, frame, ctx.time, &mut self.rng)?;
        }

        let spin = ctx.dt as f32 * (0.05 + self.bass * self.common.reactivity);
        for (i, nebula) in self.nebulae.iter_mut().enumerate() {
            let direction = if i % 2 == 0 { 1.0 } else { -1.0 };
            nebula.angle += spin * direction;
        }

        if frame.has_onset() && self.comets.len() < 8 {
            let y = self.rng.random::<f32>() * 0.5;
            self.comets.push(Comet {
                position: Vec2::new(-0.05, y),
                velocity: Vec2::new(0.6, 0.25) * (0.5 + frame.average_intensity),
                life: 1.0,
            });
        }

        let dt = ctx.dt as f32;
        for comet in &mut self.comets {
            comet.position += comet.velocity * dt;
            comet.life -= dt * 0.8;
        }
        self.comets.retain(|c| c.life > 0.0);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let canvas = self.canvas.as_mut().ok_or_else(|| released("2d canvas"))?;
        let size = canvas.size();
        let extent = size.extent();
        let center = size.center();
        let radius = size.radius();
        canvas.begin_frame(Color::hsl(self.hue + 240.0, 0.5, 0.03));

        if self.show_nebulae {
            for nebula in &self.nebulae {
                let offset = Vec2::from_angle(nebula.angle) * nebula.orbit * radius * 2.0;
                let color = self
                    .common
                    .theme
                    .color(self.hue, nebula.hue_offset, 0.3)
                    .scaled(self.common.brightness)
                    .with_alpha(0.25 + self.bass * 0.3);
                canvas.circle(
                    center + offset,
                    nebula.radius * radius * (1.0 + self.bass * 0.5),
                    color,
                );
            }
        }

        for star in &self.stars {
            let level = star.element.display_level() * self.common.brightness;
            canvas.circle(star.position * extent, 0.8 + level * 1.5, Color::WHITE.scaled(level));
        }

        for comet in &self.comets {
            let head = comet.position * extent;
            let tail = head - comet.velocity.normalize_or_zero() * 40.0;
            canvas.line(tail, head, 2.0, Color::WHITE.with_alpha(comet.life));
        }

        canvas.present();
        Ok(())
    }

    fn destroy(&mut self) {
        self.canvas = None;
        self.comets.clear();
    }
}
