use glam::Vec2;
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    scene::split_bands, AnalysisFrame, AnimatedElement, Options, Pattern, PatternAnimator, Result,
};

use super::{
    released, BuildContext, Canvas, Color, CommonOptions, SurfaceProvider, TickContext,
    Visualization, VisualizationKind,
};

const DEFAULT_RAYS: usize = 64;
const ROTATION_SPEED: f32 = 0.1;

/// Radial rays around a pulsing core. Ray length tracks its band through the
/// static pattern; the core swells with the bass.
#[derive(Debug)]
pub struct Sunburst {
    canvas: Option<Canvas>,
    common: CommonOptions,
    rng: StdRng,
    rays: Vec<AnimatedElement>,
    ray_count: usize,
    core: f32,
    rotation: f32,
    hue: f32,
    bins: usize,
}

impl Sunburst {
    pub fn new(surfaces: &mut dyn SurfaceProvider, ctx: &BuildContext) -> Result<Self> {
        Ok(Self {
            canvas: Some(surfaces.acquire_canvas(ctx.size)?),
            common: CommonOptions::default(),
            rng: StdRng::seed_from_u64(ctx.seed ^ 0x5B),
            rays: Vec::new(),
            ray_count: DEFAULT_RAYS,
            core: 0.0,
            rotation: 0.0,
            hue: 0.0,
            bins: 0,
        })
    }

    fn rebuild(&mut self, bins: usize) {
        self.rays = split_bands(bins, self.ray_count, 0.7)
            .into_iter()
            .map(|band| AnimatedElement::new(Pattern::Static, band))
            .collect();
        self.bins = bins;
    }

    pub fn core(&self) -> f32 {
        self.core
    }

    pub fn rays(&self) -> &[AnimatedElement] {
        &self.rays
    }
}

impl Visualization for Sunburst {
    fn kind(&self) -> VisualizationKind {
        VisualizationKind::Sunburst
    }

    fn configure(&mut self, options: &Options) {
        self.common.apply(options);
        if let Some(rays) = options.number("rays") {
            let rays = (rays as usize).clamp(8, 360);
            if rays != self.ray_count {
                self.ray_count = rays;
                self.rebuild(self.bins);
            }
        }
    }

    fn update(&mut self, frame: &AnalysisFrame, ctx: &TickContext) -> Result<()> {
        if frame.bin_count() != self.bins || self.rays.len() != self.ray_count {
            self.rebuild(frame.bin_count());
        }
        self.hue = ctx.hue;
        self.rotation += ctx.dt as f32 * ROTATION_SPEED;
        self.core += (frame.bass_energy * self.common.reactivity - self.core) * 0.25;

        for ray in &mut self.rays {
            PatternAnimator::step(ray, frame, ctx.time, &mut self.rng)?;
        }
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let canvas = self.canvas.as_mut().ok_or_else(|| released("2d canvas"))?;
        let center = canvas.size().center();
        let radius = canvas.size().radius();
        canvas.begin_frame(Color::BLACK);

        let inner = radius * (0.12 + self.core * 0.15);
        let count = self.rays.len().max(1) as f32;
        for (i, ray) in self.rays.iter().enumerate() {
            let offset = i as f32 / count;
            let angle = self.rotation + offset * std::f32::consts::TAU;
            let direction = Vec2::from_angle(angle);
            let length =
                (radius - inner) * (0.1 + ray.brightness * 0.9) * self.common.reactivity.min(1.0);
            let color = self
                .common
                .theme
                .color(self.hue, offset, 0.3 + ray.brightness * 0.3)
                .scaled(self.common.brightness);
            canvas.line(
                center + direction * inner,
                center + direction * (inner + length),
                2.0,
                color,
            );
        }

        let glow = Color::hsl(self.hue + 40.0, 0.9, 0.5 + self.core * 0.3)
            .scaled(self.common.brightness);
        canvas.circle(center, inner, glow);
        canvas.present();
        Ok(())
    }

    fn destroy(&mut self) {
        self.canvas = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visual::{testing, HeadlessSurfaces};
    use crate::OptionValue;

    #[test]
    fn rays_lengthen_and_core_pulses() {
        let mut surfaces = HeadlessSurfaces::new();
        let mut sunburst = Sunburst::new(&mut surfaces, &testing::build_context()).unwrap();

        for i in 0..10 {
            sunburst.update(&testing::loud_frame("brass"), &testing::tick(i)).unwrap();
        }
        assert_eq!(sunburst.rays().len(), DEFAULT_RAYS);
        assert_eq!(sunburst.rays()[0].brightness, 1.0);
        assert!(sunburst.core() > 0.5);

        sunburst.update(&testing::quiet_frame(), &testing::tick(10)).unwrap();
        assert_eq!(sunburst.rays()[0].brightness, 0.0);
    }

    #[test]
    fn ray_count_is_configurable() {
        let mut surfaces = HeadlessSurfaces::new();
        let mut sunburst = Sunburst::new(&mut surfaces, &testing::build_context()).unwrap();
        sunburst.configure(&Options::new().with("rays", OptionValue::Number(12.0)));
        testing::exercise(&mut sunburst, 4);
        assert_eq!(sunburst.rays().len(), 12);

        sunburst.destroy();
        sunburst.destroy();
        assert!(sunburst.render().is_err());
    }
}
