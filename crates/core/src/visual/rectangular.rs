use glam::Vec2;
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    scene::split_bands, AnalysisFrame, AnimatedElement, Options, Pattern, PatternAnimator, Result,
};

use super::{
    released, BuildContext, Canvas, Color, CommonOptions, DrawCommand, SurfaceProvider,
    TickContext, Visualization, VisualizationKind,
};

const DEFAULT_LAYERS: usize = 10;

/// Nested frames shrinking toward the centre. Even layers blink, odd layers
/// strobe; the outermost layer listens to the bass.
#[derive(Debug)]
pub struct Rectangular {
    canvas: Option<Canvas>,
    common: CommonOptions,
    rng: StdRng,
    layers: Vec<AnimatedElement>,
    layer_count: usize,
    outline: bool,
    hue: f32,
    bins: usize,
}

impl Rectangular {
    pub fn new(surfaces: &mut dyn SurfaceProvider, ctx: &BuildContext) -> Result<Self> {
        Ok(Self {
            canvas: Some(surfaces.acquire_canvas(ctx.size)?),
            common: CommonOptions::default(),
            rng: StdRng::seed_from_u64(ctx.seed ^ 0x4EC7),
            layers: Vec::new(),
            layer_count: DEFAULT_LAYERS,
            outline: true,
            hue: 0.0,
            bins: 0,
        })
    }

    fn rebuild(&mut self, bins: usize) {
        self.layers = split_bands(bins, self.layer_count, 0.6)
            .into_iter()
            .enumerate()
            .map(|(i, band)| {
                let pattern = if i % 2 == 0 { Pattern::Blink } else { Pattern::Strobe };
                AnimatedElement::new(pattern, band)
            })
            .collect();
        self.bins = bins;
    }

    pub fn layers(&self) -> &[AnimatedElement] {
        &self.layers
    }
}

impl Visualization for Rectangular {
    fn kind(&self) -> VisualizationKind {
        VisualizationKind::Rectangular
    }

    fn configure(&mut self, options: &Options) {
        self.common.apply(options);
        if let Some(layers) = options.number("layers") {
            self.layer_count = (layers as usize).clamp(1, 40);
            self.rebuild(self.bins);
        }
        if let Some(outline) = options.flag("outline") {
            self.outline = outline;
        }
    }

    fn update(&mut self, frame: &AnalysisFrame, ctx: &TickContext) -> Result<()> {
        if frame.bin_count() != self.bins || self.layers.len() != self.layer_count {
            self.rebuild(frame.bin_count());
        }
        self.hue = ctx.hue;
        for layer in &mut self.layers {
            PatternAnimator::step(layer, frame, ctx.time, &mut self.rng)?;
        }
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let canvas = self.canvas.as_mut().ok_or_else(|| released("2d canvas"))?;
        let extent = canvas.size().extent();
        let center = canvas.size().center();
        canvas.begin_frame(Color::BLACK);

        let count = self.layers.len().max(1) as f32;
        for (i, layer) in self.layers.iter().enumerate() {
            let shrink = 1.0 - i as f32 / count;
            let half = extent * 0.5 * shrink;
            let level = layer.display_level() * self.common.brightness;
            let color = self
                .common
                .theme
                .color(self.hue, i as f32 / count, 0.2 + level * 0.4);

            if self.outline {
                let corners = [
                    center + Vec2::new(-half.x, -half.y),
                    center + Vec2::new(half.x, -half.y),
                    center + Vec2::new(half.x, half.y),
                    center + Vec2::new(-half.x, half.y),
                    center + Vec2::new(-half.x, -half.y),
                ];
                canvas.draw(DrawCommand::Polyline {
                    points: corners.to_vec(),
                    width: 1.0 + level * 3.0,
                    color,
                });
            } else {
                canvas.rect(center - half, half * 2.0, color.with_alpha(0.3 + level * 0.5));
            }
        }

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
    fn layers_alternate_patterns() {
        let mut surfaces = HeadlessSurfaces::new();
        let mut rectangular = Rectangular::new(&mut surfaces, &testing::build_context()).unwrap();
        rectangular.update(&testing::quiet_frame(), &testing::tick(0)).unwrap();

        let layers = rectangular.layers();
        assert_eq!(layers.len(), DEFAULT_LAYERS);
        assert_eq!(layers[0].pattern, Pattern::Blink);
        assert_eq!(layers[1].pattern, Pattern::Strobe);
        assert!(layers.iter().step_by(2).all(|l| !l.active));
    }

    #[test]
    fn filled_mode_draws_rects() {
        let mut surfaces = HeadlessSurfaces::new();
        let mut rectangular = Rectangular::new(&mut surfaces, &testing::build_context()).unwrap();
        rectangular.configure(
            &Options::new()
                .with("layers", OptionValue::Number(3.0))
                .with("outline", OptionValue::Flag(false)),
        );
        testing::exercise(&mut rectangular, 3);

        let canvas = rectangular.canvas.as_ref().unwrap();
        let rects = canvas
            .commands()
            .iter()
            .filter(|c| matches!(c, DrawCommand::Rect { .. }))
            .count();
        assert_eq!(rects, 3);

        rectangular.destroy();
        rectangular.destroy();
        assert!(rectangular.render().is_err());
    }
}
