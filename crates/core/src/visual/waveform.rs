use glam::Vec2;

use crate::{AnalysisFrame, Options, Result};

use super::{
    released, BuildContext, Canvas, Color, CommonOptions, DrawCommand, SurfaceProvider,
    TickContext, Visualization, VisualizationKind,
};

const POINTS: usize = 256;
const FLASH_DECAY: f32 = 0.9;

/// Oscilloscope trace whose thickness follows the bass and which flashes on
/// beat onsets.
#[derive(Debug)]
pub struct Waveform {
    canvas: Option<Canvas>,
    common: CommonOptions,
    mirror: bool,
    /// Samples in [-1, 1], resampled to [`POINTS`].
    trace: Vec<f32>,
    thickness: f32,
    flash: f32,
    hue: f32,
}

impl Waveform {
    pub fn new(surfaces: &mut dyn SurfaceProvider, ctx: &BuildContext) -> Result<Self> {
        Ok(Self {
            canvas: Some(surfaces.acquire_canvas(ctx.size)?),
            common: CommonOptions::default(),
            mirror: false,
            trace: vec![0.0; POINTS],
            thickness: 2.0,
            flash: 0.0,
            hue: 0.0,
        })
    }

    pub fn flash(&self) -> f32 {
        self.flash
    }
}

impl Visualization for Waveform {
    fn kind(&self) -> VisualizationKind {
        VisualizationKind::Waveform
    }

    fn configure(&mut self, options: &Options) {
        self.common.apply(options);
        if let Some(mirror) = options.flag("mirror") {
            self.mirror = mirror;
        }
    }

    fn update(&mut self, frame: &AnalysisFrame, ctx: &TickContext) -> Result<()> {
        self.hue = ctx.hue;
        let samples = &frame.time_domain_samples;
        if !samples.is_empty() {
            for (i, point) in self.trace.iter_mut().enumerate() {
                let index = i * samples.len() / POINTS;
                *point = (samples[index] as f32 - 128.0) / 128.0;
            }
        }

        self.thickness = 2.0 + frame.bass_energy * 6.0 * self.common.reactivity;
        self.flash = if frame.has_onset() {
            1.0
        } else {
            self.flash * FLASH_DECAY
        };
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let canvas = self.canvas.as_mut().ok_or_else(|| released("2d canvas"))?;
        let size = canvas.size().extent();
        let background = Color::hsl(self.hue, 0.6, 0.08 * self.flash);
        canvas.begin_frame(background);

        let mid = size.y * 0.5;
        let amplitude = size.y * 0.4;
        let step = size.x / (POINTS - 1) as f32;
        let color = self
            .common
            .theme
            .color(self.hue, 0.0, 0.55)
            .scaled(self.common.brightness);

        let points: Vec<Vec2> = self
            .trace
            .iter()
            .enumerate()
            .map(|(i, &v)| Vec2::new(i as f32 * step, mid - v * amplitude))
            .collect();

        if self.mirror {
            let reflected = points.iter().map(|p| Vec2::new(p.x, 2.0 * mid - p.y)).collect();
            canvas.draw(DrawCommand::Polyline {
                points: reflected,
                width: self.thickness * 0.5,
                color: color.with_alpha(0.4),
            });
        }
        canvas.draw(DrawCommand::Polyline {
            points,
            width: self.thickness,
            color,
        });

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

    #[test]
    fn onsets_flash_and_decay() {
        let mut surfaces = HeadlessSurfaces::new();
        let mut waveform = Waveform::new(&mut surfaces, &testing::build_context()).unwrap();

        waveform.update(&testing::loud_frame("vocals"), &testing::tick(0)).unwrap();
        assert_eq!(waveform.flash(), 1.0);
        waveform.update(&testing::quiet_frame(), &testing::tick(1)).unwrap();
        assert!((waveform.flash() - FLASH_DECAY).abs() < 1e-6);
        waveform.render().unwrap();
    }

    #[test]
    fn renders_a_single_trace() {
        let mut surfaces = HeadlessSurfaces::new();
        let mut waveform = Waveform::new(&mut surfaces, &testing::build_context()).unwrap();
        testing::exercise(&mut waveform, 4);

        let canvas = waveform.canvas.as_ref().unwrap();
        let traces = canvas
            .commands()
            .iter()
            .filter(|c| matches!(c, DrawCommand::Polyline { .. }))
            .count();
        assert_eq!(traces, 1);

        waveform.destroy();
        waveform.destroy();
        assert!(waveform.render().is_err());
    }
}
