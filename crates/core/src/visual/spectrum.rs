use glam::Vec2;

use crate::{AnalysisFrame, Options, Result};

use super::{
    released, BuildContext, Canvas, Color, CommonOptions, SurfaceProvider, TickContext,
    Visualization, VisualizationKind,
};

const DEFAULT_BARS: usize = 64;
/// Upper bins carry little musical energy; bars cover the lower part only.
const SPECTRUM_COVERAGE: f32 = 0.7;
const PEAK_FALL: f32 = 0.008;

/// Classic bar spectrum with falling peak caps.
#[derive(Debug)]
pub struct Spectrum {
    canvas: Option<Canvas>,
    common: CommonOptions,
    show_peaks: bool,
    mirror: bool,
    heights: Vec<f32>,
    peaks: Vec<f32>,
    hue: f32,
}

impl Spectrum {
    pub fn new(surfaces: &mut dyn SurfaceProvider, ctx: &BuildContext) -> Result<Self> {
        let canvas = surfaces.acquire_canvas(ctx.size)?;
        Ok(Self {
            canvas: Some(canvas),
            common: CommonOptions::default(),
            show_peaks: true,
            mirror: false,
            heights: vec![0.0; DEFAULT_BARS],
            peaks: vec![0.0; DEFAULT_BARS],
            hue: 0.0,
        })
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    pub fn peaks(&self) -> &[f32] {
        &self.peaks
    }
}

impl Visualization for Spectrum {
    fn kind(&self) -> VisualizationKind {
        VisualizationKind::Spectrum
    }

    fn configure(&mut self, options: &Options) {
        self.common.apply(options);
        if let Some(bars) = options.number("bars") {
            let bars = (bars as usize).clamp(8, 256);
            if bars != self.heights.len() {
                self.heights = vec![0.0; bars];
                self.peaks = vec![0.0; bars];
            }
        }
        if let Some(show_peaks) = options.flag("showPeaks") {
            self.show_peaks = show_peaks;
        }
        if let Some(mirror) = options.flag("mirror") {
            self.mirror = mirror;
        }
    }

    fn update(&mut self, frame: &AnalysisFrame, ctx: &TickContext) -> Result<()> {
        self.hue = ctx.hue;
        let bins = frame.bin_count();
        if bins == 0 {
            return Ok(());
        }
        let bars = self.heights.len();
        let span = ((bins as f32 * SPECTRUM_COVERAGE) as usize).clamp(1, bins);

        for (i, (height, peak)) in self.heights.iter_mut().zip(&mut self.peaks).enumerate() {
            let start = (i * span / bars).min(bins - 1);
            let end = ((i + 1) * span / bars).max(start + 1).min(bins);
            let target = frame.band_mean((start, end - 1))? * self.common.reactivity;

            *height += (target.min(1.0) - *height) * 0.5;
            *peak = (*peak - PEAK_FALL).max(*height);
        }
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let canvas = self.canvas.as_mut().ok_or_else(|| released("2d canvas"))?;
        let size = canvas.size().extent();
        canvas.begin_frame(Color::BLACK);

        let bars = self.heights.len();
        let slot = size.x / bars as f32;
        let floor = if self.mirror { size.y * 0.5 } else { size.y };
        let max_height = if self.mirror { size.y * 0.5 } else { size.y };

        for (i, (&height, &peak)) in self.heights.iter().zip(&self.peaks).enumerate() {
            let offset = i as f32 / bars as f32;
            let color = self
                .common
                .theme
                .color(self.hue, offset, 0.35 + height * 0.3)
                .scaled(self.common.brightness);
            let h = height * max_height;
            let x = i as f32 * slot;

            canvas.rect(Vec2::new(x, floor - h), Vec2::new(slot * 0.8, h), color);
            if self.mirror {
                canvas.rect(Vec2::new(x, floor), Vec2::new(slot * 0.8, h), color.with_alpha(0.5));
            }
            if self.show_peaks && peak > 0.0 {
                let y = floor - peak * max_height;
                canvas.line(Vec2::new(x, y), Vec2::new(x + slot * 0.8, y), 2.0, Color::WHITE);
            }
        }

        canvas.present();
        Ok(())
    }

    fn destroy(&mut self) {
        if self.canvas.take().is_some() {
            tracing::debug!("spectrum released its canvas");
        }
    }
}
