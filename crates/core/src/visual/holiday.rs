use glam::Vec2;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    AnalysisFrame, AnimatedElement, MediaLibrary, Options, Pattern, PatternAnimator, Result,
};

use super::{
    released, BuildContext, Canvas, Capabilities, Color, CommonOptions, DrawCommand, MediaHost,
    SurfaceProvider, TickContext, Visualization, VisualizationKind,
};

const DEFAULT_MEDIA_INTERVAL: f64 = 8.0;
const SKIP_BASS: f32 = 0.8;
const SKIP_COOLDOWN: f64 = 1.0;
const ORNAMENT_PALETTE: [f32; 5] = [0.0, 120.0, 45.0, 210.0, 300.0];
const SNOWFLAKES: usize = 80;

/// Decorated parts of the house, each with its own pattern and listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fixture {
    Roofline,
    Window,
    Bush,
    Ornament,
    Wreath,
    Garage,
    Icicle,
    TreeStar,
}

impl Fixture {
    fn pattern(self) -> Pattern {
        match self {
            Self::Roofline => Pattern::Chase,
            Self::Window => Pattern::Blink,
            Self::Bush => Pattern::Twinkle,
            Self::Ornament => Pattern::Alternate,
            Self::Wreath => Pattern::Fade,
            Self::Garage => Pattern::Strobe,
            Self::Icicle => Pattern::Wave,
            Self::TreeStar => Pattern::Static,
        }
    }

    /// Instrument whose presence brightens this fixture.
    fn affinity(self) -> &'static str {
        match self {
            Self::Roofline => "synth",
            Self::Window => "piano",
            Self::Bush => "guitar",
            Self::Ornament => "drums",
            Self::Wreath => "strings",
            Self::Garage => "bass",
            Self::Icicle => "vocals",
            Self::TreeStar => "brass",
        }
    }

    /// Share of the spectrum, as fractions of the bin count.
    fn band(self) -> (f32, f32) {
        match self {
            Self::Garage => (0.0, 0.03),
            Self::Ornament => (0.0, 0.06),
            Self::Bush => (0.03, 0.1),
            Self::Window => (0.05, 0.15),
            Self::Wreath => (0.1, 0.2),
            Self::Roofline => (0.15, 0.3),
            Self::Icicle => (0.25, 0.45),
            Self::TreeStar => (0.4, 0.7),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Light {
    pub fixture: Fixture,
    /// Position in surface-relative coordinates.
    pub position: Vec2,
    pub element: AnimatedElement,
}

/// A house front dressed in lights, with a picture window that cycles
/// through user media and optional falling snow.
#[derive(Debug)]
pub struct Holiday2d {
    canvas: Option<Canvas>,
    common: CommonOptions,
    rng: StdRng,
    lights: Vec<Light>,
    snow: Vec<Vec2>,
    show_snow: bool,
    media: MediaLibrary,
    media_interval: f64,
    last_skip: f64,
    hue: f32,
    bins: usize,
}

impl Holiday2d {
    pub fn new(surfaces: &mut dyn SurfaceProvider, ctx: &BuildContext) -> Result<Self> {
        let canvas = surfaces.acquire_canvas(ctx.size)?;
        let mut rng = StdRng::seed_from_u64(ctx.seed ^ 0x401);
        let snow = (0..SNOWFLAKES)
            .map(|_| Vec2::new(rng.random::<f32>(), rng.random::<f32>()))
            .collect();

        Ok(Self {
            canvas: Some(canvas),
            common: CommonOptions::default(),
            lights: layout(&mut rng),
            rng,
            snow,
            show_snow: true,
            media: MediaLibrary::new(ctx.loader.clone()),
            media_interval: DEFAULT_MEDIA_INTERVAL,
            last_skip: f64::NEG_INFINITY,
            hue: 0.0,
            bins: 0,
        })
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    fn retune(&mut self, bins: usize) {
        for light in &mut self.lights {
            let (low, high) = light.fixture.band();
            let last = bins.saturating_sub(1);
            let start = ((bins as f32 * low) as usize).min(last);
            let end = ((bins as f32 * high) as usize).clamp(start, last);
            light.element.reactive_band = (start, end);
        }
        self.bins = bins;
    }
}

/// Fixed scene graph of the house front.
fn layout(rng: &mut StdRng) -> Vec<Light> {
    let mut lights = Vec::new();
    let mut place = |fixture: Fixture, position: Vec2, phase: f32| {
        let element = AnimatedElement::new(fixture.pattern(), (0, 0))
            .with_affinity(fixture.affinity())
            .with_palette(ORNAMENT_PALETTE.len())
            .with_phase(phase);
        lights.push(Light {
            fixture,
            position,
            element,
        });
    };

    for i in 0..16 {
        let t = i as f32 / 15.0;
        // Roof peak at the centre.
        let y = 0.3 - (1.0 - (t - 0.5).abs() * 2.0) * 0.15;
        place(Fixture::Roofline, Vec2::new(0.2 + t * 0.6, y), t);
        place(Fixture::Icicle, Vec2::new(0.2 + t * 0.6, 0.32), t);
    }
    for (x, y) in [(0.3, 0.45), (0.7, 0.45)] {
        place(Fixture::Window, Vec2::new(x, y), 0.0);
    }
    for i in 0..10 {
        let x = if i < 5 { 0.12 + i as f32 * 0.02 } else { 0.78 + (i - 5) as f32 * 0.02 };
        place(Fixture::Bush, Vec2::new(x, 0.85 + rng.random::<f32>() * 0.05), 0.0);
    }
    for i in 0..8 {
        let angle = i as f32 / 8.0 * std::f32::consts::TAU;
        place(
            Fixture::Ornament,
            Vec2::new(0.9, 0.55) + Vec2::from_angle(angle) * Vec2::new(0.04, 0.07),
            i as f32 / 8.0,
        );
    }
    place(Fixture::Wreath, Vec2::new(0.5, 0.55), 0.0);
    place(Fixture::Garage, Vec2::new(0.65, 0.7), 0.0);
    place(Fixture::TreeStar, Vec2::new(0.9, 0.4), 0.0);
    lights
}

impl Visualization for Holiday2d {
    fn kind(&self) -> VisualizationKind {
        VisualizationKind::Holiday2d
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            media_items: true,
            camera_controls: false,
        }
    }

    fn configure(&mut self, options: &Options) {
        self.common.apply(options);
        if let Some(snow) = options.flag("snow") {
            self.show_snow = snow;
        }
        if let Some(interval) = options.number("mediaInterval") {
            self.media_interval = interval.max(0.5);
        }
    }

    fn update(&mut self, frame: &AnalysisFrame, ctx: &TickContext) -> Result<()> {
        if frame.bin_count() != self.bins {
            self.retune(frame.bin_count());
        }
        self.hue = ctx.hue;

        let onset = frame.has_onset();
        for light in &mut self.lights {
            PatternAnimator::step(&mut light.element, frame, ctx.time, &mut self.rng)?;
            if onset && light.fixture == Fixture::Ornament {
                PatternAnimator::trigger_boost(&mut light.element, ctx.time, 0.5, 1.3);
            }
        }

        if self.show_snow {
            let drift = frame.average_intensity * 0.1 * self.common.reactivity;
            let fall = ctx.dt as f32 * (0.03 + drift);
            for flake in &mut self.snow {
                flake.y += fall;
                if flake.y > 1.0 {
                    flake.y -= 1.0;
                    flake.x = self.rng.random::<f32>();
                }
            }
        }

        self.media.rotate(ctx.time, self.media_interval);
        if onset && frame.bass_energy > SKIP_BASS && ctx.time - self.last_skip >= SKIP_COOLDOWN {
            self.media.skip(ctx.time);
            self.last_skip = ctx.time;
        }
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let canvas = self.canvas.as_mut().ok_or_else(|| released("2d canvas"))?;
        let extent = canvas.size().extent();
        canvas.begin_frame(Color::rgb(0.02, 0.03, 0.08));

        let wall = Color::hsl(20.0, 0.25, 0.18).scaled(self.common.brightness);
        canvas.rect(Vec2::new(0.2, 0.3) * extent, Vec2::new(0.6, 0.6) * extent, wall);

        if let Some(item) = self.media.current() {
            let origin = Vec2::new(0.42, 0.38) * extent;
            let size = Vec2::new(0.16, 0.14) * extent;
            if item.is_loaded() {
                canvas.draw(DrawCommand::Media {
                    url: item.url.clone(),
                    origin,
                    size,
                    rotation: 0.0,
                });
            } else {
                canvas.draw(DrawCommand::Placeholder { origin, size });
            }
        }

        for light in &self.lights {
            let element = &light.element;
            // The chase lights the head of each roofline run.
            let chasing = light.fixture == Fixture::Roofline && element.state.position < 0.3;
            let base = if chasing {
                element.display_level().max(0.6)
            } else {
                element.display_level()
            };
            let level = base * self.common.brightness;
            let hue = match light.fixture {
                Fixture::Ornament => {
                    ORNAMENT_PALETTE[element.state.color_index % ORNAMENT_PALETTE.len()]
                }
                _ => self.hue,
            };
            let color = Color::hsl(hue, 0.9, 0.2 + level * 0.5);
            let center = light.position * extent;

            if light.fixture == Fixture::Icicle {
                let swing = (element.state.wave_position * std::f32::consts::TAU).sin();
                let drip = 6.0 + swing.abs() * 10.0;
                canvas.line(center, center + Vec2::new(0.0, drip), 1.5, color);
            } else {
                canvas.circle(center, 3.0 * element.state.scale, color);
            }
        }

        if self.show_snow {
            for flake in &self.snow {
                canvas.circle(*flake * extent, 1.2, Color::WHITE.with_alpha(0.8));
            }
        }

        canvas.present();
        Ok(())
    }

    fn destroy(&mut self) {
        self.canvas = None;
    }

    fn media_host(&mut self) -> Option<&mut dyn MediaHost> {
        Some(self)
    }
}

impl MediaHost for Holiday2d {
    fn set_media(&mut self, urls: &[String]) {
        self.media.set_urls(urls);
    }

    fn media(&self) -> &MediaLibrary {
        &self.media
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;
    use crate::visual::{testing, HeadlessSurfaces};
    use crate::{AssetLoader, OptionValue};

    struct InstantLoader;

    impl AssetLoader for InstantLoader {
        fn load(&self, _url: &str) -> Result<()> {
            Ok(())
        }
    }

    fn holiday() -> Holiday2d {
        Holiday2d::new(&mut HeadlessSurfaces::new(), &testing::build_context()).unwrap()
    }

    #[test]
    fn every_fixture_is_lit_by_its_own_pattern() {
        let holiday = holiday();
        for fixture in [
            Fixture::Roofline,
            Fixture::Window,
            Fixture::Bush,
            Fixture::Ornament,
            Fixture::Wreath,
            Fixture::Garage,
            Fixture::Icicle,
            Fixture::TreeStar,
        ] {
            let light = holiday
                .lights()
                .iter()
                .find(|light| light.fixture == fixture)
                .unwrap();
            assert_eq!(light.element.pattern, fixture.pattern());
        }
    }

    #[test]
    fn ornaments_pulse_on_beats() {
        let mut holiday = holiday();
        holiday.update(&testing::loud_frame("drums"), &testing::tick(0)).unwrap();
        let ornament = |h: &Holiday2d| {
            h.lights()
                .iter()
                .find(|l| l.fixture == Fixture::Ornament)
                .map(|l| l.element.state.scale)
                .unwrap()
        };
        assert_eq!(ornament(&holiday), 1.3);

        holiday.update(&testing::quiet_frame(), &testing::tick(40)).unwrap();
        assert_eq!(ornament(&holiday), 1.0);
    }

    #[test]
    fn pending_and_failed_media_draw_placeholders() {
        let mut holiday = holiday();
        holiday.set_media(&["/nonexistent/photo.png".to_string(), "notes.txt".to_string()]);
        assert_eq!(holiday.media().items().len(), 1);
        assert_eq!(holiday.media().rejected().len(), 1);

        testing::exercise(&mut holiday, 2);
        let canvas = holiday.canvas.as_ref().unwrap();
        assert!(canvas
            .commands()
            .iter()
            .any(|c| matches!(c, DrawCommand::Placeholder { .. })));
    }

    #[test]
    fn loaded_media_is_drawn_and_rotates() {
        let ctx = BuildContext {
            loader: Arc::new(InstantLoader),
            ..testing::build_context()
        };
        let mut holiday = Holiday2d::new(&mut HeadlessSurfaces::new(), &ctx).unwrap();
        holiday.configure(&Options::new().with("mediaInterval", OptionValue::Number(1.0)));
        holiday
            .media_host()
            .unwrap()
            .set_media(&["a.jpg".to_string(), "b.mp4".to_string()]);

        for _ in 0..200 {
            if holiday.media().items().iter().all(|item| item.is_loaded()) {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }

        holiday.update(&testing::quiet_frame(), &testing::tick(0)).unwrap();
        holiday.render().unwrap();
        let drawn = |h: &Holiday2d| {
            h.canvas
                .as_ref()
                .unwrap()
                .commands()
                .iter()
                .find_map(|c| match c {
                    DrawCommand::Media { url, .. } => Some(url.clone()),
                    _ => None,
                })
        };
        assert_eq!(drawn(&holiday).as_deref(), Some("a.jpg"));

        holiday.update(&testing::quiet_frame(), &testing::tick(61)).unwrap();
        holiday.render().unwrap();
        assert_eq!(drawn(&holiday).as_deref(), Some("b.mp4"));
        assert!(holiday.capabilities().media_items);

        holiday.destroy();
        holiday.destroy();
    }
}
