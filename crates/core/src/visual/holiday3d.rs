use glam::Vec3;
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    mapping::hue_for_label, scene::split_bands, AnalysisFrame, AnimatedElement, InstrumentFigures,
    MediaLibrary, Options, Pattern, PatternAnimator, Result,
};

use super::{
    released, BuildContext, CameraControls, CameraPose, Capabilities, Color, CommonOptions,
    MediaHost, SceneNode, SceneSurface, SurfaceProvider, TickContext, Visualization,
    VisualizationKind,
};

const TREE_LIGHTS: usize = 60;
const TREE_HEIGHT: f32 = 4.0;
const TREE_RADIUS: f32 = 1.5;
const DEFAULT_MEDIA_INTERVAL: f64 = 8.0;

const DEFAULT_YAW: f32 = 0.0;
const DEFAULT_PITCH: f32 = 0.25;
const DEFAULT_DISTANCE: f32 = 9.0;
const PITCH_LIMIT: f32 = 1.4;
const MIN_DISTANCE: f32 = 3.0;
const MAX_DISTANCE: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct OrbitCamera {
    yaw: f32,
    pitch: f32,
    distance: f32,
    target: Vec3,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            yaw: DEFAULT_YAW,
            pitch: DEFAULT_PITCH,
            distance: DEFAULT_DISTANCE,
            target: Vec3::new(0.0, TREE_HEIGHT * 0.5, 0.0),
        }
    }
}

impl OrbitCamera {
    fn pose(&self) -> CameraPose {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        let offset = Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw) * self.distance;
        CameraPose {
            eye: self.target + offset,
            target: self.target,
        }
    }
}

/// Spiral light tree in a 3D scene. Instrument figures gather around the
/// tree while their source is heard, a billboard cycles user media, and the
/// camera orbits on request or on its own.
#[derive(Debug)]
pub struct Holiday3d {
    scene: Option<SceneSurface>,
    common: CommonOptions,
    rng: StdRng,
    lights: Vec<AnimatedElement>,
    figures: InstrumentFigures,
    camera: OrbitCamera,
    auto_rotate: bool,
    media: MediaLibrary,
    media_interval: f64,
    hue: f32,
    bins: usize,
}

impl Holiday3d {
    pub fn new(surfaces: &mut dyn SurfaceProvider, ctx: &BuildContext) -> Result<Self> {
        let scene = surfaces.acquire_scene(ctx.size)?;
        Ok(Self {
            scene: Some(scene),
            common: CommonOptions::default(),
            rng: StdRng::seed_from_u64(ctx.seed ^ 0x3D),
            lights: Vec::new(),
            figures: InstrumentFigures::new(),
            camera: OrbitCamera::default(),
            auto_rotate: true,
            media: MediaLibrary::new(ctx.loader.clone()),
            media_interval: DEFAULT_MEDIA_INTERVAL,
            hue: 0.0,
            bins: 0,
        })
    }

    fn rebuild(&mut self, bins: usize) {
        self.lights = split_bands(bins, TREE_LIGHTS, 0.7)
            .into_iter()
            .enumerate()
            .map(|(i, band)| {
                let pattern = Pattern::ALL[i % Pattern::ALL.len()];
                AnimatedElement::new(pattern, band)
                    .with_palette(4)
                    .with_phase(i as f32 / TREE_LIGHTS as f32)
            })
            .collect();
        self.bins = bins;
    }

    pub fn figures(&self) -> &InstrumentFigures {
        &self.figures
    }

    /// URL of the media item currently on the billboard, once loaded.
    pub fn billboard(&self) -> Option<&str> {
        self.media
            .current()
            .filter(|item| item.is_loaded())
            .map(|item| item.url.as_str())
    }
}

fn spiral_position(index: usize) -> Vec3 {
    let t = index as f32 / TREE_LIGHTS as f32;
    let angle = index as f32 * 0.5;
    let radius = (1.0 - t) * TREE_RADIUS;
    Vec3::new(angle.cos() * radius, t * TREE_HEIGHT, angle.sin() * radius)
}

impl Visualization for Holiday3d {
    fn kind(&self) -> VisualizationKind {
        VisualizationKind::Holiday3d
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            media_items: true,
            camera_controls: true,
        }
    }

    fn configure(&mut self, options: &Options) {
        self.common.apply(options);
        if let Some(auto_rotate) = options.flag("autoRotate") {
            self.auto_rotate = auto_rotate;
        }
        if let Some(interval) = options.number("mediaInterval") {
            self.media_interval = interval.max(0.5);
        }
    }

    fn update(&mut self, frame: &AnalysisFrame, ctx: &TickContext) -> Result<()> {
        if frame.bin_count() != self.bins {
            self.rebuild(frame.bin_count());
        }
        self.hue = ctx.hue;

        for light in &mut self.lights {
            PatternAnimator::step(light, frame, ctx.time, &mut self.rng)?;
        }
        self.figures.update(frame, ctx.time, &mut self.rng)?;

        if self.auto_rotate {
            let speed = 0.15 + frame.average_intensity * 0.3 * self.common.reactivity;
            self.camera.yaw =
                (self.camera.yaw + ctx.dt as f32 * speed).rem_euclid(std::f32::consts::TAU);
        }
        self.media.rotate(ctx.time, self.media_interval);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let scene = self.scene.as_mut().ok_or_else(|| released("3d scene"))?;
        scene.begin_frame(self.camera.pose());

        let count = self.lights.len().max(1) as f32;
        for (i, light) in self.lights.iter().enumerate() {
            let level = light.display_level() * self.common.brightness;
            let offset = match light.pattern {
                Pattern::Alternate => light.state.color_index as f32 / light.palette_len as f32,
                Pattern::Chase => light.state.position,
                Pattern::Wave => light.state.wave_position,
                _ => i as f32 / count,
            };
            scene.submit(SceneNode {
                position: spiral_position(i),
                scale: 0.08 * light.state.scale * (0.5 + level),
                color: self.common.theme.color(self.hue, offset, 0.2 + level * 0.5),
            });
        }

        for figure in self.figures.figures() {
            let x = figure.slot * 6.0 - 3.0;
            let level = figure.element.display_level() * self.common.brightness;
            scene.submit(SceneNode {
                position: Vec3::new(x, 0.5, TREE_RADIUS + 1.0),
                scale: 0.4 * (0.6 + level),
                color: Color::hsl(hue_for_label(&figure.label), 0.8, 0.5)
                    .with_alpha(figure.element.opacity),
            });
        }

        if let Some(item) = self.media.current() {
            let color = if item.is_loaded() {
                Color::WHITE
            } else {
                Color::rgb(0.3, 0.3, 0.3)
            };
            scene.submit(SceneNode {
                position: Vec3::new(0.0, TREE_HEIGHT * 0.6, -TREE_RADIUS - 2.0),
                scale: 2.0,
                color,
            });
        }

        scene.present();
        Ok(())
    }

    fn destroy(&mut self) {
        if self.scene.take().is_some() {
            tracing::debug!("holiday-3d released its scene");
        }
        self.figures.clear();
    }

    fn media_host(&mut self) -> Option<&mut dyn MediaHost> {
        Some(self)
    }

    fn camera_controls(&mut self) -> Option<&mut dyn CameraControls> {
        Some(self)
    }
}

impl MediaHost for Holiday3d {
    fn set_media(&mut self, urls: &[String]) {
        self.media.set_urls(urls);
    }

    fn media(&self) -> &MediaLibrary {
        &self.media
    }
}

impl CameraControls for Holiday3d {
    fn orbit(&mut self, yaw: f32, pitch: f32) {
        self.camera.yaw = (self.camera.yaw + yaw).rem_euclid(std::f32::consts::TAU);
        self.camera.pitch = (self.camera.pitch + pitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    fn zoom(&mut self, factor: f32) {
        if factor > 0.0 && factor.is_finite() {
            self.camera.distance = (self.camera.distance / factor).clamp(MIN_DISTANCE, MAX_DISTANCE);
        }
    }

    fn reset_camera(&mut self) {
        self.camera = OrbitCamera::default();
    }

    fn pose(&self) -> CameraPose {
        self.camera.pose()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;
    use crate::visual::{testing, HeadlessSurfaces};
    use crate::{AssetLoader, OptionValue, VisualizerError};

    fn holiday() -> Holiday3d {
        Holiday3d::new(&mut HeadlessSurfaces::new(), &testing::build_context()).unwrap()
    }

    #[test]
    fn needs_a_3d_context() {
        let err = Holiday3d::new(&mut HeadlessSurfaces::without_3d(), &testing::build_context())
            .unwrap_err();
        assert!(matches!(err, VisualizerError::SurfaceUnavailable { .. }));
    }

    #[test]
    fn tree_lights_and_figures_reach_the_scene() {
        let mut holiday = holiday();
        testing::exercise(&mut holiday, 6);

        assert_eq!(holiday.figures().len(), 1);
        assert_eq!(holiday.figures().figures()[0].label, "piano");
        let scene = holiday.scene.as_ref().unwrap();
        assert_eq!(scene.nodes().len(), TREE_LIGHTS + 1);
        assert!(scene.camera().is_some());
    }

    #[test]
    fn camera_orbits_zooms_and_resets() {
        let mut holiday = holiday();
        let start = holiday.pose();
        let controls = holiday.camera_controls().unwrap();

        controls.orbit(0.5, 10.0);
        controls.zoom(100.0);
        let moved = controls.pose();
        assert_ne!(moved.eye, start.eye);
        assert!(((moved.eye - moved.target).length() - MIN_DISTANCE).abs() < 1e-4);
        assert!(moved.eye.y > moved.target.y);

        controls.reset_camera();
        assert_eq!(controls.pose(), start);
    }

    #[test]
    fn auto_rotate_can_be_disabled() {
        let mut holiday = holiday();
        holiday.configure(&Options::new().with("autoRotate", OptionValue::Flag(false)));
        let start = holiday.pose();
        testing::exercise(&mut holiday, 10);
        assert_eq!(holiday.pose(), start);

        holiday.configure(&Options::new().with("autoRotate", OptionValue::Flag(true)));
        testing::exercise(&mut holiday, 10);
        assert_ne!(holiday.pose(), start);
    }

    #[test]
    fn billboard_shows_the_loaded_item() {
        struct InstantLoader;

        impl AssetLoader for InstantLoader {
            fn load(&self, _url: &str) -> Result<()> {
                Ok(())
            }
        }

        let ctx = BuildContext {
            loader: Arc::new(InstantLoader),
            ..testing::build_context()
        };
        let mut holiday = Holiday3d::new(&mut HeadlessSurfaces::new(), &ctx).unwrap();
        assert!(holiday.billboard().is_none());

        holiday
            .media_host()
            .unwrap()
            .set_media(&["tree.png".to_string(), "notes.txt".to_string()]);
        for _ in 0..200 {
            if holiday.billboard().is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(holiday.billboard(), Some("tree.png"));
        assert_eq!(holiday.media().rejected().len(), 1);
    }

    #[test]
    fn destroy_releases_the_scene() {
        let mut surfaces = HeadlessSurfaces::new();
        let live = surfaces.live_counter();
        let mut holiday = Holiday3d::new(&mut surfaces, &testing::build_context()).unwrap();
        assert!(holiday.capabilities().camera_controls);
        assert_eq!(live.get(), 1);

        holiday.destroy();
        holiday.destroy();
        assert_eq!(live.get(), 0);
        assert!(holiday.render().is_err());
    }
}
