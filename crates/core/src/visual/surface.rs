use std::{cell::Cell, rc::Rc};

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::{Result, VisualizerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width as f32 * 0.5, self.height as f32 * 0.5)
    }

    pub fn extent(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Half of the shorter side.
    pub fn radius(&self) -> f32 {
        self.width.min(self.height) as f32 * 0.5
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// `hue` in degrees, `saturation` and `lightness` in [0, 1].
    pub fn hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let h = hue.rem_euclid(360.0) / 60.0;
        let s = saturation.clamp(0.0, 1.0);
        let l = lightness.clamp(0.0, 1.0);
        let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = l - c * 0.5;
        Self::rgb(r + m, g + m, b + m)
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.a = alpha.clamp(0.0, 1.0);
        self
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self {
            r: (self.r * factor).clamp(0.0, 1.0),
            g: (self.g * factor).clamp(0.0, 1.0),
            b: (self.b * factor).clamp(0.0, 1.0),
            a: self.a,
        }
    }
}

/// Primitive recorded on a 2D canvas. Rasterisation happens outside the
/// engine.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Color),
    Rect {
        origin: Vec2,
        size: Vec2,
        color: Color,
    },
    Circle {
        center: Vec2,
        radius: f32,
        color: Color,
    },
    Line {
        from: Vec2,
        to: Vec2,
        width: f32,
        color: Color,
    },
    Polyline {
        points: Vec<Vec2>,
        width: f32,
        color: Color,
    },
    Media {
        url: String,
        origin: Vec2,
        size: Vec2,
        rotation: f32,
    },
    /// Stand-in for a media item that failed or has not finished loading.
    Placeholder { origin: Vec2, size: Vec2 },
}

/// Counts surfaces that are currently held by a renderer.
#[derive(Debug)]
struct Lease {
    live: Rc<Cell<usize>>,
}

impl Lease {
    fn new(live: Rc<Cell<usize>>) -> Self {
        live.set(live.get() + 1);
        Self { live }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.live.set(self.live.get().saturating_sub(1));
    }
}

/// 2D drawing surface that records one frame of commands at a time.
#[derive(Debug)]
pub struct Canvas {
    size: SurfaceSize,
    commands: Vec<DrawCommand>,
    frames: u64,
    _lease: Lease,
}

impl Canvas {
    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn begin_frame(&mut self, background: Color) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear(background));
    }

    pub fn draw(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn rect(&mut self, origin: Vec2, size: Vec2, color: Color) {
        self.draw(DrawCommand::Rect {
            origin,
            size,
            color,
        });
    }

    pub fn circle(&mut self, center: Vec2, radius: f32, color: Color) {
        self.draw(DrawCommand::Circle {
            center,
            radius,
            color,
        });
    }

    pub fn line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color) {
        self.draw(DrawCommand::Line {
            from,
            to,
            width,
            color,
        });
    }

    pub fn present(&mut self) {
        self.frames += 1;
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Node submitted to a 3D scene for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub position: Vec3,
    pub scale: f32,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub eye: Vec3,
    pub target: Vec3,
}

/// 3D scene surface that records the nodes and camera for one frame.
#[derive(Debug)]
pub struct SceneSurface {
    size: SurfaceSize,
    nodes: Vec<SceneNode>,
    camera: Option<CameraPose>,
    frames: u64,
    _lease: Lease,
}

impl SceneSurface {
    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn begin_frame(&mut self, camera: CameraPose) {
        self.nodes.clear();
        self.camera = Some(camera);
    }

    pub fn submit(&mut self, node: SceneNode) {
        self.nodes.push(node);
    }

    pub fn present(&mut self) {
        self.frames += 1;
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn camera(&self) -> Option<CameraPose> {
        self.camera
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Hands out drawing surfaces to renderers.
pub trait SurfaceProvider {
    fn acquire_canvas(&mut self, size: SurfaceSize) -> Result<Canvas>;
    fn acquire_scene(&mut self, size: SurfaceSize) -> Result<SceneSurface>;
}

/// In-memory surfaces for headless runs. 3D support can be switched off to
/// mimic a host without a graphics context.
#[derive(Debug)]
pub struct HeadlessSurfaces {
    supports_3d: bool,
    live: Rc<Cell<usize>>,
}

impl HeadlessSurfaces {
    pub fn new() -> Self {
        Self {
            supports_3d: true,
            live: Rc::new(Cell::new(0)),
        }
    }

    pub fn without_3d() -> Self {
        Self {
            supports_3d: false,
            ..Self::new()
        }
    }

    /// Number of surfaces that have been acquired and not yet dropped.
    pub fn live_counter(&self) -> Rc<Cell<usize>> {
        self.live.clone()
    }

    fn check(size: SurfaceSize, surface: &'static str) -> Result<()> {
        if size.width == 0 || size.height == 0 {
            return Err(VisualizerError::surface_unavailable(
                surface,
                format!("zero-sized target {}x{}", size.width, size.height),
            ));
        }
        Ok(())
    }
}

impl Default for HeadlessSurfaces {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceProvider for HeadlessSurfaces {
    fn acquire_canvas(&mut self, size: SurfaceSize) -> Result<Canvas> {
        Self::check(size, "2d canvas")?;
        Ok(Canvas {
            size,
            commands: Vec::new(),
            frames: 0,
            _lease: Lease::new(self.live.clone()),
        })
    }

    fn acquire_scene(&mut self, size: SurfaceSize) -> Result<SceneSurface> {
        Self::check(size, "3d scene")?;
        if !self.supports_3d {
            return Err(VisualizerError::surface_unavailable(
                "3d scene",
                "no 3d graphics context available",
            ));
        }
        Ok(SceneSurface {
            size,
            nodes: Vec::new(),
            camera: None,
            frames: 0,
            _lease: Lease::new(self.live.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsl_primaries() {
        let red = Color::hsl(0.0, 1.0, 0.5);
        assert!((red.r - 1.0).abs() < 1e-6 && red.g.abs() < 1e-6 && red.b.abs() < 1e-6);
        let blue = Color::hsl(240.0, 1.0, 0.5);
        assert!((blue.b - 1.0).abs() < 1e-6 && blue.r.abs() < 1e-6);
        let grey = Color::hsl(123.0, 0.0, 0.5);
        assert!((grey.r - 0.5).abs() < 1e-6 && (grey.g - 0.5).abs() < 1e-6);
    }

    #[test]
    fn leases_track_live_surfaces() {
        let mut surfaces = HeadlessSurfaces::new();
        let live = surfaces.live_counter();
        let canvas = surfaces.acquire_canvas(SurfaceSize::new(10, 10)).unwrap();
        let scene = surfaces.acquire_scene(SurfaceSize::new(10, 10)).unwrap();
        assert_eq!(live.get(), 2);
        drop(canvas);
        assert_eq!(live.get(), 1);
        drop(scene);
        assert_eq!(live.get(), 0);
    }

    #[test]
    fn unavailable_surfaces_are_reported() {
        let mut surfaces = HeadlessSurfaces::without_3d();
        let err = surfaces.acquire_scene(SurfaceSize::new(10, 10)).unwrap_err();
        assert!(matches!(err, VisualizerError::SurfaceUnavailable { .. }));
        assert!(surfaces.acquire_canvas(SurfaceSize::new(0, 10)).is_err());
    }

    #[test]
    fn frame_recording_resets_per_frame() {
        let mut surfaces = HeadlessSurfaces::new();
        let mut canvas = surfaces.acquire_canvas(SurfaceSize::new(4, 4)).unwrap();
        canvas.begin_frame(Color::BLACK);
        canvas.circle(Vec2::ZERO, 1.0, Color::WHITE);
        canvas.present();
        canvas.begin_frame(Color::BLACK);
        assert_eq!(canvas.commands().len(), 1);
        assert_eq!(canvas.frames(), 1);
    }
}
