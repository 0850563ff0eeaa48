//! Fluid rendering.
//!
//! The [`RenderAdapter`] turns the simulation state into a flat list of
//! colored pixel rectangles and hands them to a [`Surface`]. The adapter only
//! reads the simulation. [`PixelCanvas`] is the CPU surface whose bytes the
//! Bevy front end uploads into a texture each frame.

use bevy::color::ColorToPacked;
use bevy::prelude::*;
use bytemuck::{Pod, Zeroable};

use super::engine::PhysicsEngine;
use super::params::ViewParams;
use super::simulation::Simulation;

/// Axis-aligned rectangle in screen pixels, y pointing down.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelRect {
    pub min: Vec2,
    pub size: Vec2,
}

impl PixelRect {
    /// Rectangle of `size` pixels centered on `center`.
    pub fn centered(center: Vec2, size: Vec2) -> Self {
        Self {
            min: center - size / 2.0,
            size,
        }
    }

    pub fn max(&self) -> Vec2 {
        self.min + self.size
    }
}

/// One filled rectangle to draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCommand {
    pub rect: PixelRect,
    pub color: Color,
}

/// Something rectangles can be drawn on.
pub trait Surface {
    /// Width and height in pixels.
    fn size(&self) -> UVec2;

    fn clear(&mut self, color: Color);

    fn fill_rect(&mut self, rect: PixelRect, color: Color);

    /// Finish the frame.
    fn present(&mut self);
}

/// Maps world state to screen primitives.
#[derive(Clone, Debug)]
pub struct RenderAdapter {
    view: ViewParams,
}

impl RenderAdapter {
    pub fn new(view: ViewParams) -> Self {
        Self { view }
    }

    pub fn view(&self) -> &ViewParams {
        &self.view
    }

    /// World units to screen pixels. Both use y pointing down.
    pub fn world_to_screen(&self, position: Vec2) -> Vec2 {
        position * self.view.pixels_per_unit
    }

    /// Everything to draw for the current state: particles first, then the
    /// static container on top.
    pub fn draw_list<E: PhysicsEngine>(&self, simulation: &Simulation<E>) -> Vec<DrawCommand> {
        let positions = simulation.particle_positions();
        let mut commands = Vec::with_capacity(positions.len() + 3);
        let particle_size = Vec2::splat(self.view.particle_size);

        commands.extend(positions.iter().map(|&p| DrawCommand {
            rect: PixelRect::centered(self.world_to_screen(p), particle_size),
            color: self.view.water_color,
        }));

        commands.extend(simulation.static_bodies().map(|body| {
            let min = self.world_to_screen(body.min());
            let max = self.world_to_screen(body.max());
            DrawCommand {
                rect: PixelRect { min, size: max - min },
                color: self.view.boundary_color,
            }
        }));

        commands
    }

    /// Clear, draw the current state and present.
    pub fn draw<E: PhysicsEngine, S: Surface>(&self, simulation: &Simulation<E>, surface: &mut S) {
        surface.clear(self.view.background_color);
        for command in self.draw_list(simulation) {
            surface.fill_rect(command.rect, command.color);
        }
        surface.present();
    }
}

/// A pixel in 8-bit sRGB with alpha.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Rgba8(pub [u8; 4]);

impl From<Color> for Rgba8 {
    fn from(color: Color) -> Self {
        Self(color.to_srgba().to_u8_array())
    }
}

/// CPU-side RGBA8 framebuffer.
#[derive(Clone, Debug)]
pub struct PixelCanvas {
    size: UVec2,
    pixels: Vec<Rgba8>,
    presented: u64,
}

impl PixelCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: UVec2::new(width, height),
            pixels: vec![Rgba8::default(); (width * height) as usize],
            presented: 0,
        }
    }

    /// Raw bytes in row-major RGBA8 order.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        if x >= self.size.x || y >= self.size.y {
            return None;
        }
        Some(self.pixels[(y * self.size.x + x) as usize])
    }

    /// Number of frames presented so far.
    pub fn presented_frames(&self) -> u64 {
        self.presented
    }
}

impl Surface for PixelCanvas {
    fn size(&self) -> UVec2 {
        self.size
    }

    fn clear(&mut self, color: Color) {
        self.pixels.fill(color.into());
    }

    fn fill_rect(&mut self, rect: PixelRect, color: Color) {
        let limit = self.size.as_ivec2();
        let min = rect.min.round().as_ivec2().clamp(IVec2::ZERO, limit);
        let max = rect.max().round().as_ivec2().clamp(IVec2::ZERO, limit);
        if min.x >= max.x || min.y >= max.y {
            return;
        }

        let pixel = Rgba8::from(color);
        let width = self.size.x as usize;
        for y in min.y as usize..max.y as usize {
            let row = y * width;
            self.pixels[row + min.x as usize..row + max.x as usize].fill(pixel);
        }
    }

    fn present(&mut self) {
        self.presented += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::params::SceneParams;
    use crate::fluid::particle::ParticleGroupDef;

    fn small_scene() -> Simulation {
        let params = SceneParams::default()
            .with_fluid(ParticleGroupDef::water_box(Vec2::splat(0.05), Vec2::new(4.0, 1.0)));
        Simulation::new(&params).unwrap()
    }

    #[test]
    fn test_world_to_screen() {
        let adapter = RenderAdapter::new(ViewParams::default());
        assert_eq!(adapter.world_to_screen(Vec2::new(4.0, 1.0)), Vec2::new(400.0, 100.0));
    }

    #[test]
    fn test_draw_list_layout() {
        let sim = small_scene();
        let adapter = RenderAdapter::new(ViewParams::default());
        let commands = adapter.draw_list(&sim);

        assert_eq!(commands.len(), sim.particle_count() + 3);
        let water = Color::srgb_u8(0, 191, 255);
        for command in &commands[..sim.particle_count()] {
            assert_eq!(command.color, water);
            assert_eq!(command.rect.size, Vec2::splat(2.0));
        }

        let ground = commands[sim.particle_count()];
        assert_eq!(ground.color, Color::srgb_u8(255, 204, 0));
        assert!(ground.rect.min.abs_diff_eq(Vec2::new(0.0, 540.0), 1e-3));
        assert!(ground.rect.size.abs_diff_eq(Vec2::new(800.0, 20.0), 1e-3));
    }

    #[test]
    fn test_draw_does_not_touch_simulation() {
        let sim = small_scene();
        let before = sim.particle_positions().to_vec();
        let adapter = RenderAdapter::new(ViewParams::default());
        let mut canvas = PixelCanvas::new(800, 600);

        adapter.draw(&sim, &mut canvas);

        assert_eq!(sim.particle_positions(), before.as_slice());
        assert_eq!(sim.frame(), 0);
        assert_eq!(canvas.presented_frames(), 1);
    }

    #[test]
    fn test_canvas_draws_scene() {
        let sim = small_scene();
        let adapter = RenderAdapter::new(ViewParams::default());
        let mut canvas = PixelCanvas::new(800, 600);

        adapter.draw(&sim, &mut canvas);

        let white = Rgba8([255, 255, 255, 255]);
        let yellow = Rgba8([255, 204, 0, 255]);
        assert_eq!(canvas.pixel(300, 300), Some(white));
        assert_eq!(canvas.pixel(400, 550), Some(yellow));
        assert_eq!(canvas.pixel(5, 300), Some(yellow));
        // Lattice point (3.99, 0.99) lands on pixels 398..400.
        assert_eq!(canvas.pixel(399, 99), Some(Rgba8([0, 191, 255, 255])));
    }

    #[test]
    fn test_fill_rect_clips_to_canvas() {
        let mut canvas = PixelCanvas::new(4, 4);
        canvas.clear(Color::BLACK);
        canvas.fill_rect(
            PixelRect {
                min: Vec2::new(-2.0, 3.0),
                size: Vec2::new(4.0, 10.0),
            },
            Color::WHITE,
        );

        assert_eq!(canvas.pixel(0, 3), Some(Rgba8([255; 4])));
        assert_eq!(canvas.pixel(1, 3), Some(Rgba8([255; 4])));
        assert_eq!(canvas.pixel(2, 3), Some(Rgba8([0, 0, 0, 255])));
        assert_eq!(canvas.pixel(0, 2), Some(Rgba8([0, 0, 0, 255])));
        assert_eq!(canvas.pixel(4, 0), None);
        assert_eq!(canvas.as_bytes().len(), 4 * 4 * 4);
    }
}
