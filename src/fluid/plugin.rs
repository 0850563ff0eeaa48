//! Bevy plugin for the liquid scene.

use bevy::{
    asset::RenderAssetUsages,
    image::ImageSampler,
    prelude::*,
    render::render_resource::{Extent3d, TextureDimension, TextureFormat},
    window::WindowCloseRequested,
    winit::{UpdateMode, WinitSettings},
};

use super::frame_loop::{FrameLoop, LoopEvent, LoopState, PendingEvents};
use super::params::SceneParams;
use super::render::{PixelCanvas, RenderAdapter, Surface};
use super::simulation::Simulation;

/// Plugin that builds the liquid scene at startup and runs one frame of it
/// per app update, presenting the result as a full-window sprite.
///
/// # Example
///
/// ```rust,ignore
/// use bevy::prelude::*;
/// use liquidbox::prelude::*;
///
/// fn main() {
///     App::new()
///         .add_plugins(DefaultPlugins)
///         .add_plugins(LiquidPlugin::with_params(SceneParams::viscous()))
///         .run();
/// }
/// ```
#[derive(Default)]
pub struct LiquidPlugin {
    params: SceneParams,
}

impl LiquidPlugin {
    pub fn with_params(params: SceneParams) -> Self {
        Self { params }
    }
}

impl Plugin for LiquidPlugin {
    fn build(&self, app: &mut App) {
        // Register types for reflection
        app.register_type::<SceneParams>();

        let frame_interval = self.params.view.frame_interval;
        app.insert_resource(self.params.clone())
            .insert_resource(WinitSettings {
                focused_mode: UpdateMode::reactive(frame_interval),
                unfocused_mode: UpdateMode::reactive(frame_interval),
            });

        app.add_systems(Startup, setup_scene)
            .add_systems(Update, run_frame);
    }
}

/// Everything the frame system drives.
#[derive(Resource)]
pub struct LiquidScene {
    pub simulation: Simulation,
    pub frame_loop: FrameLoop,
    pub renderer: RenderAdapter,
    pub canvas: PixelCanvas,
    pub events: PendingEvents,
}

/// Texture the canvas is uploaded to.
#[derive(Resource, Clone, Debug)]
pub struct FrameImage(pub Handle<Image>);

/// Creates a 2D texture holding the canvas pixels
pub fn create_canvas_texture(images: &mut Assets<Image>, canvas: &PixelCanvas) -> Handle<Image> {
    let size = canvas.size();
    let extent = Extent3d {
        width: size.x,
        height: size.y,
        depth_or_array_layers: 1,
    };

    let mut image = Image::new(
        extent,
        TextureDimension::D2,
        canvas.as_bytes().to_vec(),
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
    );
    // Particles are 2 px squares, keep them crisp.
    image.sampler = ImageSampler::nearest();

    images.add(image)
}

fn setup_scene(
    mut commands: Commands,
    params: Res<SceneParams>,
    mut images: ResMut<Assets<Image>>,
    mut exit: MessageWriter<AppExit>,
) {
    let simulation = match Simulation::new(&params) {
        Ok(simulation) => simulation,
        Err(err) => {
            error!("Failed to build the liquid scene: {err}");
            exit.write(AppExit::error());
            return;
        }
    };

    let view = &params.view;
    let renderer = RenderAdapter::new(view.clone());
    let mut canvas = PixelCanvas::new(view.width, view.height);
    renderer.draw(&simulation, &mut canvas);
    let image = create_canvas_texture(&mut images, &canvas);

    commands.spawn(Camera2d);
    commands.spawn(Sprite::from_image(image.clone()));
    commands.insert_resource(FrameImage(image));
    commands.insert_resource(LiquidScene {
        simulation,
        frame_loop: FrameLoop::new(view.frame_interval),
        renderer,
        canvas,
        events: PendingEvents::default(),
    });
}

/// System to run one frame of the scene and upload the result.
fn run_frame(
    scene: Option<ResMut<LiquidScene>>,
    frame_image: Option<Res<FrameImage>>,
    mut images: ResMut<Assets<Image>>,
    mut close_requests: MessageReader<WindowCloseRequested>,
    mut exit: MessageWriter<AppExit>,
) {
    let (Some(mut scene), Some(frame_image)) = (scene, frame_image) else {
        return;
    };
    let scene = &mut *scene;

    for _ in close_requests.read() {
        scene.events.push(LoopEvent::Quit);
    }

    let was_running = scene.frame_loop.is_running();
    let state = scene.frame_loop.run_frame(
        &mut scene.events,
        &mut scene.simulation,
        &scene.renderer,
        &mut scene.canvas,
    );
    if !was_running {
        return;
    }
    if state == LoopState::Stopped {
        exit.write(AppExit::Success);
    }

    if let Some(image) = images.get_mut(&frame_image.0) {
        match image.data.as_mut() {
            Some(data) if data.len() == scene.canvas.as_bytes().len() => {
                data.copy_from_slice(scene.canvas.as_bytes());
            }
            _ => image.data = Some(scene.canvas.as_bytes().to_vec()),
        }
    }
}
