//! Liquidbox - a block of water collapsing into a box.

use bevy::prelude::*;
use bevy::window::WindowResolution;
use liquidbox::prelude::*;

fn main() -> AppExit {
    let params = SceneParams::water();
    let view = &params.view;

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: view.title.clone(),
                resolution: WindowResolution::new(view.width, view.height),
                resizable: false,
                ..default()
            }),
            // The frame loop decides when to stop.
            close_when_requested: false,
            ..default()
        }))
        .add_plugins(LiquidPlugin::with_params(params.clone()))
        .run()
}
