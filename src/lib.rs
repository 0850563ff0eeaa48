//! Liquidbox - real-time 2D liquid simulation for Bevy
//!
//! A block of water particles falls into a container made of a static
//! ground and two walls. Rigid boxes and Position Based Fluids (PBF)
//! particles are stepped at a fixed rate and drawn into an 800×600 pixel
//! canvas shown in a Bevy window.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use bevy::prelude::*;
//! use liquidbox::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins(DefaultPlugins)
//!         .add_plugins(LiquidPlugin::default())
//!         .run();
//! }
//! ```
//!
//! The simulation can also be driven without Bevy's app loop:
//!
//! ```rust,no_run
//! use liquidbox::prelude::*;
//!
//! let params = SceneParams::default();
//! let mut simulation = Simulation::new(&params).unwrap();
//! let renderer = RenderAdapter::new(params.view.clone());
//! let mut canvas = PixelCanvas::new(params.view.width, params.view.height);
//!
//! FrameLoop::new(params.view.frame_interval).run(
//!     &mut FrameBudget::new(120),
//!     &mut simulation,
//!     &renderer,
//!     &mut canvas,
//! );
//! ```
//!
//! # Architecture
//!
//! - [`fluid`]: Core simulation module
//!   - [`fluid::engine`]: Physics engine capability
//!   - [`fluid::scene`]: World builder and fluid seeder
//!   - [`fluid::simulation`]: Fixed-step stepper
//!   - [`fluid::frame_loop`]: Frame loop controller
//!   - [`fluid::render`]: Render adapter and pixel canvas
//!   - [`fluid::plugin`]: Bevy plugin

pub mod fluid;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::fluid::prelude::*;
}
