//! 2D liquid particles and rigid boxes for Bevy.
//!
//! # Architecture
//!
//! The simulation is structured in the following components:
//!
//! - [`engine`]: The [`PhysicsEngine`](engine::PhysicsEngine) capability the
//!   rest of the crate is written against
//! - [`world`]: The in-crate engine
//! - [`body`]: Rigid boxes and particle-vs-box collision
//! - [`contact`]: Sequential impulse solver for box contacts
//! - [`particle`]: Particle systems, flags and group packing
//! - [`spatial`]: Spatial hashing for efficient neighbor search
//! - [`solver`]: PBF constraint solver (density constraints)
//! - [`scene`]: Ground, walls and the initial fluid block
//! - [`simulation`]: Fixed-step stepper owning the engine
//! - [`frame_loop`]: Event polling and pacing
//! - [`render`]: Mapping simulation state to pixel rectangles
//! - [`plugin`]: Bevy plugin for easy integration
//! - [`params`]: Simulation parameters (density, viscosity, etc.)

pub mod body;
pub mod contact;
pub mod engine;
pub mod error;
pub mod frame_loop;
pub mod params;
pub mod particle;
pub mod plugin;
pub mod render;
pub mod scene;
pub mod simulation;
pub mod solver;
pub mod spatial;
pub mod world;

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::body::{Body, BodyDef, BodyKind, BoxShape};
    pub use super::engine::*;
    pub use super::error::PhysicsError;
    pub use super::frame_loop::*;
    pub use super::params::*;
    pub use super::particle::*;
    pub use super::plugin::*;
    pub use super::render::*;
    pub use super::scene::*;
    pub use super::simulation::*;
}
