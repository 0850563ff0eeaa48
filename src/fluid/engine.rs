//! Physics engine capability.
//!
//! Scene setup, stepping and rendering only go through this trait, so the
//! in-crate [`World`](super::world::World) can be swapped for another engine
//! without touching the orchestration code.

use bevy::prelude::*;

use super::body::{Body, BodyDef};
use super::error::PhysicsError;
use super::params::ParticleSystemDef;
use super::particle::{ParticleDef, ParticleGroup, ParticleGroupDef};

/// Index of a body inside its world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub(crate) usize);

/// Index of a particle system inside its world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleSystemHandle(pub(crate) usize);

/// The operations the simulation needs from a physics engine.
pub trait PhysicsEngine {
    /// Gravity applied to every dynamic body and particle.
    fn gravity(&self) -> Vec2;

    /// Create a rigid body with a box shape.
    fn create_body(&mut self, def: &BodyDef) -> Result<BodyHandle, PhysicsError>;

    /// Look up a body.
    fn body(&self, handle: BodyHandle) -> Option<&Body>;

    /// Create an empty particle system.
    fn create_particle_system(
        &mut self,
        def: &ParticleSystemDef,
    ) -> Result<ParticleSystemHandle, PhysicsError>;

    /// Fill a shape with particles.
    fn create_particle_group(
        &mut self,
        system: ParticleSystemHandle,
        def: &ParticleGroupDef,
    ) -> Result<ParticleGroup, PhysicsError>;

    /// Create a single particle and return its index.
    fn create_particle(
        &mut self,
        system: ParticleSystemHandle,
        def: &ParticleDef,
    ) -> Result<usize, PhysicsError>;

    /// Advance the world by `dt` seconds.
    fn step(&mut self, dt: f32, velocity_iterations: u32, position_iterations: u32);

    /// Number of particles in a system, 0 for an unknown handle.
    fn particle_count(&self, system: ParticleSystemHandle) -> usize;

    /// Current particle positions, empty for an unknown handle.
    fn particle_positions(&self, system: ParticleSystemHandle) -> &[Vec2];
}
