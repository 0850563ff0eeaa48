//! Errors reported by the physics engine.

use bevy::prelude::*;
use thiserror::Error;

use super::engine::ParticleSystemHandle;

/// Precondition failures surfaced by [`PhysicsEngine`](super::engine::PhysicsEngine)
/// creation calls. Stepping never fails.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    #[error("box half extents must be positive and finite, got {0}")]
    InvalidShape(Vec2),
    #[error("body position and velocity must be finite, got position {position} velocity {velocity}")]
    InvalidBody { position: Vec2, velocity: Vec2 },
    #[error("invalid particle system definition: {0}")]
    InvalidParticleSystem(&'static str),
    #[error("unknown particle system {0:?}")]
    UnknownParticleSystem(ParticleSystemHandle),
    #[error("particle group at {position} with half extents {half_extents} produced no particles")]
    EmptyParticleGroup { position: Vec2, half_extents: Vec2 },
    #[error("particle system is full ({0} particles)")]
    ParticleCapacity(usize),
}
