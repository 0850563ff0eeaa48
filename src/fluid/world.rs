//! The in-crate physics world: rigid boxes plus PBF particle systems.

use bevy::prelude::*;

use super::body::{Body, BodyDef};
use super::contact::{step_bodies, BodyContact};
use super::engine::{BodyHandle, ParticleSystemHandle, PhysicsEngine};
use super::error::PhysicsError;
use super::params::ParticleSystemDef;
use super::particle::{ParticleDef, ParticleGroup, ParticleGroupDef, ParticleSystem};

/// Owns every body and particle system. Handles are indices and stay valid
/// for the lifetime of the world, nothing is ever destroyed.
#[derive(Debug)]
pub struct World {
    gravity: Vec2,
    bodies: Vec<Body>,
    particle_systems: Vec<ParticleSystem>,
    body_contacts: Vec<BodyContact>,
}

impl World {
    pub fn new(gravity: Vec2) -> Self {
        Self {
            gravity,
            bodies: Vec::new(),
            particle_systems: Vec::new(),
            body_contacts: Vec::new(),
        }
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn particle_system(&self, handle: ParticleSystemHandle) -> Option<&ParticleSystem> {
        self.particle_systems.get(handle.0)
    }

    /// Body pairs in contact during the last step.
    pub fn body_contacts(&self) -> &[BodyContact] {
        &self.body_contacts
    }

    fn particle_system_mut(
        &mut self,
        handle: ParticleSystemHandle,
    ) -> Result<&mut ParticleSystem, PhysicsError> {
        self.particle_systems
            .get_mut(handle.0)
            .ok_or(PhysicsError::UnknownParticleSystem(handle))
    }
}

impl PhysicsEngine for World {
    fn gravity(&self) -> Vec2 {
        self.gravity
    }

    fn create_body(&mut self, def: &BodyDef) -> Result<BodyHandle, PhysicsError> {
        if !def.shape.is_valid() {
            return Err(PhysicsError::InvalidShape(def.shape.half_extents));
        }
        if !(def.position.is_finite() && def.linear_velocity.is_finite()) {
            return Err(PhysicsError::InvalidBody {
                position: def.position,
                velocity: def.linear_velocity,
            });
        }

        self.bodies.push(Body::from_def(def));
        Ok(BodyHandle(self.bodies.len() - 1))
    }

    fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle.0)
    }

    fn create_particle_system(
        &mut self,
        def: &ParticleSystemDef,
    ) -> Result<ParticleSystemHandle, PhysicsError> {
        let system = ParticleSystem::new(def.clone())?;
        self.particle_systems.push(system);
        Ok(ParticleSystemHandle(self.particle_systems.len() - 1))
    }

    fn create_particle_group(
        &mut self,
        system: ParticleSystemHandle,
        def: &ParticleGroupDef,
    ) -> Result<ParticleGroup, PhysicsError> {
        if !def.shape.is_valid() {
            return Err(PhysicsError::InvalidShape(def.shape.half_extents));
        }
        self.particle_system_mut(system)?.create_group(def)
    }

    fn create_particle(
        &mut self,
        system: ParticleSystemHandle,
        def: &ParticleDef,
    ) -> Result<usize, PhysicsError> {
        self.particle_system_mut(system)?.create_particle(def)
    }

    fn step(&mut self, dt: f32, velocity_iterations: u32, position_iterations: u32) {
        if !(dt > 0.0) {
            return;
        }

        step_bodies(
            &mut self.bodies,
            &mut self.body_contacts,
            self.gravity,
            dt,
            velocity_iterations,
            position_iterations,
        );

        for system in &mut self.particle_systems {
            system.step(&mut self.bodies, self.gravity, dt, position_iterations);
        }
    }

    fn particle_count(&self, system: ParticleSystemHandle) -> usize {
        self.particle_system(system).map_or(0, ParticleSystem::len)
    }

    fn particle_positions(&self, system: ParticleSystemHandle) -> &[Vec2] {
        match self.particle_system(system) {
            Some(system) => system.positions(),
            None => &[],
        }
    }
}
