//! Fluid simulation core logic.
//!
//! [`Simulation`] owns the physics engine together with the handles of the
//! scene it built, and advances it by a fixed time quantum.

use bevy::prelude::*;

use super::body::Body;
use super::engine::{ParticleSystemHandle, PhysicsEngine};
use super::error::PhysicsError;
use super::params::{SceneParams, StepConfig};
use super::particle::ParticleGroup;
use super::scene::{build_boundaries, seed_fluid, BoundaryLayout, Boundaries};
use super::world::World;

/// The running scene: engine, container, fluid and step bookkeeping.
#[derive(Debug)]
pub struct Simulation<E: PhysicsEngine = World> {
    engine: E,
    layout: BoundaryLayout,
    boundaries: Boundaries,
    particle_system: ParticleSystemHandle,
    fluid: Option<ParticleGroup>,
    config: StepConfig,
    frame: u64,
    time: f32,
}

impl Simulation<World> {
    /// Build the default engine and the scene described by `params`.
    pub fn new(params: &SceneParams) -> Result<Self, PhysicsError> {
        Self::with_engine(World::new(params.gravity), params)
    }
}

impl<E: PhysicsEngine> Simulation<E> {
    /// Build the scene inside an existing engine.
    ///
    /// Failing to create the container or the particle system is fatal;
    /// failing to seed the fluid only leaves the scene empty.
    pub fn with_engine(mut engine: E, params: &SceneParams) -> Result<Self, PhysicsError> {
        let layout = BoundaryLayout::for_playfield(params.view.world_size());
        let boundaries = build_boundaries(&mut engine, &layout)?;
        let particle_system = engine.create_particle_system(&params.particles)?;
        let fluid = seed_fluid(&mut engine, particle_system, &params.fluid);

        info!(
            "Scene ready: playfield {}, gravity {}, {} particles",
            params.view.world_size(),
            engine.gravity(),
            engine.particle_count(particle_system)
        );

        Ok(Self {
            engine,
            layout,
            boundaries,
            particle_system,
            fluid,
            config: params.step,
            frame: 0,
            time: 0.0,
        })
    }

    /// Advance the world by one fixed time step.
    pub fn step(&mut self) {
        self.engine.step(
            self.config.time_step,
            self.config.velocity_iterations,
            self.config.position_iterations,
        );
        self.frame += 1;
        self.time += self.config.time_step;
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn layout(&self) -> &BoundaryLayout {
        &self.layout
    }

    pub fn boundaries(&self) -> &Boundaries {
        &self.boundaries
    }

    pub fn particle_system(&self) -> ParticleSystemHandle {
        self.particle_system
    }

    /// The group seeded at startup, if seeding succeeded.
    pub fn fluid(&self) -> Option<&ParticleGroup> {
        self.fluid.as_ref()
    }

    pub fn config(&self) -> &StepConfig {
        &self.config
    }

    /// Number of steps taken.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Simulated seconds elapsed.
    pub fn elapsed(&self) -> f32 {
        self.time
    }

    pub fn particle_count(&self) -> usize {
        self.engine.particle_count(self.particle_system)
    }

    pub fn particle_positions(&self) -> &[Vec2] {
        self.engine.particle_positions(self.particle_system)
    }

    /// The static container bodies: ground, left wall, right wall.
    pub fn static_bodies(&self) -> impl Iterator<Item = &Body> {
        self.boundaries
            .handles()
            .into_iter()
            .filter_map(|handle| self.engine.body(handle))
            .filter(|body| body.is_static())
    }
}
