//! Simulation parameters.
//!
//! These parameters control the world, the particle solver and the way the
//! result is drawn. They are registered as Bevy resources so they can be
//! inspected at runtime, but are only read once when the scene is built.

use std::time::Duration;

use bevy::prelude::*;

use super::body::BoxShape;
use super::particle::{ParticleFlags, ParticleGroupDef};

/// Fixed time quantum and solver budgets used for every step of a run.
#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct StepConfig {
    /// Simulated seconds advanced per step.
    pub time_step: f32,
    /// Sequential impulse passes for rigid contacts.
    pub velocity_iterations: u32,
    /// Position correction passes. Also the number of density passes of
    /// the particle solver.
    pub position_iterations: u32,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            time_step: 1.0 / 60.0,
            velocity_iterations: 8,
            position_iterations: 3,
        }
    }
}

/// Parameters of a particle system. Fixed once the system is created.
///
/// Defaults are tuned for water-like behavior with a 0.02 radius.
#[derive(Clone, Debug, PartialEq, Reflect)]
pub struct ParticleSystemDef {
    /// Particle radius, also half the particle-particle contact distance.
    pub radius: f32,

    /// Lattice spacing used when filling groups, as a fraction of the
    /// particle diameter.
    pub stride_ratio: f32,

    /// Smoothing kernel radius (h) as a multiple of the particle diameter.
    pub smoothing_ratio: f32,

    /// Mass per unit area. Particle mass is `density * stride²`.
    pub density: f32,

    /// Constraint force mixing for the density constraint, relative to the
    /// gradient magnitude of a particle at rest.
    /// Typical range: 0.005 - 0.1
    pub relaxation: f32,

    /// Strength of the artificial pressure term that keeps particles from
    /// clustering.
    pub artificial_pressure: f32,

    /// Distance at which the artificial pressure is evaluated, as a fraction
    /// of h.
    pub artificial_pressure_radius: f32,

    /// How far below rest density a particle may pull its neighbours in.
    /// Gives water its weak cohesion.
    pub cohesion: f32,

    /// Cohesion used for particles flagged [`ParticleFlags::TENSILE`].
    pub tensile_cohesion: f32,

    /// Normalized XSPH viscosity, 0 = inviscid, 1 = rigid.
    pub viscosity: f32,

    /// Viscosity used for particles flagged [`ParticleFlags::VISCOUS`].
    pub viscous_strength: f32,

    /// Maximum distance a particle travels per substep, in diameters.
    pub critical_velocity_ratio: f32,

    /// Substeps of the particle solver per world step.
    pub particle_iterations: u32,

    /// Tangential velocity loss on body contact.
    pub friction: f32,

    /// Maximum number of particles (0 = unlimited).
    pub max_count: usize,
}

impl Default for ParticleSystemDef {
    fn default() -> Self {
        Self {
            radius: 0.02,
            stride_ratio: 0.75,
            smoothing_ratio: 1.5,
            density: 1.0,
            relaxation: 0.02,
            artificial_pressure: 0.02,
            artificial_pressure_radius: 0.2,
            cohesion: 0.05,
            tensile_cohesion: 0.2,
            viscosity: 0.02,
            viscous_strength: 0.25,
            critical_velocity_ratio: 1.0,
            particle_iterations: 1,
            friction: 0.1,
            max_count: 0,
        }
    }
}

impl ParticleSystemDef {
    /// Particle diameter.
    pub fn diameter(&self) -> f32 {
        2.0 * self.radius
    }

    /// Lattice spacing used for group packing.
    pub fn stride(&self) -> f32 {
        self.stride_ratio * self.diameter()
    }

    /// Smoothing kernel radius (h).
    pub fn smoothing_length(&self) -> f32 {
        self.smoothing_ratio * self.diameter()
    }

    /// Mass of one particle.
    pub fn particle_mass(&self) -> f32 {
        let stride = self.stride();
        self.density * stride * stride
    }

    /// Set the particle radius.
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    /// Set the normalized viscosity.
    pub fn with_viscosity(mut self, viscosity: f32) -> Self {
        self.viscosity = viscosity;
        self
    }

    /// Set the number of particle substeps per step.
    pub fn with_particle_iterations(mut self, iterations: u32) -> Self {
        self.particle_iterations = iterations;
        self
    }

    /// Cap the particle count.
    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = max_count;
        self
    }
}

/// Screen mapping, colors and pacing of the visual output.
#[derive(Clone, Debug, PartialEq, Reflect)]
pub struct ViewParams {
    /// Window title.
    pub title: String,
    /// Surface width in pixels.
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
    /// World units to pixels.
    pub pixels_per_unit: f32,
    /// Edge length of the square drawn for each particle, in pixels.
    pub particle_size: f32,
    /// Delay between frames.
    pub frame_interval: Duration,
    pub background_color: Color,
    pub water_color: Color,
    pub boundary_color: Color,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            title: "LiquidFun Particles".to_string(),
            width: 800,
            height: 600,
            pixels_per_unit: 100.0,
            particle_size: 2.0,
            frame_interval: Duration::from_millis(16),
            background_color: Color::WHITE,
            water_color: Color::srgb_u8(0, 191, 255),
            boundary_color: Color::srgb_u8(255, 204, 0),
        }
    }
}

impl ViewParams {
    /// Size of the visible playfield in world units.
    pub fn world_size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32) / self.pixels_per_unit
    }
}

/// Everything needed to build and run the liquid scene.
#[derive(Resource, Clone, Debug, Reflect)]
#[reflect(Resource)]
pub struct SceneParams {
    /// Gravity acceleration. Screen coordinates, so +y points down.
    pub gravity: Vec2,
    pub step: StepConfig,
    pub particles: ParticleSystemDef,
    /// The single group seeded at startup.
    pub fluid: ParticleGroupDef,
    pub view: ViewParams,
}

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, 10.0),
            step: StepConfig::default(),
            particles: ParticleSystemDef::default(),
            fluid: ParticleGroupDef {
                flags: ParticleFlags::WATER,
                shape: BoxShape::new(Vec2::splat(1.5)),
                position: Vec2::new(4.0, 1.0),
                linear_velocity: Vec2::ZERO,
            },
            view: ViewParams::default(),
        }
    }
}

impl SceneParams {
    /// The default water scene.
    pub fn water() -> Self {
        Self::default()
    }

    /// Honey-like fluid.
    pub fn viscous() -> Self {
        let mut params = Self::default();
        params.fluid.flags = ParticleFlags::WATER | ParticleFlags::VISCOUS;
        params
    }

    /// Fluid with strong surface tension that beads up.
    pub fn tensile() -> Self {
        let mut params = Self::default();
        params.fluid.flags = ParticleFlags::WATER | ParticleFlags::TENSILE;
        params
    }

    /// Set gravity.
    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the particle system definition.
    pub fn with_particles(mut self, particles: ParticleSystemDef) -> Self {
        self.particles = particles;
        self
    }

    /// Set the seeded fluid group.
    pub fn with_fluid(mut self, fluid: ParticleGroupDef) -> Self {
        self.fluid = fluid;
        self
    }

    /// Set the step configuration.
    pub fn with_step(mut self, step: StepConfig) -> Self {
        self.step = step;
        self
    }
}
