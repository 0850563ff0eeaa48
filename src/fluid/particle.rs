//! Particle systems, particle groups and group packing.
//!
//! A [`ParticleSystem`] stores its particles as flat buffers (positions,
//! velocities, flags). Groups only exist while they are being created: the
//! returned [`ParticleGroup`] is a receipt, the particles are addressed by
//! index afterwards.

use std::ops::{BitOr, BitOrAssign};

use bevy::prelude::*;

use super::body::{Body, BoxShape};
use super::error::PhysicsError;
use super::params::ParticleSystemDef;
use super::solver::PbfSolver;

/// Behavior flags of a particle. Bit positions follow LiquidFun.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Reflect)]
pub struct ParticleFlags(pub u32);

impl ParticleFlags {
    /// Plain incompressible, weakly cohesive fluid.
    pub const WATER: Self = Self(0);
    /// Immobile particle that still pushes its neighbours.
    pub const WALL: Self = Self(1 << 2);
    /// Stronger velocity smoothing.
    pub const VISCOUS: Self = Self(1 << 5);
    /// Stronger cohesion.
    pub const TENSILE: Self = Self(1 << 7);

    /// Check whether every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ParticleFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ParticleFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Description of a batch of particles filling a box.
#[derive(Clone, Debug, PartialEq, Reflect)]
pub struct ParticleGroupDef {
    pub flags: ParticleFlags,
    /// Region to fill, centered on `position`.
    pub shape: BoxShape,
    pub position: Vec2,
    /// Initial velocity of every particle in the group.
    pub linear_velocity: Vec2,
}

impl Default for ParticleGroupDef {
    fn default() -> Self {
        Self {
            flags: ParticleFlags::WATER,
            shape: BoxShape::default(),
            position: Vec2::ZERO,
            linear_velocity: Vec2::ZERO,
        }
    }
}

impl ParticleGroupDef {
    /// A block of water.
    pub fn water_box(half_extents: Vec2, position: Vec2) -> Self {
        Self {
            shape: BoxShape::new(half_extents),
            position,
            ..default()
        }
    }

    /// Set the flags.
    pub fn with_flags(mut self, flags: ParticleFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the initial velocity.
    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.linear_velocity = velocity;
        self
    }

    /// Lattice points covered by this group.
    ///
    /// The lattice is aligned to multiples of `stride` in world space, so two
    /// groups packed next to each other line up.
    pub fn generate_positions(&self, stride: f32) -> Vec<Vec2> {
        let mut positions = Vec::new();
        if !(stride > 0.0) || !self.shape.is_valid() {
            return positions;
        }

        let min = self.position - self.shape.half_extents;
        let max = self.position + self.shape.half_extents;
        let first = (min / stride).floor().as_ivec2();
        let last = (max / stride).ceil().as_ivec2();

        for y in first.y..=last.y {
            for x in first.x..=last.x {
                let point = IVec2::new(x, y).as_vec2() * stride;
                if self.shape.contains_local(point - self.position) {
                    positions.push(point);
                }
            }
        }

        positions
    }
}

/// Description of a single particle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ParticleDef {
    pub flags: ParticleFlags,
    pub position: Vec2,
    pub velocity: Vec2,
}

impl ParticleDef {
    /// A water particle at `position`.
    pub fn new(position: Vec2) -> Self {
        Self {
            position,
            ..default()
        }
    }

    /// Set the initial velocity.
    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    /// Set the flags.
    pub fn with_flags(mut self, flags: ParticleFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Receipt of a group creation: where the new particles landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParticleGroup {
    /// Index of the first particle of the group.
    pub first_index: usize,
    /// Number of particles created.
    pub count: usize,
    pub flags: ParticleFlags,
}

impl ParticleGroup {
    /// Indices of the particles created with this group.
    pub fn indices(&self) -> std::ops::Range<usize> {
        self.first_index..self.first_index + self.count
    }
}

/// A pool of particles sharing one radius.
#[derive(Debug)]
pub struct ParticleSystem {
    def: ParticleSystemDef,
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    flags: Vec<ParticleFlags>,
    solver: PbfSolver,
}

impl ParticleSystem {
    /// Create an empty particle system.
    pub fn new(def: ParticleSystemDef) -> Result<Self, PhysicsError> {
        validate(&def)?;
        let solver = PbfSolver::new(&def);
        Ok(Self {
            def,
            positions: Vec::new(),
            velocities: Vec::new(),
            flags: Vec::new(),
            solver,
        })
    }

    pub fn def(&self) -> &ParticleSystemDef {
        &self.def
    }

    pub fn radius(&self) -> f32 {
        self.def.radius
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vec2] {
        &self.velocities
    }

    pub fn flags(&self) -> &[ParticleFlags] {
        &self.flags
    }

    /// Density of a particle inside an undisturbed lattice.
    pub fn rest_density(&self) -> f32 {
        self.solver.rest_density()
    }

    /// Densities computed during the last step.
    pub fn densities(&self) -> &[f32] {
        self.solver.densities()
    }

    /// Particles that touched a body during the last step.
    pub fn body_contact_count(&self) -> usize {
        self.solver.contacts().len()
    }

    fn remaining_capacity(&self) -> usize {
        match self.def.max_count {
            0 => usize::MAX,
            max => max.saturating_sub(self.len()),
        }
    }

    /// Add one particle.
    pub fn create_particle(&mut self, def: &ParticleDef) -> Result<usize, PhysicsError> {
        if self.remaining_capacity() == 0 {
            return Err(PhysicsError::ParticleCapacity(self.len()));
        }
        self.push(def.position, def.velocity, def.flags);
        Ok(self.len() - 1)
    }

    /// Fill the group's box with particles on the stride lattice.
    ///
    /// Particles beyond `max_count` are dropped; a group that ends up with no
    /// particles at all is an error.
    pub fn create_group(&mut self, def: &ParticleGroupDef) -> Result<ParticleGroup, PhysicsError> {
        let points = def.generate_positions(self.def.stride());
        let take = points.len().min(self.remaining_capacity());
        if take == 0 {
            return Err(PhysicsError::EmptyParticleGroup {
                position: def.position,
                half_extents: def.shape.half_extents,
            });
        }

        let first_index = self.len();
        self.positions.reserve(take);
        self.velocities.reserve(take);
        self.flags.reserve(take);
        for point in points.into_iter().take(take) {
            self.push(point, def.linear_velocity, def.flags);
        }

        Ok(ParticleGroup {
            first_index,
            count: take,
            flags: def.flags,
        })
    }

    /// Advance every particle by `dt`, colliding against `bodies`.
    pub(crate) fn step(&mut self, bodies: &mut [Body], gravity: Vec2, dt: f32, iterations: u32) {
        let Self {
            def,
            positions,
            velocities,
            flags,
            solver,
        } = self;
        solver.step(def, positions, velocities, flags, bodies, gravity, dt, iterations);
    }

    fn push(&mut self, position: Vec2, velocity: Vec2, flags: ParticleFlags) {
        let velocity = if flags.contains(ParticleFlags::WALL) {
            Vec2::ZERO
        } else {
            velocity
        };
        self.positions.push(position);
        self.velocities.push(velocity);
        self.flags.push(flags);
    }
}

fn validate(def: &ParticleSystemDef) -> Result<(), PhysicsError> {
    if !(def.radius.is_finite() && def.radius > 0.0) {
        return Err(PhysicsError::InvalidParticleSystem("radius must be positive"));
    }
    if !(def.stride_ratio > 0.0) {
        return Err(PhysicsError::InvalidParticleSystem("stride ratio must be positive"));
    }
    if !(def.smoothing_ratio > def.stride_ratio) {
        return Err(PhysicsError::InvalidParticleSystem(
            "smoothing length must exceed the lattice stride",
        ));
    }
    if !(def.density > 0.0) {
        return Err(PhysicsError::InvalidParticleSystem("density must be positive"));
    }
    Ok(())
}
