//! Scene construction: the static container and the initial fluid block.

use bevy::prelude::*;

use super::body::BodyDef;
use super::engine::{BodyHandle, ParticleSystemHandle, PhysicsEngine};
use super::error::PhysicsError;
use super::particle::{ParticleGroup, ParticleGroupDef};

/// Thickness of the ground and walls is twice this.
const BOUNDARY_HALF_THICKNESS: f32 = 0.1;
/// Distance from the bottom of the playfield to the ground center.
const GROUND_INSET: f32 = 0.5;

/// A static box, center and half extents in world units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxPlacement {
    pub center: Vec2,
    pub half_extents: Vec2,
}

impl BoxPlacement {
    fn body_def(&self) -> BodyDef {
        BodyDef::static_box(self.center, self.half_extents)
    }
}

/// Where the ground and the side walls go.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundaryLayout {
    pub ground: BoxPlacement,
    pub left_wall: BoxPlacement,
    pub right_wall: BoxPlacement,
}

impl BoundaryLayout {
    /// Ground slab near the bottom and two full-height walls at the edges
    /// of a playfield of `size` world units.
    pub fn for_playfield(size: Vec2) -> Self {
        let (w, h) = (size.x, size.y);
        let t = BOUNDARY_HALF_THICKNESS;
        Self {
            ground: BoxPlacement {
                center: Vec2::new(w / 2.0, h - GROUND_INSET),
                half_extents: Vec2::new(w / 2.0, t),
            },
            left_wall: BoxPlacement {
                center: Vec2::new(t, h / 2.0),
                half_extents: Vec2::new(t, h / 2.0),
            },
            right_wall: BoxPlacement {
                center: Vec2::new(w - t, h / 2.0),
                half_extents: Vec2::new(t, h / 2.0),
            },
        }
    }

    /// Inner faces of the two walls.
    pub fn inner_x_range(&self) -> (f32, f32) {
        (
            self.left_wall.center.x + self.left_wall.half_extents.x,
            self.right_wall.center.x - self.right_wall.half_extents.x,
        )
    }

    /// Top face of the ground.
    pub fn ground_top(&self) -> f32 {
        self.ground.center.y - self.ground.half_extents.y
    }
}

/// Handles of the static container bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Boundaries {
    pub ground: BodyHandle,
    pub left_wall: BodyHandle,
    pub right_wall: BodyHandle,
}

impl Boundaries {
    pub fn handles(&self) -> [BodyHandle; 3] {
        [self.ground, self.left_wall, self.right_wall]
    }
}

/// Create the ground and both walls as static bodies.
pub fn build_boundaries<E: PhysicsEngine>(
    engine: &mut E,
    layout: &BoundaryLayout,
) -> Result<Boundaries, PhysicsError> {
    let ground = engine.create_body(&layout.ground.body_def())?;
    let left_wall = engine.create_body(&layout.left_wall.body_def())?;
    let right_wall = engine.create_body(&layout.right_wall.body_def())?;

    debug!("Boundaries built: ground top at {}", layout.ground_top());

    Ok(Boundaries {
        ground,
        left_wall,
        right_wall,
    })
}

/// Fill the group's box with particles.
///
/// A failure is not fatal to the scene, it is logged and the simulation
/// runs without fluid.
pub fn seed_fluid<E: PhysicsEngine>(
    engine: &mut E,
    system: ParticleSystemHandle,
    def: &ParticleGroupDef,
) -> Option<ParticleGroup> {
    match engine.create_particle_group(system, def) {
        Ok(group) => {
            info!(
                "Seeded {} particles at {} (total {})",
                group.count,
                def.position,
                engine.particle_count(system)
            );
            Some(group)
        }
        Err(err) => {
            warn!("Fluid seeding failed, continuing without particles: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::params::ParticleSystemDef;
    use crate::fluid::world::World;

    #[test]
    fn test_default_layout() {
        let layout = BoundaryLayout::for_playfield(Vec2::new(8.0, 6.0));
        assert_eq!(layout.ground.center, Vec2::new(4.0, 5.5));
        assert_eq!(layout.ground.half_extents, Vec2::new(4.0, 0.1));
        assert_eq!(layout.left_wall.center, Vec2::new(0.1, 3.0));
        assert_eq!(layout.left_wall.half_extents, Vec2::new(0.1, 3.0));
        assert_eq!(layout.right_wall.center, Vec2::new(7.9, 3.0));
        assert_eq!(layout.inner_x_range(), (0.2, 7.8));
    }

    #[test]
    fn test_build_boundaries_creates_static_bodies() {
        let mut world = World::new(Vec2::new(0.0, 10.0));
        let layout = BoundaryLayout::for_playfield(Vec2::new(8.0, 6.0));
        let boundaries = build_boundaries(&mut world, &layout).unwrap();

        for handle in boundaries.handles() {
            assert!(world.body(handle).unwrap().is_static());
        }
        assert_eq!(world.body(boundaries.ground).unwrap().position(), Vec2::new(4.0, 5.5));
    }

    #[test]
    fn test_seed_fluid() {
        let mut world = World::new(Vec2::new(0.0, 10.0));
        let system = world.create_particle_system(&ParticleSystemDef::default()).unwrap();
        let def = ParticleGroupDef::water_box(Vec2::splat(1.5), Vec2::new(4.0, 1.0));

        let group = seed_fluid(&mut world, system, &def).unwrap();
        assert!(group.count > 0);
        assert_eq!(world.particle_count(system), group.count);

        // A second call adds the same number again.
        let again = seed_fluid(&mut world, system, &def).unwrap();
        assert_eq!(again.count, group.count);
        assert_eq!(world.particle_count(system), 2 * group.count);
    }

    #[test]
    fn test_seed_failure_is_degraded() {
        let mut world = World::new(Vec2::new(0.0, 10.0));
        let system = world.create_particle_system(&ParticleSystemDef::default()).unwrap();
        let empty = ParticleGroupDef::water_box(Vec2::splat(0.001), Vec2::new(0.015, 0.015));

        assert!(seed_fluid(&mut world, system, &empty).is_none());
        assert_eq!(world.particle_count(system), 0);
    }
}
