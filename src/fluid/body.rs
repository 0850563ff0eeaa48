//! Rigid bodies and their box geometry.
//!
//! Bodies are axis-aligned boxes. Static bodies form the world boundaries
//! (ground and walls) and never move; dynamic bodies are integrated by the
//! contact solver in [`contact`](super::contact).

use bevy::prelude::*;

/// Axis-aligned box shape, centered on its body.
#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct BoxShape {
    /// Half of the box size along each axis.
    pub half_extents: Vec2,
}

impl Default for BoxShape {
    fn default() -> Self {
        Self {
            half_extents: Vec2::splat(0.5),
        }
    }
}

impl BoxShape {
    /// Create a box from its half extents.
    pub fn new(half_extents: Vec2) -> Self {
        Self { half_extents }
    }

    /// Whether the half extents describe a real box.
    pub fn is_valid(&self) -> bool {
        self.half_extents.is_finite() && self.half_extents.cmpgt(Vec2::ZERO).all()
    }

    /// Area of the box.
    pub fn area(&self) -> f32 {
        4.0 * self.half_extents.x * self.half_extents.y
    }

    /// Check if a point, given relative to the box center, is inside.
    /// Points on the surface count as inside.
    pub fn contains_local(&self, local: Vec2) -> bool {
        local.x.abs() <= self.half_extents.x && local.y.abs() <= self.half_extents.y
    }

    /// Keep a moving particle out of this box.
    ///
    /// `start` is where the particle was at the beginning of the step and
    /// `end` where it is headed. Both are in world space; the box sits at
    /// `center` and is inflated by `radius`. If `end` lies inside, it is moved
    /// onto the face the segment entered through, keeping its tangential
    /// motion. A `start` that is already inside falls back to the face of
    /// least penetration.
    pub fn push_out(&self, center: Vec2, start: Vec2, end: Vec2, radius: f32) -> Option<BoxHit> {
        let half = self.half_extents + Vec2::splat(radius);
        let local_end = end - center;
        if local_end.x.abs() >= half.x || local_end.y.abs() >= half.y {
            return None;
        }

        let local_start = start - center;
        let entered_through = if local_start.x.abs() >= half.x || local_start.y.abs() >= half.y {
            entry_face(local_start, local_end - local_start, half)
        } else {
            None
        };
        let normal = entered_through.unwrap_or_else(|| least_penetration_face(local_end, half));

        let mut local = local_end;
        if normal.x != 0.0 {
            local.x = normal.x * half.x;
        } else {
            local.y = normal.y * half.y;
        }

        Some(BoxHit {
            point: center + local,
            normal,
        })
    }
}

/// Result of pushing a particle out of a box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxHit {
    /// Corrected particle position, on the inflated box surface.
    pub point: Vec2,
    /// Outward face normal.
    pub normal: Vec2,
}

/// Face through which the segment `origin + t * delta`, t in [0, 1], first
/// enters the box, found with the slab method.
fn entry_face(origin: Vec2, delta: Vec2, half: Vec2) -> Option<Vec2> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut normal = None;

    for axis in 0..2 {
        let (o, d, h) = (origin[axis], delta[axis], half[axis]);
        if d.abs() < 1e-12 {
            if o.abs() >= h {
                return None;
            }
            continue;
        }
        let t_near = (-d.signum() * h - o) / d;
        let t_far = (d.signum() * h - o) / d;
        if t_near > t_enter {
            t_enter = t_near;
            let mut n = Vec2::ZERO;
            n[axis] = -d.signum();
            normal = Some(n);
        }
        t_exit = t_exit.min(t_far);
    }

    if t_enter > t_exit || t_enter > 1.0 {
        return None;
    }
    normal
}

fn least_penetration_face(local: Vec2, half: Vec2) -> Vec2 {
    let depth = half - local.abs();
    if depth.x < depth.y {
        Vec2::new(sign(local.x), 0.0)
    } else {
        Vec2::new(0.0, sign(local.y))
    }
}

#[inline]
pub(crate) fn sign(value: f32) -> f32 {
    if value < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// How a body responds to forces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Reflect)]
pub enum BodyKind {
    /// Infinite mass, never moves.
    #[default]
    Static,
    /// Moved by gravity, contacts and particles.
    Dynamic,
}

/// Description of a body to create.
#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct BodyDef {
    pub kind: BodyKind,
    pub position: Vec2,
    pub linear_velocity: Vec2,
    pub shape: BoxShape,
    /// Mass per unit area (dynamic bodies only).
    pub density: f32,
    pub friction: f32,
    /// Bounciness (0 = no bounce, 1 = elastic).
    pub restitution: f32,
    pub gravity_scale: f32,
    pub linear_damping: f32,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            kind: BodyKind::Static,
            position: Vec2::ZERO,
            linear_velocity: Vec2::ZERO,
            shape: BoxShape::default(),
            density: 1.0,
            friction: 0.2,
            restitution: 0.0,
            gravity_scale: 1.0,
            linear_damping: 0.0,
        }
    }
}

impl BodyDef {
    /// A static box centered at `position`.
    pub fn static_box(position: Vec2, half_extents: Vec2) -> Self {
        Self {
            position,
            shape: BoxShape::new(half_extents),
            ..default()
        }
    }

    /// A dynamic box centered at `position`.
    pub fn dynamic_box(position: Vec2, half_extents: Vec2, density: f32) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            position,
            shape: BoxShape::new(half_extents),
            density,
            ..default()
        }
    }

    /// Set initial velocity.
    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.linear_velocity = velocity;
        self
    }

    /// Set restitution.
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    /// Set friction.
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }
}

/// A rigid body owned by the world.
#[derive(Clone, Debug, PartialEq)]
pub struct Body {
    kind: BodyKind,
    pub(crate) position: Vec2,
    pub(crate) velocity: Vec2,
    shape: BoxShape,
    mass: f32,
    inv_mass: f32,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) gravity_scale: f32,
    pub(crate) linear_damping: f32,
}

impl Body {
    pub(crate) fn from_def(def: &BodyDef) -> Self {
        let (mass, inv_mass, velocity) = match def.kind {
            BodyKind::Static => (0.0, 0.0, Vec2::ZERO),
            BodyKind::Dynamic => {
                let mass = (def.density * def.shape.area()).max(f32::EPSILON);
                (mass, 1.0 / mass, def.linear_velocity)
            }
        };

        Self {
            kind: def.kind,
            position: def.position,
            velocity,
            shape: def.shape,
            mass,
            inv_mass,
            friction: def.friction,
            restitution: def.restitution,
            gravity_scale: def.gravity_scale,
            linear_damping: def.linear_damping,
        }
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn is_static(&self) -> bool {
        self.kind == BodyKind::Static
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn shape(&self) -> &BoxShape {
        &self.shape
    }

    /// Mass, zero for static bodies.
    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub(crate) fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Minimum corner of the body box.
    pub fn min(&self) -> Vec2 {
        self.position - self.shape.half_extents
    }

    /// Maximum corner of the body box.
    pub fn max(&self) -> Vec2 {
        self.position + self.shape.half_extents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_shape_validity() {
        assert!(BoxShape::new(Vec2::new(4.0, 0.1)).is_valid());
        assert!(!BoxShape::new(Vec2::new(0.0, 1.0)).is_valid());
        assert!(!BoxShape::new(Vec2::new(-1.0, 1.0)).is_valid());
        assert!(!BoxShape::new(Vec2::new(f32::NAN, 1.0)).is_valid());
    }

    #[test]
    fn test_push_out_ignores_outside_points() {
        let ground = BoxShape::new(Vec2::new(4.0, 0.1));
        let center = Vec2::new(4.0, 5.5);
        let hit = ground.push_out(center, Vec2::new(4.0, 5.0), Vec2::new(4.0, 5.2), 0.02);
        assert!(hit.is_none());
    }

    #[test]
    fn test_push_out_uses_entry_face_for_deep_moves() {
        // Thin ground: a fast particle ends up past the center line, which a
        // nearest-face test would resolve to the wrong side.
        let ground = BoxShape::new(Vec2::new(4.0, 0.1));
        let center = Vec2::new(4.0, 5.5);
        let start = Vec2::new(3.0, 5.3);
        let end = Vec2::new(3.05, 5.55);

        let hit = ground.push_out(center, start, end, 0.02).unwrap();
        assert_eq!(hit.normal, Vec2::new(0.0, -1.0));
        assert!((hit.point.y - 5.38).abs() < 1e-5);
        assert!((hit.point.x - 3.05).abs() < 1e-6);
    }

    #[test]
    fn test_push_out_from_side() {
        let wall = BoxShape::new(Vec2::new(0.1, 3.0));
        let center = Vec2::new(0.1, 3.0);
        let hit = wall
            .push_out(center, Vec2::new(0.5, 2.0), Vec2::new(0.15, 2.1), 0.02)
            .unwrap();
        assert_eq!(hit.normal, Vec2::X);
        assert!((hit.point.x - 0.22).abs() < 1e-5);
    }

    #[test]
    fn test_push_out_when_starting_inside() {
        let block = BoxShape::new(Vec2::splat(1.0));
        let hit = block
            .push_out(Vec2::ZERO, Vec2::new(0.1, 0.9), Vec2::new(0.1, 0.9), 0.0)
            .unwrap();
        assert_eq!(hit.normal, Vec2::Y);
        assert_eq!(hit.point, Vec2::new(0.1, 1.0));
    }

    #[test]
    fn test_static_body_has_no_mass() {
        let body = Body::from_def(&BodyDef::static_box(Vec2::ZERO, Vec2::ONE).with_velocity(Vec2::X));
        assert!(body.is_static());
        assert_eq!(body.mass(), 0.0);
        assert_eq!(body.inv_mass(), 0.0);
        assert_eq!(body.velocity(), Vec2::ZERO);
    }

    #[test]
    fn test_dynamic_body_mass_from_density() {
        let body = Body::from_def(&BodyDef::dynamic_box(Vec2::ZERO, Vec2::new(0.5, 0.25), 2.0));
        assert!((body.mass() - 1.0).abs() < 1e-6);
        assert!((body.inv_mass() - 1.0).abs() < 1e-6);
    }
}
