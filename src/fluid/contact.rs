//! Rigid body dynamics.
//!
//! Sequential impulses over axis-aligned box contacts: integrate velocities,
//! solve contact impulses with friction and restitution, integrate
//! positions, then push overlapping boxes apart with a few position passes.
//! Static bodies take part in contacts but are never moved.

use bevy::prelude::*;

use super::body::{sign, Body};

/// Allowed penetration, keeps resting contacts warm.
const LINEAR_SLOP: f32 = 0.005;
/// Fraction of the overlap removed per position pass.
const BAUMGARTE: f32 = 0.2;
/// Largest position correction per pass.
const MAX_LINEAR_CORRECTION: f32 = 0.2;
/// Approach speed below which contacts do not bounce.
const VELOCITY_THRESHOLD: f32 = 1.0;

/// Contact between two boxes, with its accumulated impulses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyContact {
    pub a: usize,
    pub b: usize,
    /// Unit normal pointing from `a` to `b`.
    pub normal: Vec2,
    /// Gap along the normal, negative when overlapping.
    pub separation: f32,
    normal_impulse: f32,
    tangent_impulse: f32,
    friction: f32,
    mass: f32,
    velocity_bias: f32,
}

impl BodyContact {
    /// Normal impulse accumulated during the last step.
    pub fn normal_impulse(&self) -> f32 {
        self.normal_impulse
    }
}

/// Advance all bodies by `dt`.
pub(crate) fn step_bodies(
    bodies: &mut [Body],
    contacts: &mut Vec<BodyContact>,
    gravity: Vec2,
    dt: f32,
    velocity_iterations: u32,
    position_iterations: u32,
) {
    contacts.clear();
    if dt <= 0.0 {
        return;
    }

    integrate_velocities(bodies, gravity, dt);
    find_contacts(bodies, contacts, dt);

    for _ in 0..velocity_iterations {
        for contact in contacts.iter_mut() {
            solve_velocity(bodies, contact, dt);
        }
    }

    for body in bodies.iter_mut().filter(|b| !b.is_static()) {
        body.position += body.velocity * dt;
    }

    for _ in 0..position_iterations {
        let mut min_separation = 0.0f32;
        for contact in contacts.iter() {
            min_separation = min_separation.min(solve_position(bodies, contact));
        }
        if min_separation >= -3.0 * LINEAR_SLOP {
            break;
        }
    }
}

fn integrate_velocities(bodies: &mut [Body], gravity: Vec2, dt: f32) {
    for body in bodies.iter_mut().filter(|b| !b.is_static()) {
        let mut v = body.velocity + gravity * body.gravity_scale * dt;
        v *= 1.0 / (1.0 + dt * body.linear_damping);
        body.velocity = v;
    }
}

/// Overlap test on the axis of least penetration.
fn box_separation(a: &Body, b: &Body) -> (Vec2, f32) {
    let d = b.position - a.position;
    let gap = d.abs() - (a.shape().half_extents + b.shape().half_extents);
    if gap.x > gap.y {
        (Vec2::new(sign(d.x), 0.0), gap.x)
    } else {
        (Vec2::new(0.0, sign(d.y)), gap.y)
    }
}

fn find_contacts(bodies: &[Body], contacts: &mut Vec<BodyContact>, dt: f32) {
    for a in 0..bodies.len() {
        for b in (a + 1)..bodies.len() {
            let (body_a, body_b) = (&bodies[a], &bodies[b]);
            let inv_mass = body_a.inv_mass() + body_b.inv_mass();
            if inv_mass == 0.0 {
                continue;
            }

            let (normal, separation) = box_separation(body_a, body_b);
            let approach = (body_b.velocity - body_a.velocity).dot(normal);
            // Speculative margin: anything that can close the gap this step.
            let margin = 4.0 * LINEAR_SLOP + (-approach).max(0.0) * dt;
            if separation > margin {
                continue;
            }

            let restitution = body_a.restitution.max(body_b.restitution);
            let velocity_bias = if approach < -VELOCITY_THRESHOLD {
                -restitution * approach
            } else {
                0.0
            };

            contacts.push(BodyContact {
                a,
                b,
                normal,
                separation,
                normal_impulse: 0.0,
                tangent_impulse: 0.0,
                friction: (body_a.friction * body_b.friction).sqrt(),
                mass: 1.0 / inv_mass,
                velocity_bias,
            });
        }
    }
}

fn apply_impulse(bodies: &mut [Body], contact: &BodyContact, impulse: Vec2) {
    let (a, b) = (contact.a, contact.b);
    let inv_a = bodies[a].inv_mass();
    let inv_b = bodies[b].inv_mass();
    bodies[a].velocity -= impulse * inv_a;
    bodies[b].velocity += impulse * inv_b;
}

fn solve_velocity(bodies: &mut [Body], contact: &mut BodyContact, dt: f32) {
    let normal = contact.normal;
    let tangent = normal.perp();

    // Friction first, bounded by the current normal impulse.
    let dv = bodies[contact.b].velocity - bodies[contact.a].velocity;
    let lambda = -contact.mass * dv.dot(tangent);
    let max_friction = contact.friction * contact.normal_impulse;
    let new_impulse = (contact.tangent_impulse + lambda).clamp(-max_friction, max_friction);
    let lambda = new_impulse - contact.tangent_impulse;
    contact.tangent_impulse = new_impulse;
    apply_impulse(bodies, contact, lambda * tangent);

    let dv = bodies[contact.b].velocity - bodies[contact.a].velocity;
    let target = if contact.separation > 0.0 {
        -contact.separation / dt
    } else {
        contact.velocity_bias
    };
    let lambda = -contact.mass * (dv.dot(normal) - target);
    let new_impulse = (contact.normal_impulse + lambda).max(0.0);
    let lambda = new_impulse - contact.normal_impulse;
    contact.normal_impulse = new_impulse;
    apply_impulse(bodies, contact, lambda * normal);
}

/// Push the pair apart along the contact normal, returns the separation
/// before correction.
fn solve_position(bodies: &mut [Body], contact: &BodyContact) -> f32 {
    let (a, b) = (contact.a, contact.b);
    let normal = contact.normal;
    let extent = (bodies[a].shape().half_extents + bodies[b].shape().half_extents).dot(normal.abs());
    let separation = (bodies[b].position - bodies[a].position).dot(normal) - extent;

    let correction = (BAUMGARTE * (separation + LINEAR_SLOP)).clamp(-MAX_LINEAR_CORRECTION, 0.0);
    let inv_a = bodies[a].inv_mass();
    let inv_b = bodies[b].inv_mass();
    let impulse = -correction / (inv_a + inv_b);

    bodies[a].position -= normal * impulse * inv_a;
    bodies[b].position += normal * impulse * inv_b;

    separation
}
