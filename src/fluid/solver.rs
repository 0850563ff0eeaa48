//! PBF (Position Based Fluids) constraint solver.
//!
//! This module implements the core PBF algorithm as described in:
//! "Position Based Fluids" by Macklin & Müller (2013), in two dimensions.
//!
//! Rest density and the constraint gradient scale are measured on the
//! packing lattice when the solver is created, so a freshly seeded block is
//! at equilibrium and the tuning parameters do not depend on the particle
//! radius.

use std::f32::consts::PI;

use bevy::prelude::*;

use super::body::Body;
use super::params::ParticleSystemDef;
use super::particle::ParticleFlags;
use super::spatial::NeighborGrid;

/// 2D SPH kernels for a fixed smoothing length.
#[derive(Clone, Copy, Debug)]
pub struct SphKernels {
    h: f32,
    h_sq: f32,
    poly6_coeff: f32,
    spiky_grad_coeff: f32,
}

impl SphKernels {
    pub fn new(h: f32) -> Self {
        Self {
            h,
            h_sq: h * h,
            poly6_coeff: 4.0 / (PI * h.powi(8)),
            spiky_grad_coeff: -30.0 / (PI * h.powi(5)),
        }
    }

    pub fn smoothing_length(&self) -> f32 {
        self.h
    }

    /// Poly6 kernel for density estimation.
    /// W(r, h) = (4 / πh⁸) * (h² - r²)³ for r ≤ h
    #[inline]
    pub fn poly6(&self, r_sq: f32) -> f32 {
        if r_sq >= self.h_sq {
            return 0.0;
        }
        let diff = self.h_sq - r_sq;
        self.poly6_coeff * diff * diff * diff
    }

    /// Gradient of the Spiky kernel.
    /// ∇W(r, h) = -(30 / πh⁵) * (h - |r|)² * (r / |r|) for r ≤ h
    #[inline]
    pub fn spiky_gradient(&self, r: Vec2) -> Vec2 {
        let r_len = r.length();
        if r_len >= self.h || r_len < 1e-6 {
            return Vec2::ZERO;
        }
        let diff = self.h - r_len;
        self.spiky_grad_coeff * diff * diff * (r / r_len)
    }
}

/// A particle touching a body during the last solver pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ParticleContact {
    pub particle: usize,
    pub body: usize,
    /// Outward normal of the body face.
    pub normal: Vec2,
}

/// Scratch state of the particle solver.
#[derive(Debug)]
pub struct PbfSolver {
    kernels: SphKernels,
    rest_density: f32,
    /// Σ|∇C|² of a particle at rest, used to scale the relaxation.
    rest_gradient: f32,
    neighbors: NeighborGrid,
    predicted: Vec<Vec2>,
    densities: Vec<f32>,
    lambdas: Vec<f32>,
    deltas: Vec<Vec2>,
    velocity_scratch: Vec<Vec2>,
    contacts: Vec<ParticleContact>,
}

impl PbfSolver {
    pub fn new(def: &ParticleSystemDef) -> Self {
        let kernels = SphKernels::new(def.smoothing_length());
        let (rest_density, rest_gradient) = lattice_rest_state(&kernels, def.stride());

        Self {
            kernels,
            rest_density,
            rest_gradient,
            neighbors: NeighborGrid::default(),
            predicted: Vec::new(),
            densities: Vec::new(),
            lambdas: Vec::new(),
            deltas: Vec::new(),
            velocity_scratch: Vec::new(),
            contacts: Vec::new(),
        }
    }

    pub fn kernels(&self) -> &SphKernels {
        &self.kernels
    }

    pub fn rest_density(&self) -> f32 {
        self.rest_density
    }

    pub fn densities(&self) -> &[f32] {
        &self.densities
    }

    /// Advance the particles by `dt`, split into the configured substeps.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn step(
        &mut self,
        def: &ParticleSystemDef,
        positions: &mut [Vec2],
        velocities: &mut [Vec2],
        flags: &[ParticleFlags],
        bodies: &mut [Body],
        gravity: Vec2,
        dt: f32,
        iterations: u32,
    ) {
        if positions.is_empty() || dt <= 0.0 {
            return;
        }

        let substeps = def.particle_iterations.max(1);
        let substep_dt = dt / substeps as f32;
        for _ in 0..substeps {
            self.substep(def, positions, velocities, flags, bodies, gravity, substep_dt, iterations.max(1));
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn substep(
        &mut self,
        def: &ParticleSystemDef,
        positions: &mut [Vec2],
        velocities: &mut [Vec2],
        flags: &[ParticleFlags],
        bodies: &mut [Body],
        gravity: Vec2,
        dt: f32,
        iterations: u32,
    ) {
        let n = positions.len();
        self.predicted.resize(n, Vec2::ZERO);
        self.densities.resize(n, 0.0);
        self.lambdas.resize(n, 0.0);
        self.deltas.resize(n, Vec2::ZERO);

        // 1. Apply external forces, limit speed and predict positions
        let critical_velocity = def.critical_velocity_ratio * def.diameter() / dt;
        let critical_sq = critical_velocity * critical_velocity;
        for i in 0..n {
            if flags[i].contains(ParticleFlags::WALL) {
                velocities[i] = Vec2::ZERO;
                self.predicted[i] = positions[i];
                continue;
            }
            let mut v = velocities[i] + gravity * dt;
            let speed_sq = v.length_squared();
            if speed_sq > critical_sq {
                v *= (critical_sq / speed_sq).sqrt();
            }
            velocities[i] = v;
            self.predicted[i] = positions[i] + v * dt;
        }
        self.contacts.clear();
        self.collide(positions, flags, bodies, def.radius);

        // 2. Neighbour lists are built once and reused by every iteration
        self.neighbors.build(&self.predicted, self.kernels.smoothing_length());

        // 3. Solve density constraints
        let max_correction = 0.25 * def.diameter();
        for _ in 0..iterations {
            self.compute_density_and_lambda(def, flags);
            self.compute_delta_positions(def);
            for i in 0..n {
                if flags[i].contains(ParticleFlags::WALL) {
                    continue;
                }
                self.predicted[i] += self.deltas[i].clamp_length_max(max_correction);
            }
            self.collide(positions, flags, bodies, def.radius);
        }

        // 4. Update velocities from position change
        let inv_dt = 1.0 / dt;
        for i in 0..n {
            if !flags[i].contains(ParticleFlags::WALL) {
                velocities[i] = (self.predicted[i] - positions[i]) * inv_dt;
            }
        }

        // 5. XSPH viscosity
        self.apply_viscosity(def, velocities, flags);

        // 6. Exchange momentum with the bodies touched during this substep
        self.merge_contacts();
        self.resolve_body_contacts(def, velocities, bodies);

        // 7. Commit predicted positions
        positions.copy_from_slice(&self.predicted);
    }

    fn compute_density_and_lambda(&mut self, def: &ParticleSystemDef, flags: &[ParticleFlags]) {
        let rest_density = self.rest_density;
        let epsilon = def.relaxation * self.rest_gradient;
        let self_density = self.kernels.poly6(0.0);

        for i in 0..self.predicted.len() {
            let pi = self.predicted[i];
            let mut density = self_density;
            let mut grad_i = Vec2::ZERO;
            let mut grad_sum_sq = 0.0;

            for &j in self.neighbors.neighbors(i) {
                let r = pi - self.predicted[j as usize];
                let r_sq = r.length_squared();
                density += self.kernels.poly6(r_sq);

                let grad = self.kernels.spiky_gradient(r) / rest_density;
                grad_i += grad;
                grad_sum_sq += grad.length_squared();
            }
            self.densities[i] = density;

            // Under-dense particles pull their neighbours in, but only a little.
            let cohesion = if flags[i].contains(ParticleFlags::TENSILE) {
                def.tensile_cohesion
            } else {
                def.cohesion
            };
            let constraint = (density / rest_density - 1.0).max(-cohesion);

            self.lambdas[i] = -constraint / (grad_sum_sq + grad_i.length_squared() + epsilon);
        }
    }

    fn compute_delta_positions(&mut self, def: &ParticleSystemDef) {
        let rest_density = self.rest_density;

        // Artificial pressure (tensile instability correction)
        let delta_q = def.artificial_pressure_radius * self.kernels.smoothing_length();
        let w_delta_q = self.kernels.poly6(delta_q * delta_q);
        let k = if w_delta_q > 1e-9 {
            def.artificial_pressure / self.rest_gradient
        } else {
            0.0
        };

        for i in 0..self.predicted.len() {
            let pi = self.predicted[i];
            let lambda_i = self.lambdas[i];
            let mut delta = Vec2::ZERO;

            for &j in self.neighbors.neighbors(i) {
                let j = j as usize;
                let r = pi - self.predicted[j];
                let r_sq = r.length_squared();
                let grad = self.kernels.spiky_gradient(r);
                if grad == Vec2::ZERO {
                    continue;
                }

                let s_corr = if k > 0.0 {
                    -k * (self.kernels.poly6(r_sq) / w_delta_q).powi(4)
                } else {
                    0.0
                };

                delta += (lambda_i + self.lambdas[j] + s_corr) * grad;
            }

            self.deltas[i] = delta / rest_density;
        }
    }

    /// Shepard-normalized XSPH velocity smoothing.
    fn apply_viscosity(&mut self, def: &ParticleSystemDef, velocities: &mut [Vec2], flags: &[ParticleFlags]) {
        if def.viscosity < 1e-6 && def.viscous_strength < 1e-6 {
            return;
        }

        self.velocity_scratch.clear();
        self.velocity_scratch.extend_from_slice(velocities);

        for i in 0..self.predicted.len() {
            if flags[i].contains(ParticleFlags::WALL) {
                continue;
            }
            let c = if flags[i].contains(ParticleFlags::VISCOUS) {
                def.viscous_strength
            } else {
                def.viscosity
            };
            if c < 1e-6 {
                continue;
            }

            let pi = self.predicted[i];
            let vi = self.velocity_scratch[i];
            let mut correction = Vec2::ZERO;
            let mut weight = 0.0;

            for &j in self.neighbors.neighbors(i) {
                let j = j as usize;
                let w = self.kernels.poly6((pi - self.predicted[j]).length_squared());
                correction += (self.velocity_scratch[j] - vi) * w;
                weight += w;
            }

            if weight > 0.0 {
                let density = weight + self.kernels.poly6(0.0);
                velocities[i] = vi + c * correction / density;
            }
        }
    }

    /// Keep predicted positions out of every body, recording the contacts.
    /// Contacts accumulate until the next substep.
    fn collide(&mut self, positions: &[Vec2], flags: &[ParticleFlags], bodies: &[Body], radius: f32) {
        for (i, predicted) in self.predicted.iter_mut().enumerate() {
            if flags[i].contains(ParticleFlags::WALL) {
                continue;
            }
            for (b, body) in bodies.iter().enumerate() {
                if let Some(hit) = body.shape().push_out(body.position(), positions[i], *predicted, radius) {
                    *predicted = hit.point;
                    self.contacts.push(ParticleContact {
                        particle: i,
                        body: b,
                        normal: hit.normal,
                    });
                }
            }
        }
    }

    /// One contact per (particle, body) pair, keeping the latest normal.
    fn merge_contacts(&mut self) {
        self.contacts.sort_by_key(|c| (c.particle, c.body));
        self.contacts.dedup_by(|next, kept| {
            let same = next.particle == kept.particle && next.body == kept.body;
            if same {
                kept.normal = next.normal;
            }
            same
        });
    }

    /// Apply friction and remove approaching velocity against touched
    /// bodies. Dynamic bodies receive the opposite impulse.
    fn resolve_body_contacts(&self, def: &ParticleSystemDef, velocities: &mut [Vec2], bodies: &mut [Body]) {
        let particle_mass = def.particle_mass();

        for contact in &self.contacts {
            let body = &mut bodies[contact.body];
            let body_velocity = body.velocity;
            let relative = velocities[contact.particle] - body_velocity;
            let vn = relative.dot(contact.normal);

            let tangent = relative - contact.normal * vn;
            let resolved = tangent * (1.0 - def.friction) + contact.normal * vn.max(0.0);
            let change = resolved - relative;
            if change == Vec2::ZERO {
                continue;
            }
            velocities[contact.particle] = body_velocity + resolved;
            if !body.is_static() {
                body.velocity -= change * particle_mass * body.inv_mass();
            }
        }
    }

    pub(crate) fn contacts(&self) -> &[ParticleContact] {
        &self.contacts
    }
}

/// Density and squared constraint gradient of a particle surrounded by a
/// full square lattice of spacing `stride`.
fn lattice_rest_state(kernels: &SphKernels, stride: f32) -> (f32, f32) {
    let reach = (kernels.smoothing_length() / stride).ceil() as i32;
    let mut density = 0.0;
    let mut grad_sq = 0.0;

    for y in -reach..=reach {
        for x in -reach..=reach {
            let r = IVec2::new(x, y).as_vec2() * stride;
            density += kernels.poly6(r.length_squared());
            grad_sq += kernels.spiky_gradient(r).length_squared();
        }
    }

    (density, grad_sq / (density * density))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::body::BodyDef;

    #[test]
    fn test_poly6_kernel() {
        let kernels = SphKernels::new(1.0);

        // At r=0, kernel should be maximum
        let w_0 = kernels.poly6(0.0);
        assert!(w_0 > 0.0);

        // At r=h, kernel should be 0
        assert!(kernels.poly6(1.0).abs() < 1e-6);

        // Kernel should decrease with distance
        let w_half = kernels.poly6(0.25);
        assert!(w_half < w_0);
        assert!(w_half > 0.0);
    }

    #[test]
    fn test_poly6_is_normalized() {
        // ∫ W dA over the disc should be 1.
        let h = 0.06;
        let kernels = SphKernels::new(h);
        let steps = 400;
        let dr = h / steps as f32;
        let integral: f32 = (0..steps)
            .map(|k| {
                let r = (k as f32 + 0.5) * dr;
                kernels.poly6(r * r) * 2.0 * PI * r * dr
            })
            .sum();
        assert!((integral - 1.0).abs() < 1e-2, "integral {integral}");
    }

    #[test]
    fn test_spiky_gradient() {
        let kernels = SphKernels::new(1.0);

        // At r=0, gradient should be zero (undefined direction)
        assert!(kernels.spiky_gradient(Vec2::ZERO).length() < 1e-6);

        // Gradient points from i towards j
        let grad = kernels.spiky_gradient(Vec2::new(0.5, 0.0));
        assert!(grad.x < 0.0);
        assert_eq!(grad.y, 0.0);
    }

    #[test]
    fn test_rest_state_is_positive() {
        let def = ParticleSystemDef::default();
        let solver = PbfSolver::new(&def);
        assert!(solver.rest_density() > solver.kernels().poly6(0.0));
        assert!(solver.rest_gradient > 0.0);
    }

    #[test]
    fn test_lone_particle_falls_freely() {
        let def = ParticleSystemDef::default();
        let mut solver = PbfSolver::new(&def);
        let mut positions = vec![Vec2::new(1.0, 1.0)];
        let mut velocities = vec![Vec2::ZERO];
        let flags = vec![ParticleFlags::WATER];
        let dt = 1.0 / 60.0;

        solver.step(&def, &mut positions, &mut velocities, &flags, &mut [], Vec2::new(0.0, 10.0), dt, 3);

        let expected = 10.0 * dt * dt;
        assert!((positions[0].y - 1.0 - expected).abs() < 1e-6);
        assert_eq!(positions[0].x, 1.0);
    }

    #[test]
    fn test_speed_is_limited_to_critical_velocity() {
        let def = ParticleSystemDef::default();
        let mut solver = PbfSolver::new(&def);
        let mut positions = vec![Vec2::ZERO];
        let mut velocities = vec![Vec2::new(0.0, 100.0)];
        let flags = vec![ParticleFlags::WATER];
        let dt = 1.0 / 60.0;

        solver.step(&def, &mut positions, &mut velocities, &flags, &mut [], Vec2::ZERO, dt, 1);

        let critical = def.diameter() / dt;
        assert!(velocities[0].length() <= critical * 1.001);
        assert!(positions[0].y <= def.diameter() * 1.001);
    }

    #[test]
    fn test_compressed_pair_separates() {
        let def = ParticleSystemDef::default();
        let mut solver = PbfSolver::new(&def);
        let mut positions = vec![Vec2::ZERO, Vec2::new(0.005, 0.0)];
        let mut velocities = vec![Vec2::ZERO; 2];
        // Pack a dense cluster around them so the pair is over rest density.
        for y in -3..=3 {
            for x in -3..=3 {
                if (x, y) != (0, 0) {
                    positions.push(Vec2::new(x as f32, y as f32) * 0.02);
                    velocities.push(Vec2::ZERO);
                }
            }
        }
        let flags = vec![ParticleFlags::WATER; positions.len()];
        let before = positions[1].x - positions[0].x;

        solver.step(&def, &mut positions, &mut velocities, &flags, &mut [], Vec2::ZERO, 1.0 / 60.0, 3);

        let after = positions[1].x - positions[0].x;
        assert!(after > before, "gap {before} -> {after}");
    }

    #[test]
    fn test_wall_particles_do_not_move() {
        let def = ParticleSystemDef::default();
        let mut solver = PbfSolver::new(&def);
        let mut positions = vec![Vec2::ZERO, Vec2::new(0.01, 0.0)];
        let mut velocities = vec![Vec2::ZERO; 2];
        let flags = vec![ParticleFlags::WALL, ParticleFlags::WATER];

        solver.step(&def, &mut positions, &mut velocities, &flags, &mut [], Vec2::new(0.0, 10.0), 1.0 / 60.0, 3);

        assert_eq!(positions[0], Vec2::ZERO);
        assert_eq!(velocities[0], Vec2::ZERO);
        assert!(positions[1].y > 0.0);
    }

    #[test]
    fn test_particle_stops_on_static_body() {
        let def = ParticleSystemDef::default();
        let mut solver = PbfSolver::new(&def);
        let mut bodies = vec![Body::from_def(&BodyDef::static_box(
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 0.1),
        ))];
        let mut positions = vec![Vec2::new(0.0, 0.87)];
        let mut velocities = vec![Vec2::new(0.0, 2.0)];
        let flags = vec![ParticleFlags::WATER];

        for _ in 0..30 {
            solver.step(&def, &mut positions, &mut velocities, &flags, &mut bodies, Vec2::new(0.0, 10.0), 1.0 / 60.0, 3);
        }

        assert!((positions[0].y - 0.88).abs() < 1e-4, "y = {}", positions[0].y);
        assert!(velocities[0].y.abs() < 1e-3);
        assert_eq!(bodies[0].position(), Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_particles_push_dynamic_body() {
        let def = ParticleSystemDef::default();
        let mut solver = PbfSolver::new(&def);
        let mut bodies = vec![Body::from_def(&BodyDef::dynamic_box(Vec2::new(0.0, 1.0), Vec2::splat(0.1), 0.01))];
        let mut positions = vec![Vec2::new(0.0, 0.875)];
        let mut velocities = vec![Vec2::new(0.0, 1.0)];
        let flags = vec![ParticleFlags::WATER];

        solver.step(&def, &mut positions, &mut velocities, &flags, &mut bodies, Vec2::ZERO, 1.0 / 60.0, 1);

        assert_eq!(solver.contacts().len(), 1);
        assert_eq!(solver.contacts()[0].normal, Vec2::new(0.0, -1.0));
        assert!(bodies[0].velocity().y > 0.0);
        assert!(velocities[0].y.abs() < 1e-4);
    }

    #[test]
    fn test_resting_contact_is_kept_each_step() {
        let def = ParticleSystemDef::default();
        let mut solver = PbfSolver::new(&def);
        let mut bodies = vec![Body::from_def(&BodyDef::dynamic_box(Vec2::new(0.0, 1.0), Vec2::splat(0.1), 0.01))];
        let mut positions = vec![Vec2::new(0.0, 0.88)];
        let mut velocities = vec![Vec2::ZERO];
        let flags = vec![ParticleFlags::WATER];

        for _ in 0..5 {
            bodies[0].velocity = Vec2::ZERO;
            solver.step(&def, &mut positions, &mut velocities, &flags, &mut bodies, Vec2::new(0.0, 10.0), 1.0 / 60.0, 3);

            assert_eq!(solver.contacts().len(), 1);
            assert!((positions[0].y - 0.88).abs() < 1e-4);
            assert!(bodies[0].velocity().y >= -1e-6);
        }
    }

    #[test]
    fn test_sliding_particle_loses_tangential_speed() {
        let def = ParticleSystemDef::default();
        let mut solver = PbfSolver::new(&def);
        let mut bodies = vec![Body::from_def(&BodyDef::static_box(
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 0.1),
        ))];
        let mut positions = vec![Vec2::new(0.0, 0.88)];
        let mut velocities = vec![Vec2::new(1.0, 0.0)];
        let flags = vec![ParticleFlags::WATER];
        let mut last = velocities[0].x;

        for _ in 0..10 {
            solver.step(&def, &mut positions, &mut velocities, &flags, &mut bodies, Vec2::new(0.0, 10.0), 1.0 / 60.0, 3);

            assert_eq!(solver.contacts().len(), 1);
            assert!(velocities[0].x < last, "no friction: {} -> {}", last, velocities[0].x);
            assert!((positions[0].y - 0.88).abs() < 1e-4);
            last = velocities[0].x;
        }

        let expected = (1.0 - def.friction).powi(10);
        assert!((last - expected).abs() < 1e-3, "vx = {last}, expected {expected}");
        assert_eq!(bodies[0].position(), Vec2::new(0.0, 1.0));
    }
}
