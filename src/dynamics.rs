//! Per-step field estimation and integration: density summation, the Tait
//! equation of state, pressure/viscosity accelerations, and semi-implicit
//! Euler with an optional XSPH position path.
//!
//! All functions operate on dense, index-stable particle arrays; neighbor
//! lists are indices into those arrays and must come from a search over the
//! current positions.

use lin_alg::f64::Vec3;

use crate::{kernel::SmoothingKernel, Particle};

/// Densities at or below this are treated as degenerate: any term that would
/// divide by them is skipped for that particle, rather than emitting NaN.
pub const DENSITY_FLOOR: f64 = 1e-9;

/// External and viscous force inputs for the acceleration pass.
#[derive(Clone, Copy, Debug)]
pub struct ForceParams {
    /// Applied directly as an acceleration.
    pub gravity: Vec3,
    /// Monaghan artificial-viscosity coefficient α. Zero disables the term.
    pub viscosity_alpha: f64,
    /// Numerical speed of sound used by the viscosity term.
    pub speed_of_sound: f64,
}

/// SPH density estimate, written into `fluid[i].density` in place.
///
/// Convention: the fluid searcher excludes self, so the self term
/// `m_i · W(0)` is added explicitly here. Boundary neighbors contribute with
/// their own (volume-derived) masses.
pub fn update_density(
    fluid: &mut [Particle],
    boundary: &[Particle],
    fluid_nbrs: &[Vec<usize>],
    boundary_nbrs: &[Vec<usize>],
    kernel: &SmoothingKernel,
    radius: f64,
) {
    for i in 0..fluid.len() {
        let pos_i = fluid[i].posit;

        let mut density = fluid[i].mass * kernel.value(pos_i, pos_i, radius);

        for &j in &fluid_nbrs[i] {
            density += fluid[j].mass * kernel.value(pos_i, fluid[j].posit, radius);
        }
        for &b in &boundary_nbrs[i] {
            density += boundary[b].mass * kernel.value(pos_i, boundary[b].posit, radius);
        }

        fluid[i].density = density;
    }
}

/// Tait-like equation of state, clamped at zero: no tensile forces between
/// fluid particles.
pub fn tait_pressure(density: f64, rest_density: f64, stiffness: f64) -> f64 {
    (stiffness * (density / rest_density - 1.)).max(0.)
}

/// Pressure + artificial-viscosity + gravity acceleration, written into
/// `fluid[i].accel`.
///
/// Boundary neighbors mirror the querying fluid particle's own pressure;
/// boundary particles carry no pressure field of their own.
pub fn update_accelerations(
    fluid: &mut [Particle],
    boundary: &[Particle],
    pressures: &[f64],
    fluid_nbrs: &[Vec<usize>],
    boundary_nbrs: &[Vec<usize>],
    kernel: &SmoothingKernel,
    radius: f64,
    params: &ForceParams,
) {
    let h = radius / kernel.kind.radius_divisor();

    for i in 0..fluid.len() {
        let rho_i = fluid[i].density;
        if rho_i <= DENSITY_FLOOR {
            // Degenerate density: suppress all forces on this particle for
            // the step instead of dividing by it.
            fluid[i].accel = Vec3::new_zero();
            continue;
        }

        let pos_i = fluid[i].posit;
        let vel_i = fluid[i].vel;
        let p_term_i = pressures[i] / rho_i.powi(2);

        let mut acc = params.gravity;

        for &j in &fluid_nbrs[i] {
            let rho_j = fluid[j].density;
            if rho_j <= DENSITY_FLOOR {
                continue;
            }

            let grad = kernel.gradient(pos_i, fluid[j].posit, radius);
            acc -= grad * (fluid[j].mass * (p_term_i + pressures[j] / rho_j.powi(2)));

            if params.viscosity_alpha > 0. {
                acc += viscosity_accel(
                    pos_i - fluid[j].posit,
                    vel_i - fluid[j].vel,
                    rho_i,
                    rho_j,
                    fluid[j].mass,
                    grad,
                    h,
                    params,
                );
            }
        }

        for &b in &boundary_nbrs[i] {
            let rho_b = boundary[b].density;
            if rho_b <= DENSITY_FLOOR {
                continue;
            }

            let grad = kernel.gradient(pos_i, boundary[b].posit, radius);
            // Mirrored pressure: the boundary side uses this particle's own p.
            acc -= grad * (boundary[b].mass * (p_term_i + pressures[i] / rho_b.powi(2)));

            if params.viscosity_alpha > 0. {
                acc += viscosity_accel(
                    pos_i - boundary[b].posit,
                    vel_i - boundary[b].vel,
                    rho_i,
                    rho_b,
                    boundary[b].mass,
                    grad,
                    h,
                    params,
                );
            }
        }

        fluid[i].accel = acc;
    }
}

/// Monaghan artificial viscosity for one neighbor pair. Active only for
/// approaching pairs; damps velocity divergence along the connecting line.
fn viscosity_accel(
    x_ij: Vec3,
    v_ij: Vec3,
    rho_i: f64,
    rho_j: f64,
    mass_j: f64,
    grad: Vec3,
    h: f64,
    params: &ForceParams,
) -> Vec3 {
    let approach = v_ij.dot(x_ij);
    if approach >= 0. {
        return Vec3::new_zero();
    }

    let mu = h * approach / (x_ij.magnitude_squared() + 0.01 * h.powi(2));
    let pi_ij = -params.viscosity_alpha * params.speed_of_sound * mu / (0.5 * (rho_i + rho_j));

    grad * (-mass_j * pi_ij)
}

/// Velocity half of semi-implicit (symplectic) Euler.
pub fn integrate_velocities(fluid: &mut [Particle], dt: f64) {
    for p in fluid {
        p.vel += p.accel * dt;
    }
}

/// Position half, advancing with each particle's stored velocity.
pub fn integrate_positions(fluid: &mut [Particle], dt: f64) {
    for p in fluid {
        p.posit += p.vel * dt;
    }
}

/// Position half using externally supplied (e.g. XSPH-blended) velocities;
/// stored velocities stay untouched.
pub fn integrate_positions_with(fluid: &mut [Particle], velocities: &[Vec3], dt: f64) {
    for (p, v) in fluid.iter_mut().zip(velocities) {
        p.posit += *v * dt;
    }
}

/// XSPH correction: blend each velocity toward the neighbor-weighted average.
/// Returns the blended velocities for the position update only.
pub fn xsph_velocities(
    fluid: &[Particle],
    fluid_nbrs: &[Vec<usize>],
    kernel: &SmoothingKernel,
    radius: f64,
    eps: f64,
) -> Vec<Vec3> {
    fluid
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let mut correction = Vec3::new_zero();

            for &j in &fluid_nbrs[i] {
                let rho_j = fluid[j].density;
                if rho_j <= DENSITY_FLOOR {
                    continue;
                }
                let w = kernel.value(p.posit, fluid[j].posit, radius);
                correction += (fluid[j].vel - p.vel) * (fluid[j].mass / rho_j * w);
            }

            p.vel + correction * eps
        })
        .collect()
}
