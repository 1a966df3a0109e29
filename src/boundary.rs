//! Boundary-particle coupling: volume/mass assignment for static boundary
//! samples, and closed-form kinematics for mobile boundary subsets (wave
//! paddles, gates, rotating geometry).
//!
//! Boundary particles act purely as force sources; they never take part in
//! the fluid's own integration.

use bincode::{Decode, Encode};
use lin_alg::f64::{Quaternion, Vec3};

use crate::{error::Result, kernel::SmoothingKernel, neighbors::NeighborSearcher};

/// Per-particle boundary volumes from a self-inclusive boundary-boundary
/// density sum: V_i = 1 / Σ_j W_ij, with j ranging over the particle itself
/// and its boundary neighbors. The sum is always positive since the self term
/// W(0) is.
///
/// Mass then follows as `rest_density · V_i` (done by the caller, which owns
/// the particle array).
pub fn compute_volumes(
    positions: &[Vec3],
    searcher: &NeighborSearcher,
    kernel: &SmoothingKernel,
) -> Result<Vec<f64>> {
    let nbrs = searcher.find_neighbors_inclusive(positions)?;
    let radius = searcher.radius();

    Ok(positions
        .iter()
        .enumerate()
        .map(|(i, &pos)| {
            let mut sum = 0.;
            for &j in &nbrs[i] {
                sum += kernel.value(pos, positions[j], radius);
            }
            1. / sum
        })
        .collect())
}

/// Closed-form motion of the mobile boundary subset, as a pure function of
/// elapsed time and fixed parameters.
#[derive(Clone, Copy, Debug, Encode, Decode)]
pub enum BoundaryMotion {
    Static,
    /// Oscillation along `axis`: displacement = axis · amplitude · sin(ωt).
    Sinusoid {
        axis: Vec3,
        amplitude: f64,
        angular_freq: f64,
    },
    /// Constant-velocity translation.
    Translate { vel: Vec3 },
    /// Rotation about an axis through `center` at a fixed angular rate.
    Rotate {
        center: Vec3,
        axis: Vec3,
        angular_vel: f64,
    },
}

impl BoundaryMotion {
    /// Position at time `t` of a boundary particle whose rest position is
    /// `rest`.
    pub fn position_at(&self, rest: Vec3, t: f64) -> Vec3 {
        match *self {
            Self::Static => rest,
            Self::Sinusoid {
                axis,
                amplitude,
                angular_freq,
            } => rest + axis * (amplitude * (angular_freq * t).sin()),
            Self::Translate { vel } => rest + vel * t,
            Self::Rotate {
                center,
                axis,
                angular_vel,
            } => {
                let rotator = Quaternion::from_axis_angle(axis, angular_vel * t);
                center + rotator.rotate_vec(rest - center)
            }
        }
    }
}
