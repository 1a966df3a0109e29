//! The simulation record: an ordered sequence of per-frame particle
//! snapshots plus run metadata, for later playback and surface
//! reconstruction. This module owns the in-memory record only; file I/O goes
//! through `util::save`/`util::load`.

use bincode::{Decode, Encode};
use lin_alg::{f32::Vec3 as Vec3f32, f64::Vec3};

use crate::{kernel::KernelKind, solver::SolverKind, Simulator};

// To save memory, snapshots are stored as f32; we only need f64 precision
// during the integration.

#[derive(Debug, Encode, Decode)]
pub struct SnapShot {
    pub time: f32,
    pub dt: f32,
    pub fluid_posits: Vec<Vec3f32>,
    pub fluid_vels: Vec<Vec3f32>,
    pub densities: Vec<f32>,
}

/// Run metadata plus every recorded frame. The boundary is snapshotted once;
/// mobile-boundary playback re-derives positions from the motion parameters
/// if needed.
#[derive(Debug, Encode, Decode)]
pub struct SimRecord {
    pub dt: f64,
    pub support_radius: f64,
    pub rest_density: f64,
    pub particle_radius: f64,
    pub solver: SolverKind,
    pub kernel: KernelKind,
    pub boundary_posits: Vec<Vec3f32>,
    pub frames: Vec<SnapShot>,
}

impl SimRecord {
    pub fn new(sim: &Simulator, rest_density: f64) -> Self {
        Self {
            dt: sim.dt(),
            support_radius: sim.support_radius(),
            rest_density,
            particle_radius: sim.particle_radius(),
            solver: sim.solver_kind(),
            kernel: sim.kernel().kind,
            boundary_posits: sim.boundary().iter().map(|p| vec3_to_f32(p.posit)).collect(),
            frames: Vec::new(),
        }
    }

    /// Append an immutable snapshot of the current fluid state.
    pub fn record_state(&mut self, sim: &Simulator) {
        self.frames.push(SnapShot {
            time: sim.time_elapsed() as f32,
            dt: sim.dt() as f32,
            fluid_posits: sim.fluid().iter().map(|p| vec3_to_f32(p.posit)).collect(),
            fluid_vels: sim.fluid().iter().map(|p| vec3_to_f32(p.vel)).collect(),
            densities: sim.fluid().iter().map(|p| p.density as f32).collect(),
        });
    }
}

pub fn vec3_to_f32(v: Vec3) -> Vec3f32 {
    Vec3f32::new(v.x as f32, v.y as f32, v.z as f32)
}
