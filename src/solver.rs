//! The simulation state machine: owns the particle arrays and the
//! kernel/searcher pair, and sequences one step of either solver strategy.
//!
//! Lifecycle: construction generates the scene and boundary masses
//! (uninitialized → generated); `step` advances one frame at a time; the
//! driver records and persists state between steps. Callers only ever observe
//! the post-step consistent state.

use std::str::FromStr;

use bincode::{Decode, Encode};
use lin_alg::f64::Vec3;

use crate::{
    boundary::{self, BoundaryMotion},
    dynamics::{self, ForceParams},
    error::{Result, SphError},
    kernel::SmoothingKernel,
    neighbors::NeighborSearcher,
    scene::Scene,
    Config, Particle,
};

/// Regularization added to the PBF lambda denominator so an isolated particle
/// (zero constraint gradient) cannot divide by zero.
const PBF_RELAXATION: f64 = 1e-6;

/// Solver strategy, fixed for the simulation's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub enum SolverKind {
    /// Weakly-compressible SPH: equation-of-state pressure force.
    Wcsph,
    /// Position-Based Fluids: iterative density-constraint projection.
    Pbf,
}

impl SolverKind {
    pub fn to_str(self) -> &'static str {
        match self {
            Self::Wcsph => "wcsph",
            Self::Pbf => "pbf",
        }
    }
}

impl FromStr for SolverKind {
    type Err = SphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "wcsph" => Ok(Self::Wcsph),
            "pbf" => Ok(Self::Pbf),
            _ => Err(SphError::UnknownSolverType(s.to_owned())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Simulator {
    fluid: Vec<Particle>,
    boundary: Vec<Particle>,
    /// Rest positions of every boundary particle; mobile ones are displaced
    /// from these by the closed-form motion.
    boundary_rest: Vec<Vec3>,
    motion: BoundaryMotion,
    mobile: std::ops::Range<usize>,

    kernel: SmoothingKernel,
    searcher: NeighborSearcher,
    solver: SolverKind,
    force_params: ForceParams,

    dt: f64,
    rest_density: f64,
    stiffness: f64,
    xsph_eps: f64,
    pbf_iterations: usize,
    particle_radius: f64,

    time_elapsed: f64,
}

impl Simulator {
    /// Build from a config, generating the configured scenario.
    pub fn new(config: &Config) -> Result<Self> {
        let scene =
            config
                .scenario
                .build(config.particle_spacing, config.rest_density, config.jitter);
        Self::from_scene(config, scene)
    }

    /// Build from externally supplied particle arrays. Fails on invalid
    /// configuration or an empty fluid set.
    pub fn from_scene(config: &Config, scene: Scene) -> Result<Self> {
        let kernel = SmoothingKernel::new(config.kernel, 3)?;
        let searcher = NeighborSearcher::new(config.support_radius, config.search)?;

        if scene.fluid.is_empty() {
            return Err(SphError::EmptyParticleSet);
        }

        let boundary_rest = scene.boundary.iter().map(|p| p.posit).collect();

        let mut result = Self {
            fluid: scene.fluid,
            boundary: scene.boundary,
            boundary_rest,
            motion: scene.motion,
            mobile: scene.mobile,
            kernel,
            searcher,
            solver: config.solver,
            force_params: ForceParams {
                gravity: config.gravity,
                viscosity_alpha: config.viscosity_alpha,
                speed_of_sound: config.speed_of_sound,
            },
            dt: config.dt,
            rest_density: config.rest_density,
            stiffness: config.stiffness,
            xsph_eps: config.xsph_eps,
            pbf_iterations: config.pbf_iterations,
            particle_radius: config.particle_radius,
            time_elapsed: 0.,
        };

        result.assign_boundary_masses()?;
        Ok(result)
    }

    pub fn fluid(&self) -> &[Particle] {
        &self.fluid
    }

    pub fn boundary(&self) -> &[Particle] {
        &self.boundary
    }

    pub fn time_elapsed(&self) -> f64 {
        self.time_elapsed
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn support_radius(&self) -> f64 {
        self.searcher.radius()
    }

    pub fn solver_kind(&self) -> SolverKind {
        self.solver
    }

    pub fn kernel(&self) -> &SmoothingKernel {
        &self.kernel
    }

    /// Display radius, for the rendering layer.
    pub fn particle_radius(&self) -> f64 {
        self.particle_radius
    }

    /// Mass from packing volume: m = ρ0 · V, with V from a self-inclusive
    /// boundary-boundary density sum.
    fn assign_boundary_masses(&mut self) -> Result<()> {
        if self.boundary.is_empty() {
            return Ok(());
        }

        let positions: Vec<Vec3> = self.boundary.iter().map(|p| p.posit).collect();
        let volumes = boundary::compute_volumes(&positions, &self.searcher, &self.kernel)?;

        for (p, v) in self.boundary.iter_mut().zip(volumes) {
            p.mass = self.rest_density * v;
        }
        Ok(())
    }

    /// Advance one frame.
    pub fn step(&mut self) -> Result<()> {
        self.advance_boundary();

        match self.solver {
            SolverKind::Wcsph => self.step_wcsph()?,
            SolverKind::Pbf => self.step_pbf()?,
        }

        self.time_elapsed += self.dt;
        Ok(())
    }

    /// Move the mobile boundary subset to its closed-form position for the end
    /// of this step; velocities by finite difference.
    fn advance_boundary(&mut self) {
        if self.mobile.is_empty() {
            return;
        }

        let t_next = self.time_elapsed + self.dt;
        for i in self.mobile.clone() {
            let new_posit = self.motion.position_at(self.boundary_rest[i], t_next);
            self.boundary[i].vel = (new_posit - self.boundary[i].posit) / self.dt;
            self.boundary[i].posit = new_posit;
        }
    }

    fn fluid_positions(&self) -> Vec<Vec3> {
        self.fluid.iter().map(|p| p.posit).collect()
    }

    fn boundary_positions(&self) -> Vec<Vec3> {
        self.boundary.iter().map(|p| p.posit).collect()
    }

    /// Fluid-fluid and fluid-boundary neighbor lists for the current
    /// positions. An absent boundary yields empty boundary rows.
    fn search_neighbors(&self) -> Result<(Vec<Vec<usize>>, Vec<Vec<usize>>)> {
        let fluid_pos = self.fluid_positions();
        let fluid_nbrs = self.searcher.find_neighbors(&fluid_pos)?;

        let boundary_nbrs = if self.boundary.is_empty() {
            vec![Vec::new(); self.fluid.len()]
        } else {
            self.searcher
                .find_neighbors_cross(&fluid_pos, &self.boundary_positions())?
        };

        Ok((fluid_nbrs, boundary_nbrs))
    }

    /// One WCSPH step: search → density → EOS pressure → accelerations →
    /// semi-implicit Euler (XSPH position path if enabled).
    fn step_wcsph(&mut self) -> Result<()> {
        let radius = self.searcher.radius();
        let (fluid_nbrs, boundary_nbrs) = self.search_neighbors()?;

        dynamics::update_density(
            &mut self.fluid,
            &self.boundary,
            &fluid_nbrs,
            &boundary_nbrs,
            &self.kernel,
            radius,
        );

        let pressures: Vec<f64> = self
            .fluid
            .iter()
            .map(|p| dynamics::tait_pressure(p.density, self.rest_density, self.stiffness))
            .collect();

        dynamics::update_accelerations(
            &mut self.fluid,
            &self.boundary,
            &pressures,
            &fluid_nbrs,
            &boundary_nbrs,
            &self.kernel,
            radius,
            &self.force_params,
        );

        dynamics::integrate_velocities(&mut self.fluid, self.dt);

        if self.xsph_eps > 0. {
            let blended = dynamics::xsph_velocities(
                &self.fluid,
                &fluid_nbrs,
                &self.kernel,
                radius,
                self.xsph_eps,
            );
            dynamics::integrate_positions_with(&mut self.fluid, &blended, self.dt);
        } else {
            dynamics::integrate_positions(&mut self.fluid, self.dt);
        }

        Ok(())
    }

    /// One PBF step: external forces → tentative advance → fixed number of
    /// constraint-projection iterations → velocity reconstruction.
    fn step_pbf(&mut self) -> Result<()> {
        let radius = self.searcher.radius();

        for p in &mut self.fluid {
            p.vel += self.force_params.gravity * self.dt;
        }

        let snapshot = self.fluid_positions();

        // Tentative advance. The XSPH variant needs densities at the
        // pre-advance positions, hence its own search + density pass.
        if self.xsph_eps > 0. {
            let (fluid_nbrs, boundary_nbrs) = self.search_neighbors()?;
            dynamics::update_density(
                &mut self.fluid,
                &self.boundary,
                &fluid_nbrs,
                &boundary_nbrs,
                &self.kernel,
                radius,
            );
            let blended = dynamics::xsph_velocities(
                &self.fluid,
                &fluid_nbrs,
                &self.kernel,
                radius,
                self.xsph_eps,
            );
            dynamics::integrate_positions_with(&mut self.fluid, &blended, self.dt);
        } else {
            dynamics::integrate_positions(&mut self.fluid, self.dt);
        }

        // Neighbor lists are built once from the predicted positions and kept
        // for all projection iterations.
        let (fluid_nbrs, boundary_nbrs) = self.search_neighbors()?;

        for _ in 0..self.pbf_iterations {
            dynamics::update_density(
                &mut self.fluid,
                &self.boundary,
                &fluid_nbrs,
                &boundary_nbrs,
                &self.kernel,
                radius,
            );

            let lambdas = self.pbf_lambdas(&fluid_nbrs, &boundary_nbrs, radius);
            let displacements =
                self.pbf_displacements(&lambdas, &fluid_nbrs, &boundary_nbrs, radius);

            // Jacobi-style: apply only after every displacement is computed.
            for (p, dp) in self.fluid.iter_mut().zip(displacements) {
                p.posit += dp;
            }
        }

        for (p, snap) in self.fluid.iter_mut().zip(&snapshot) {
            p.vel = (p.posit - *snap) / self.dt;
        }

        Ok(())
    }

    /// Per-particle Lagrange-multiplier-style scale factors for the density
    /// constraint C_i = ρ_i/ρ0 - 1.
    fn pbf_lambdas(
        &self,
        fluid_nbrs: &[Vec<usize>],
        boundary_nbrs: &[Vec<usize>],
        radius: f64,
    ) -> Vec<f64> {
        let rho0 = self.rest_density;

        self.fluid
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let constraint = p.density / rho0 - 1.;

                let mut grad_i = Vec3::new_zero();
                let mut sum_sq = 0.;

                for &j in &fluid_nbrs[i] {
                    let grad = self.kernel.gradient(p.posit, self.fluid[j].posit, radius)
                        * (self.fluid[j].mass / rho0);
                    grad_i += grad;
                    sum_sq += grad.magnitude_squared();
                }
                for &b in &boundary_nbrs[i] {
                    let grad = self.kernel.gradient(p.posit, self.boundary[b].posit, radius)
                        * (self.boundary[b].mass / rho0);
                    grad_i += grad;
                    sum_sq += grad.magnitude_squared();
                }
                sum_sq += grad_i.magnitude_squared();

                -constraint / (sum_sq + PBF_RELAXATION)
            })
            .collect()
    }

    /// Neighbor-weighted position corrections. Boundary neighbors reuse the
    /// fluid particle's own lambda in place of one of their own.
    fn pbf_displacements(
        &self,
        lambdas: &[f64],
        fluid_nbrs: &[Vec<usize>],
        boundary_nbrs: &[Vec<usize>],
        radius: f64,
    ) -> Vec<Vec3> {
        let rho0 = self.rest_density;

        self.fluid
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mut dp = Vec3::new_zero();

                for &j in &fluid_nbrs[i] {
                    let grad = self.kernel.gradient(p.posit, self.fluid[j].posit, radius);
                    dp += grad * (self.fluid[j].mass / rho0 * (lambdas[i] + lambdas[j]));
                }
                for &b in &boundary_nbrs[i] {
                    let grad = self.kernel.gradient(p.posit, self.boundary[b].posit, radius);
                    dp += grad * (self.boundary[b].mass / rho0 * (2. * lambdas[i]));
                }

                dp
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{kernel::KernelKind, neighbors::SearchStrategy, scene::Scenario};

    fn test_config(solver: SolverKind) -> Config {
        Config {
            num_timesteps: 10,
            dt: 1e-3,
            support_radius: 0.2,
            particle_spacing: 0.1,
            particle_radius: 0.05,
            rest_density: 1000.,
            stiffness: 1000.,
            speed_of_sound: 30.,
            viscosity_alpha: 0.02,
            xsph_eps: 0.,
            pbf_iterations: 5,
            gravity: Vec3::new(0., -9.81, 0.),
            kernel: KernelKind::M4,
            solver,
            search: SearchStrategy::Grid,
            scenario: Scenario::DamBreak,
            jitter: 0.,
            snapshot_ratio: 4,
            output: String::from("test_record.sph"),
        }
    }

    /// Two sparse particle blocks with no pair inside the support radius.
    fn isolated_scene(vel_a: Vec3, vel_b: Vec3) -> Scene {
        let spacing = 0.5; // Well above the 0.2 support radius.
        let mut fluid = Vec::new();

        for (corner, vel) in [(Vec3::new_zero(), vel_a), (Vec3::new(10., 0., 0.), vel_b)] {
            for i in 0..2 {
                for j in 0..2 {
                    for k in 0..2 {
                        fluid.push(Particle {
                            posit: corner
                                + Vec3::new(
                                    i as f64 * spacing,
                                    j as f64 * spacing,
                                    k as f64 * spacing,
                                ),
                            vel,
                            accel: Vec3::new_zero(),
                            mass: 0.125,
                            density: 0.,
                        });
                    }
                }
            }
        }

        Scene {
            fluid,
            boundary: Vec::new(),
            motion: BoundaryMotion::Static,
            mobile: 0..0,
        }
    }

    #[test]
    fn wcsph_step_keeps_density_positive() {
        let config = test_config(SolverKind::Wcsph);
        let mut sim = Simulator::new(&config).unwrap();

        for _ in 0..3 {
            sim.step().unwrap();
        }

        for p in sim.fluid() {
            assert!(p.density > 0., "density {}", p.density);
            assert!(p.posit.x.is_finite() && p.posit.y.is_finite() && p.posit.z.is_finite());
        }
    }

    #[test]
    fn pbf_step_is_deterministic() {
        let config = test_config(SolverKind::Pbf);
        let mut a = Simulator::new(&config).unwrap();
        let mut b = a.clone();

        for _ in 0..5 {
            a.step().unwrap();
            b.step().unwrap();
        }

        for (pa, pb) in a.fluid().iter().zip(b.fluid()) {
            assert_eq!((pa.posit - pb.posit).magnitude(), 0.);
            assert_eq!((pa.vel - pb.vel).magnitude(), 0.);
        }
    }

    #[test]
    fn isolated_blocks_move_in_straight_lines() {
        for solver in [SolverKind::Wcsph, SolverKind::Pbf] {
            let mut config = test_config(solver);
            config.gravity = Vec3::new_zero();
            config.viscosity_alpha = 0.;

            let vel_a = Vec3::new(0.5, 0., 0.);
            let vel_b = Vec3::new(-0.5, 0.2, 0.);
            let scene = isolated_scene(vel_a, vel_b);
            let starts: Vec<Vec3> = scene.fluid.iter().map(|p| p.posit).collect();

            let mut sim = Simulator::from_scene(&config, scene).unwrap();

            let n = 4;
            for _ in 0..n {
                sim.step().unwrap();
            }

            let t = n as f64 * config.dt;
            for (i, p) in sim.fluid().iter().enumerate() {
                let expected_vel = if i < 8 { vel_a } else { vel_b };
                let expected = starts[i] + expected_vel * t;

                assert!(
                    (p.posit - expected).magnitude() < 1e-10,
                    "{solver:?}: particle {i} drifted: {:?} vs {expected:?}",
                    p.posit
                );
                assert!((p.vel - expected_vel).magnitude() < 1e-10);
            }
        }
    }

    #[test]
    fn wave_tank_paddle_moves_between_steps() {
        let mut config = test_config(SolverKind::Wcsph);
        config.scenario = Scenario::WaveTank;
        config.particle_spacing = 0.1;

        let mut sim = Simulator::new(&config).unwrap();
        let mobile = sim.mobile.clone();
        assert!(!mobile.is_empty());

        let before = sim.boundary()[mobile.start].posit;
        for _ in 0..10 {
            sim.step().unwrap();
        }
        let after = sim.boundary()[mobile.start].posit;

        assert!(
            (after - before).magnitude() > 0.,
            "mobile boundary never moved"
        );
        // Static part of the shell stays put.
        let static_posit = sim.boundary()[0].posit;
        assert_eq!((static_posit - sim.boundary_rest[0]).magnitude(), 0.);
    }

    #[test]
    fn parses_solver_tags() {
        assert_eq!("wcsph".parse::<SolverKind>().unwrap(), SolverKind::Wcsph);
        assert_eq!("PBF".parse::<SolverKind>().unwrap(), SolverKind::Pbf);
        assert!(matches!(
            "sesph".parse::<SolverKind>(),
            Err(SphError::UnknownSolverType(_))
        ));
    }

    #[test]
    fn empty_fluid_scene_is_rejected() {
        let config = test_config(SolverKind::Wcsph);
        let scene = Scene {
            fluid: Vec::new(),
            boundary: Vec::new(),
            motion: BoundaryMotion::Static,
            mobile: 0..0,
        };

        assert_eq!(
            Simulator::from_scene(&config, scene).unwrap_err(),
            SphError::EmptyParticleSet
        );
    }
}
