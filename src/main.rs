//! SPH fluid simulation core: WCSPH and PBF solvers over a shared kernel /
//! neighbor-search / particle-function stack. This binary is the headless
//! driver: it builds a scenario, steps the solver, and writes a simulation
//! record for playback and surface reconstruction tools to consume.

use std::{env, path::Path, time::Instant};

use bincode::{Decode, Encode};
use lin_alg::f64::Vec3;

use crate::{
    error::Result,
    kernel::KernelKind,
    neighbors::SearchStrategy,
    playback::SimRecord,
    scene::Scenario,
    solver::{Simulator, SolverKind},
};

mod boundary;
mod dynamics;
mod error;
mod kernel;
mod neighbors;
mod playback;
mod properties;
mod scene;
mod solver;
mod util;

const SAVE_FILE: &str = "config.sph";

/// How often to print step timing.
const BENCH_RATIO: usize = 100;

#[derive(Clone, Debug, Encode, Decode)]
pub struct Config {
    pub num_timesteps: usize,
    pub dt: f64,
    /// Shared by the kernel and the neighbor search; h derives from this by
    /// the kernel family's divisor.
    pub support_radius: f64,
    /// Lattice spacing for scene generation.
    pub particle_spacing: f64,
    /// Display radius, passed through to the record for renderers.
    pub particle_radius: f64,
    pub rest_density: f64,
    /// Tait stiffness constant B (WCSPH only).
    pub stiffness: f64,
    /// Numerical speed of sound, used by the artificial-viscosity term.
    pub speed_of_sound: f64,
    /// Artificial-viscosity α; zero disables the term.
    pub viscosity_alpha: f64,
    /// XSPH blend factor ε; zero disables the correction.
    pub xsph_eps: f64,
    /// Constraint-projection iterations per PBF step.
    pub pbf_iterations: usize,
    pub gravity: Vec3,
    pub kernel: KernelKind,
    pub solver: SolverKind,
    pub search: SearchStrategy,
    pub scenario: Scenario,
    /// Fluid lattice jitter, as a fraction of the spacing.
    pub jitter: f64,
    /// Record a snapshot every this many steps.
    pub snapshot_ratio: usize,
    pub output: String,
}

impl Default for Config {
    fn default() -> Self {
        let particle_spacing = 0.05;

        Self {
            num_timesteps: 2_000,
            dt: 1.0e-3,
            // 4x spacing; h = 2x spacing for M4.
            support_radius: 4. * particle_spacing,
            particle_spacing,
            particle_radius: particle_spacing / 2.,
            rest_density: 1_000.,
            stiffness: 1_000.,
            speed_of_sound: 30.,
            viscosity_alpha: 0.02,
            xsph_eps: 0.,
            pbf_iterations: 5,
            gravity: Vec3::new(0., -9.81, 0.),
            kernel: KernelKind::M4,
            solver: SolverKind::Wcsph,
            search: SearchStrategy::Grid,
            scenario: Scenario::DamBreak,
            jitter: 0.01,
            snapshot_ratio: 8,
            output: String::from("record.sph"),
        }
    }
}

impl Config {
    /// Optional positional overrides: `sph_flow [solver] [kernel]`.
    /// Unknown tags are fatal configuration errors.
    fn apply_cli_overrides(&mut self, args: &[String]) -> Result<()> {
        if let Some(tag) = args.get(1) {
            self.solver = tag.parse()?;
        }
        if let Some(tag) = args.get(2) {
            self.kernel = tag.parse()?;
        }
        Ok(())
    }
}

/// One fluid or boundary particle. Arrays of these are dense, order-stable
/// and index-addressed; neighbor lists index into them, so reordering is
/// forbidden once a step's search has run.
#[derive(Clone, Debug)]
pub struct Particle {
    pub posit: Vec3,
    pub vel: Vec3,
    pub accel: Vec3,
    pub mass: f64,
    /// Local density estimate, refreshed each step.
    pub density: f64,
}

struct State {
    config: Config,
    sim: Simulator,
    record: SimRecord,
}

fn run(state: &mut State) -> Result<()> {
    println!(
        "Running: {} steps, {} solver, {} kernel, {} fluid / {} boundary particles",
        state.config.num_timesteps,
        state.config.solver.to_str(),
        state.config.kernel.to_str(),
        state.sim.fluid().len(),
        state.sim.boundary().len(),
    );

    // Initial snapshot; t=0.
    state.record.record_state(&state.sim);

    let mut start_time_step = Instant::now();

    for t in 0..state.config.num_timesteps {
        if t % BENCH_RATIO == 0 {
            start_time_step = Instant::now();
        }

        state.sim.step()?;

        if t % BENCH_RATIO == 0 {
            println!(
                "t: {t} Step time: {}μs",
                start_time_step.elapsed().as_micros()
            );
        }

        if t % state.config.snapshot_ratio == 0 {
            state.record.record_state(&state.sim);
        }
    }

    println!(
        "Run complete. {} frames recorded.",
        state.record.frames.len()
    );
    Ok(())
}

fn main() {
    let mut config = match util::load::<Config>(Path::new(SAVE_FILE)) {
        Ok(cfg) => {
            println!("Loaded config from {SAVE_FILE}");
            cfg
        }
        Err(_) => Config::default(),
    };

    let args: Vec<String> = env::args().collect();
    if let Err(e) = config.apply_cli_overrides(&args) {
        eprintln!("Configuration error: {e}");
        std::process::exit(1);
    }

    let sim = match Simulator::new(&config) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("Failed to set up the simulation: {e}");
            std::process::exit(1);
        }
    };

    let record = SimRecord::new(&sim, config.rest_density);
    let mut state = State {
        config,
        sim,
        record,
    };

    if let Err(e) = run(&mut state) {
        eprintln!("Simulation aborted: {e}");
        std::process::exit(1);
    }

    if let Err(e) = util::save(Path::new(&state.config.output), &state.record) {
        eprintln!("Error saving the simulation record: {e}");
    } else {
        println!("Record saved to {}", state.config.output);
    }

    let profile = properties::density_profile(state.sim.fluid(), state.config.rest_density);
    properties::plot_density_profile(&profile, state.config.scenario.to_str());
}
