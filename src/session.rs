//! Session lifecycle around a single active simulation.

use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::{Algorithm, Boundary, ReactionNetwork, SimOptions};
use crate::error::EngineError;
use crate::kernel::{Euler, Gillespie, Kernel, SimCore, SimState, TauLeap};
use crate::rates::RateTables;
use crate::sampling::Sampler;
use crate::stoinit::stochastic_counts;
use crate::topology::{GraphEdge, GraphSpace, GridSpace, Space};

/// Grid initialization payload. `state` and `chstt` are mesh-major.
#[derive(Clone, Debug)]
pub struct GridInit {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub boundaries: [Boundary; 3],
    pub state: Vec<f64>,
    pub chstt: Vec<bool>,
    pub env: Vec<usize>,
    pub volume: f64,
}

/// Graph initialization payload. `state` and `chstt` are mesh-major.
#[derive(Clone, Debug)]
pub struct GraphInit {
    pub n_nodes: usize,
    pub edges: Vec<GraphEdge>,
    pub state: Vec<f64>,
    pub chstt: Vec<bool>,
    pub env: Vec<usize>,
    pub volumes: Vec<f64>,
}

/// Owns at most one running simulation. Re-initialization releases the
/// previous one; every other operation requires an active simulation.
#[derive(Default)]
pub struct Session {
    active: Option<Box<dyn Kernel + Send + Sync>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize_grid(
        &mut self,
        init: GridInit,
        network: ReactionNetwork,
        opts: SimOptions,
    ) -> Result<(), EngineError> {
        let space = GridSpace::new(init.width, init.height, init.depth, init.boundaries);
        let rates = RateTables::for_grid(&space, init.volume, &init.env, &network);
        log::debug!(
            "initializing {}x{}x{} grid simulation: {} species, {} reactions, {:?}",
            init.width,
            init.height,
            init.depth,
            network.n_species,
            network.n_reactions,
            opts.algorithm
        );
        self.install(space, rates, init.state, init.chstt, network, opts);
        Ok(())
    }

    pub fn initialize_graph(
        &mut self,
        init: GraphInit,
        network: ReactionNetwork,
        opts: SimOptions,
    ) -> Result<(), EngineError> {
        let space = GraphSpace::new(init.n_nodes, &init.edges);
        let rates = RateTables::for_graph(&space, &init.volumes, &init.env, &network);
        log::debug!(
            "initializing graph simulation: {} nodes, {} edges, {} species, {} reactions, {:?}",
            init.n_nodes,
            init.edges.len(),
            network.n_species,
            network.n_reactions,
            opts.algorithm
        );
        self.install(space, rates, init.state, init.chstt, network, opts);
        Ok(())
    }

    fn install<S>(
        &mut self,
        space: S,
        rates: RateTables,
        state: Vec<f64>,
        chstt: Vec<bool>,
        network: ReactionNetwork,
        opts: SimOptions,
    ) where
        S: Space + Send + Sync + 'static,
    {
        let n_meshes = space.n_meshes();
        let state = if opts.algorithm.is_stochastic() {
            let mut rng = ChaCha8Rng::seed_from_u64(opts.seed);
            stochastic_counts(&state, n_meshes, network.n_species, &mut rng)
        } else {
            state
        };
        let core = SimCore {
            n_meshes,
            n_species: network.n_species,
            n_reactions: network.n_reactions,
            x: state,
            chstt,
            sub: network.sub,
            sto: network.sto,
            t: 0.0,
            dt: opts.time_step,
            t_max: opts.t_max,
            complete: false,
            rng: ChaCha8Rng::seed_from_u64(opts.seed),
            sampler: Sampler::new(opts.policy, opts.t_samples, opts.sampling_interval),
        };
        let sim = SimState { core, space, rates };
        let mut kernel: Box<dyn Kernel + Send + Sync> = match opts.algorithm {
            Algorithm::Euler => Box::new(Euler::new(sim)),
            Algorithm::Gillespie => Box::new(Gillespie::new(sim)),
            Algorithm::TauLeap => Box::new(TauLeap::new(sim)),
        };
        // pre-iteration pass so t = 0 can be captured
        kernel.core_mut().sampling_step();
        self.active = Some(kernel);
    }

    fn kernel(&self) -> Result<&(dyn Kernel + Send + Sync), EngineError> {
        self.active.as_deref().ok_or(EngineError::NoSession)
    }

    fn kernel_mut(&mut self) -> Result<&mut (dyn Kernel + Send + Sync + 'static), EngineError> {
        self.active.as_deref_mut().ok_or(EngineError::NoSession)
    }

    /// One step; true while the simulation should continue.
    pub fn iterate(&mut self) -> Result<bool, EngineError> {
        Ok(self.kernel_mut()?.iterate())
    }

    pub fn iterate_n(&mut self, n: usize) -> Result<bool, EngineError> {
        let kernel = self.kernel_mut()?;
        let mut unfinished = true;
        for _ in 0..n {
            unfinished = kernel.iterate();
            if !unfinished {
                break;
            }
        }
        Ok(unfinished)
    }

    /// Iterates until completion or until the wall-clock budget elapses,
    /// whichever comes first. The budget is checked between iterations, so
    /// it may be exceeded by one step.
    pub fn run(&mut self, budget: Duration) -> Result<bool, EngineError> {
        let kernel = self.kernel_mut()?;
        let started = Instant::now();
        loop {
            if !kernel.iterate() {
                return Ok(false);
            }
            if started.elapsed() >= budget {
                return Ok(true);
            }
        }
    }

    /// Caller-requested snapshot, subject to the per-iteration guard.
    pub fn sample(&mut self) -> Result<(), EngineError> {
        self.kernel_mut()?.core_mut().sample_now();
        Ok(())
    }

    pub fn t(&self) -> Result<f64, EngineError> {
        Ok(self.kernel()?.core().t)
    }

    pub fn progress(&self) -> Result<f64, EngineError> {
        Ok(self.kernel()?.core().progress())
    }

    pub fn n_meshes(&self) -> Result<usize, EngineError> {
        Ok(self.kernel()?.core().n_meshes)
    }

    pub fn n_species(&self) -> Result<usize, EngineError> {
        Ok(self.kernel()?.core().n_species)
    }

    /// Current mesh-major state.
    pub fn state(&self) -> Result<&[f64], EngineError> {
        Ok(&self.kernel()?.core().x)
    }

    pub fn n_samples(&self) -> Result<usize, EngineError> {
        Ok(self.kernel()?.core().sampler.n_samples())
    }

    pub fn sampled_times(&self) -> Result<&[f64], EngineError> {
        Ok(self.kernel()?.core().sampler.times())
    }

    /// Sampled mesh-major states, one per snapshot.
    pub fn sampled_states(&self) -> Result<&[Vec<f64>], EngineError> {
        Ok(self.kernel()?.core().sampler.states())
    }

    /// Releases the active simulation. Safe to call repeatedly or without
    /// one.
    pub fn finalize(&mut self) {
        if self.active.take().is_some() {
            log::debug!("simulation session released");
        }
    }
}
