//! Simulation kernels.
//!
//! Each algorithm (`euler`, `gillespie`, `tauleap`) is written once, generic
//! over the mesh space, so the grid and graph renditions are
//! monomorphizations of the same stepping code. `SimCore` holds everything
//! the space does not shape (state, clock, RNG, sampler); `SimState` adds
//! the space and the precomputed rate tables, and carries the shared
//! rate/propensity arithmetic.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson};

use crate::rates::RateTables;
use crate::sampling::Sampler;
use crate::topology::Space;

mod euler;
mod gillespie;
mod tauleap;

pub use euler::Euler;
pub use gillespie::Gillespie;
pub use tauleap::TauLeap;

/// One step of a kernel. `iterate` returns true while the simulation should
/// continue; `core` exposes the topology-independent state for the session
/// getters.
pub trait Kernel {
    fn iterate(&mut self) -> bool;
    fn core(&self) -> &SimCore;
    fn core_mut(&mut self) -> &mut SimCore;
}

pub struct SimCore {
    pub n_meshes: usize,
    pub n_species: usize,
    pub n_reactions: usize,
    /// Mesh-major state: `x[mesh * n_species + species]`. Integer-valued for
    /// the stochastic algorithms.
    pub x: Vec<f64>,
    pub chstt: Vec<bool>,
    /// Species-major substrate orders: `sub[species * n_reactions + r]`.
    pub sub: Vec<f64>,
    /// Species-major net stoichiometry, same layout as `sub`.
    pub sto: Vec<f64>,
    pub t: f64,
    pub dt: f64,
    pub t_max: f64,
    pub complete: bool,
    pub rng: ChaCha8Rng,
    pub sampler: Sampler,
}

impl SimCore {
    #[inline]
    pub fn x(&self, mesh: usize, species: usize) -> f64 {
        self.x[mesh * self.n_species + species]
    }

    #[inline]
    pub fn add_x(&mut self, mesh: usize, species: usize, delta: f64) {
        self.x[mesh * self.n_species + species] += delta;
    }

    #[inline]
    pub fn chstt(&self, mesh: usize, species: usize) -> bool {
        self.chstt[mesh * self.n_species + species]
    }

    #[inline]
    pub fn sub(&self, species: usize, reaction: usize) -> f64 {
        self.sub[species * self.n_reactions + reaction]
    }

    #[inline]
    pub fn sto(&self, species: usize, reaction: usize) -> f64 {
        self.sto[species * self.n_reactions + reaction]
    }

    /// Uniform draw in `[0, 1)`.
    #[inline]
    pub fn uniform(&mut self) -> f64 {
        self.rng.r#gen()
    }

    pub fn poisson(&mut self, lambda: f64) -> f64 {
        if lambda <= 0.0 {
            return 0.0;
        }
        match Poisson::new(lambda) {
            Ok(poisson) => poisson.sample(&mut self.rng),
            Err(_) => 0.0,
        }
    }

    pub fn begin_iteration(&mut self) {
        self.sampler.begin_iteration();
    }

    pub fn sampling_step(&mut self) {
        self.sampler.after_step(self.t, &self.x);
    }

    /// Caller-requested snapshot; respects the per-iteration guard.
    pub fn sample_now(&mut self) {
        self.sampler.sample(self.t, &self.x);
    }

    pub fn check_t_max(&mut self) {
        if self.t_max >= 0.0 && self.t > self.t_max {
            self.complete = true;
        }
    }

    pub fn flag_complete(&mut self) {
        self.complete = true;
    }

    pub fn progress(&self) -> f64 {
        if self.t_max > 0.0 {
            100.0 * self.t / self.t_max
        } else {
            0.0
        }
    }
}

pub struct SimState<S: Space> {
    pub core: SimCore,
    pub space: S,
    pub rates: RateTables,
}

impl<S: Space> SimState<S> {
    #[inline]
    pub fn kr(&self, mesh: usize, reaction: usize) -> f64 {
        self.rates.kr[mesh * self.core.n_reactions + reaction]
    }

    #[inline]
    pub fn kd_out(&self, mesh: usize, species: usize, slot: usize) -> f64 {
        let slots = self.space.neighbor_slots(mesh);
        self.rates.kd_out[mesh][species * slots + slot]
    }

    #[inline]
    pub fn kd_in(&self, mesh: usize, species: usize, slot: usize) -> f64 {
        let slots = self.space.neighbor_slots(mesh);
        self.rates.kd_in[mesh][species * slots + slot]
    }

    /// Deterministic mass-action rate in count units.
    pub fn reaction_rate(&self, mesh: usize, reaction: usize) -> f64 {
        let mut rate = self.kr(mesh, reaction);
        for s in 0..self.core.n_species {
            rate *= self.core.x(mesh, s).powf(self.core.sub(s, reaction));
        }
        rate
    }

    /// Gillespie propensity: the falling-factorial count of distinct
    /// substrate combinations times the rate constant (Gillespie, J. Phys.
    /// Chem. 81, 2340, 1977). Zero as soon as any substrate is short.
    pub fn reaction_propensity(&self, mesh: usize, reaction: usize) -> f64 {
        let mut a = self.kr(mesh, reaction);
        for s in 0..self.core.n_species {
            let order = self.core.sub(s, reaction);
            if order == 0.0 {
                continue;
            }
            let count = self.core.x(mesh, s);
            if count < order {
                return 0.0;
            }
            for q in 0..order as usize {
                a *= count - q as f64;
            }
        }
        a
    }

    /// First-order propensity of one count leaving through `slot`. The rate
    /// table is zero for absent neighbors and disabled diffusivities.
    #[inline]
    pub fn diffusion_propensity(&self, mesh: usize, species: usize, slot: usize) -> f64 {
        self.core.x(mesh, species) * self.kd_out(mesh, species, slot)
    }

    /// Net outward flux through `slot`: outgoing minus the neighbor's flow
    /// back in. Contributes nothing where the slot has no neighbor.
    pub fn flux_difference(&self, mesh: usize, species: usize, slot: usize) -> f64 {
        match self.space.neighbor(mesh, slot) {
            Some(j) => {
                self.core.x(mesh, species) * self.kd_out(mesh, species, slot)
                    - self.core.x(j, species) * self.kd_in(mesh, species, slot)
            }
            None => 0.0,
        }
    }
}
