//! Tau-leap approximation (Gillespie, J. Chem. Phys. 115, 1716, 2001):
//! every event channel fires a Poisson-distributed number of times over a
//! fixed step. All counts are drawn against the pre-step state before any
//! update is applied; negative excursions are not rejected, choosing the
//! step size is the caller's contract.

use super::{Kernel, SimCore, SimState};
use crate::topology::Space;

pub struct TauLeap<S: Space> {
    sim: SimState<S>,
    /// `nr[mesh * n_reactions + r]`: reaction firings this step.
    nr: Vec<f64>,
    /// `nd[mesh][species * slots + slot]`: outward diffusion jumps.
    nd: Vec<Vec<f64>>,
}

impl<S: Space> TauLeap<S> {
    pub fn new(sim: SimState<S>) -> Self {
        let n_meshes = sim.core.n_meshes;
        let nr = vec![0.0; n_meshes * sim.core.n_reactions];
        let nd = (0..n_meshes)
            .map(|mesh| vec![0.0; sim.core.n_species * sim.space.neighbor_slots(mesh)])
            .collect();
        Self { sim, nr, nd }
    }

    fn draw_event_counts(&mut self) {
        let ns = self.sim.core.n_species;
        let nrx = self.sim.core.n_reactions;
        let dt = self.sim.core.dt;
        for mesh in 0..self.sim.core.n_meshes {
            for r in 0..nrx {
                let lambda = self.sim.reaction_propensity(mesh, r) * dt;
                self.nr[mesh * nrx + r] = self.sim.core.poisson(lambda);
            }
            let slots = self.sim.space.neighbor_slots(mesh);
            for s in 0..ns {
                for slot in 0..slots {
                    let lambda = self.sim.diffusion_propensity(mesh, s, slot) * dt;
                    self.nd[mesh][s * slots + slot] = self.sim.core.poisson(lambda);
                }
            }
        }
    }

    fn apply_event_counts(&mut self) {
        let ns = self.sim.core.n_species;
        let nrx = self.sim.core.n_reactions;
        for mesh in 0..self.sim.core.n_meshes {
            for r in 0..nrx {
                let firings = self.nr[mesh * nrx + r];
                if firings == 0.0 {
                    continue;
                }
                for s in 0..ns {
                    if self.sim.core.chstt(mesh, s) {
                        continue;
                    }
                    let delta = self.sim.core.sto(s, r) * firings;
                    self.sim.core.add_x(mesh, s, delta);
                }
            }
            let slots = self.sim.space.neighbor_slots(mesh);
            for s in 0..ns {
                for slot in 0..slots {
                    let jumps = self.nd[mesh][s * slots + slot];
                    if jumps == 0.0 {
                        continue;
                    }
                    if !self.sim.core.chstt(mesh, s) {
                        self.sim.core.add_x(mesh, s, -jumps);
                    }
                    let Some(j) = self.sim.space.neighbor(mesh, slot) else {
                        continue;
                    };
                    if !self.sim.core.chstt(j, s) {
                        self.sim.core.add_x(j, s, jumps);
                    }
                }
            }
        }
    }
}

impl<S: Space> Kernel for TauLeap<S> {
    fn iterate(&mut self) -> bool {
        self.sim.core.begin_iteration();
        if self.sim.core.complete {
            return false;
        }
        self.draw_event_counts();
        self.apply_event_counts();
        self.sim.core.t += self.sim.core.dt;
        self.sim.core.sampling_step();
        self.sim.core.check_t_max();
        !self.sim.core.complete
    }

    fn core(&self) -> &SimCore {
        &self.sim.core
    }

    fn core_mut(&mut self) -> &mut SimCore {
        &mut self.sim.core
    }
}
