//! Explicit Euler integration of the semi-discrete reaction-diffusion ODE.

use super::{Kernel, SimCore, SimState};
use crate::topology::Space;

pub struct Euler<S: Space> {
    sim: SimState<S>,
    dxdt: Vec<f64>,
    // per-mesh reaction rate scratch, reused across meshes
    rr: Vec<f64>,
}

impl<S: Space> Euler<S> {
    pub fn new(sim: SimState<S>) -> Self {
        let dxdt = vec![0.0; sim.core.n_meshes * sim.core.n_species];
        let rr = vec![0.0; sim.core.n_reactions];
        Self { sim, dxdt, rr }
    }

    /// The full derivative field is computed before any state is touched, so
    /// every mesh sees the pre-step state of its neighbors.
    fn compute_dxdt(&mut self) {
        let ns = self.sim.core.n_species;
        let nr = self.sim.core.n_reactions;
        for mesh in 0..self.sim.core.n_meshes {
            for r in 0..nr {
                self.rr[r] = self.sim.reaction_rate(mesh, r);
            }
            let slots = self.sim.space.neighbor_slots(mesh);
            for s in 0..ns {
                self.dxdt[mesh * ns + s] = 0.0;
                if self.sim.core.chstt(mesh, s) {
                    continue;
                }
                let mut derivative = 0.0;
                for r in 0..nr {
                    derivative += self.sim.core.sto(s, r) * self.rr[r];
                }
                for slot in 0..slots {
                    derivative -= self.sim.flux_difference(mesh, s, slot);
                }
                self.dxdt[mesh * ns + s] = derivative;
            }
        }
    }

    fn apply_dxdt(&mut self) {
        let dt = self.sim.core.dt;
        for (x, derivative) in self.sim.core.x.iter_mut().zip(&self.dxdt) {
            *x += derivative * dt;
        }
    }
}

impl<S: Space> Kernel for Euler<S> {
    fn iterate(&mut self) -> bool {
        self.sim.core.begin_iteration();
        if self.sim.core.complete {
            return false;
        }
        self.compute_dxdt();
        self.apply_dxdt();
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
