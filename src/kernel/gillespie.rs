//! Direct-method stochastic simulation (Gillespie, J. Phys. Chem. 81,
//! 2340, 1977), with diffusion jumps treated as first-order events per
//! Bernstein (Phys. Rev. E 71, 041103, 2005).

use super::{Kernel, SimCore, SimState};
use crate::topology::Space;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Event {
    Reaction { mesh: usize, reaction: usize },
    Diffusion { mesh: usize, species: usize, slot: usize },
}

pub struct Gillespie<S: Space> {
    sim: SimState<S>,
    /// `ar[mesh * n_reactions + r]`
    ar: Vec<f64>,
    /// `ad[mesh][species * slots + slot]`
    ad: Vec<Vec<f64>>,
    a0r: Vec<f64>,
    a0d: Vec<f64>,
    a0: f64,
}

impl<S: Space> Gillespie<S> {
    pub fn new(sim: SimState<S>) -> Self {
        let n_meshes = sim.core.n_meshes;
        let ar = vec![0.0; n_meshes * sim.core.n_reactions];
        let ad = (0..n_meshes)
            .map(|mesh| vec![0.0; sim.core.n_species * sim.space.neighbor_slots(mesh)])
            .collect();
        Self {
            sim,
            ar,
            ad,
            a0r: vec![0.0; n_meshes],
            a0d: vec![0.0; n_meshes],
            a0: 0.0,
        }
    }

    fn compute_propensities(&mut self) {
        let ns = self.sim.core.n_species;
        let nr = self.sim.core.n_reactions;
        self.a0 = 0.0;
        for mesh in 0..self.sim.core.n_meshes {
            self.a0r[mesh] = 0.0;
            self.a0d[mesh] = 0.0;
            for r in 0..nr {
                let a = self.sim.reaction_propensity(mesh, r);
                self.ar[mesh * nr + r] = a;
                self.a0r[mesh] += a;
                self.a0 += a;
            }
            let slots = self.sim.space.neighbor_slots(mesh);
            for s in 0..ns {
                for slot in 0..slots {
                    let a = self.sim.diffusion_propensity(mesh, s, slot);
                    self.ad[mesh][s * slots + slot] = a;
                    self.a0d[mesh] += a;
                    self.a0 += a;
                }
            }
        }
    }

    /// Walks meshes in index order, testing each mesh's reaction block and
    /// then its diffusion block; within a block, reactions (then species,
    /// then slots) are visited in canonical order. Returns `None` if the
    /// target lands in the trailing float-summation gap.
    fn select_event(&self, target: f64) -> Option<Event> {
        let ns = self.sim.core.n_species;
        let nr = self.sim.core.n_reactions;
        let mut cumul = 0.0;
        for mesh in 0..self.sim.core.n_meshes {
            if target < cumul + self.a0r[mesh] {
                let local = target - cumul;
                let mut acc = 0.0;
                for reaction in 0..nr {
                    acc += self.ar[mesh * nr + reaction];
                    if local < acc {
                        return Some(Event::Reaction { mesh, reaction });
                    }
                }
                return None;
            }
            cumul += self.a0r[mesh];
            if target < cumul + self.a0d[mesh] {
                let local = target - cumul;
                let slots = self.sim.space.neighbor_slots(mesh);
                let mut acc = 0.0;
                for species in 0..ns {
                    for slot in 0..slots {
                        acc += self.ad[mesh][species * slots + slot];
                        if local < acc {
                            return Some(Event::Diffusion { mesh, species, slot });
                        }
                    }
                }
                return None;
            }
            cumul += self.a0d[mesh];
        }
        None
    }

    /// Last event with non-zero propensity in canonical order; the clamp
    /// target when partial-sum jitter lets the draw fall off the end.
    fn last_event(&self) -> Option<Event> {
        let ns = self.sim.core.n_species;
        let nr = self.sim.core.n_reactions;
        for mesh in (0..self.sim.core.n_meshes).rev() {
            let slots = self.sim.space.neighbor_slots(mesh);
            for species in (0..ns).rev() {
                for slot in (0..slots).rev() {
                    if self.ad[mesh][species * slots + slot] > 0.0 {
                        return Some(Event::Diffusion { mesh, species, slot });
                    }
                }
            }
            for reaction in (0..nr).rev() {
                if self.ar[mesh * nr + reaction] > 0.0 {
                    return Some(Event::Reaction { mesh, reaction });
                }
            }
        }
        None
    }

    fn apply_event(&mut self, event: Event) {
        match event {
            Event::Reaction { mesh, reaction } => {
                for s in 0..self.sim.core.n_species {
                    if !self.sim.core.chstt(mesh, s) {
                        let delta = self.sim.core.sto(s, reaction);
                        self.sim.core.add_x(mesh, s, delta);
                    }
                }
            }
            Event::Diffusion { mesh, species, slot } => {
                let Some(j) = self.sim.space.neighbor(mesh, slot) else {
                    return;
                };
                if !self.sim.core.chstt(mesh, species) {
                    self.sim.core.add_x(mesh, species, -1.0);
                }
                if !self.sim.core.chstt(j, species) {
                    self.sim.core.add_x(j, species, 1.0);
                }
            }
        }
    }
}

impl<S: Space> Kernel for Gillespie<S> {
    fn iterate(&mut self) -> bool {
        self.sim.core.begin_iteration();
        if self.sim.core.complete {
            return false;
        }
        self.compute_propensities();
        if self.a0 == 0.0 {
            // quiescent system: no event can ever fire again
            self.sim.core.flag_complete();
        } else {
            let target = self.sim.core.uniform() * self.a0;
            if let Some(event) = self.select_event(target).or_else(|| self.last_event()) {
                self.apply_event(event);
            }
            // u in (0, 1] keeps the log finite
            let u = 1.0 - self.sim.core.uniform();
            let dt = -u.ln() / self.a0;
            self.sim.core.dt = dt;
            self.sim.core.t += dt;
            self.sim.core.sampling_step();
            self.sim.core.check_t_max();
        }
        !self.sim.core.complete
    }

    fn core(&self) -> &SimCore {
        &self.sim.core
    }

    fn core_mut(&mut self) -> &mut SimCore {
        &mut self.sim.core
    }
}
