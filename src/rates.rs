//! Precomputed per-mesh rate constants.
//!
//! Reaction constants fold the mesh volume and the environment multiplier
//! into the base rate so that kernels work directly on counts. Diffusion
//! constants follow Bernstein's first-order treatment of inter-mesh
//! transport (Bernstein, Phys. Rev. E 71, 041103, 2005), generalized on
//! graphs to meshes of unequal volume through the contact surface and
//! center-to-center distance of each edge.

use crate::config::ReactionNetwork;
use crate::topology::{GRID_DIRECTIONS, GraphSpace, GridSpace, Space, opposed};

pub struct RateTables {
    /// `kr[mesh * n_reactions + r]`
    pub kr: Vec<f64>,
    /// `kd_out[mesh][species * slots + slot]`: rate constant for a count
    /// leaving `mesh` through the given slot.
    pub kd_out: Vec<Vec<f64>>,
    /// Same shape; rate constant for the neighbor's counts entering through
    /// the slot. Zero wherever the slot has no neighbor or diffusion is
    /// disabled on either side.
    pub kd_in: Vec<Vec<f64>>,
}

impl RateTables {
    pub fn for_grid(
        space: &GridSpace,
        volume: f64,
        env: &[usize],
        network: &ReactionNetwork,
    ) -> Self {
        let edge = volume.cbrt();
        let n_meshes = space.n_meshes();
        let ns = network.n_species;
        let ne = network.n_env;

        let mut kd_out = vec![vec![0.0; ns * GRID_DIRECTIONS]; n_meshes];
        for mesh in 0..n_meshes {
            for s in 0..ns {
                for dir in 0..GRID_DIRECTIONS {
                    let Some(j) = space.neighbor(mesh, dir) else {
                        continue;
                    };
                    let di = network.diffusivity[s * ne + env[mesh]];
                    let dj = network.diffusivity[s * ne + env[j]];
                    if di == 0.0 || dj == 0.0 {
                        continue;
                    }
                    let dij = (2.0 * edge) / (edge / di + edge / dj);
                    kd_out[mesh][s * GRID_DIRECTIONS + dir] = dij / (edge * edge);
                }
            }
        }

        // Uniform cubic meshes make the pair conductance symmetric, but the
        // inbound table is still read through the neighbor's opposed slot.
        let mut kd_in = vec![vec![0.0; ns * GRID_DIRECTIONS]; n_meshes];
        for mesh in 0..n_meshes {
            for s in 0..ns {
                for dir in 0..GRID_DIRECTIONS {
                    if let Some(j) = space.neighbor(mesh, dir) {
                        kd_in[mesh][s * GRID_DIRECTIONS + dir] =
                            kd_out[j][s * GRID_DIRECTIONS + opposed(dir)];
                    }
                }
            }
        }

        Self {
            kr: build_kr(n_meshes, |_| volume, env, network),
            kd_out,
            kd_in,
        }
    }

    pub fn for_graph(
        space: &GraphSpace,
        volumes: &[f64],
        env: &[usize],
        network: &ReactionNetwork,
    ) -> Self {
        let n_meshes = space.n_meshes();
        let ns = network.n_species;
        let ne = network.n_env;

        let mut kd_out = Vec::with_capacity(n_meshes);
        let mut kd_in = Vec::with_capacity(n_meshes);
        for mesh in 0..n_meshes {
            let slots = space.neighbor_slots(mesh);
            let mut out = vec![0.0; ns * slots];
            let mut inward = vec![0.0; ns * slots];
            for s in 0..ns {
                for slot in 0..slots {
                    let Some(j) = space.neighbor(mesh, slot) else {
                        continue;
                    };
                    let di = network.diffusivity[s * ne + env[mesh]];
                    let dj = network.diffusivity[s * ne + env[j]];
                    if di == 0.0 || dj == 0.0 {
                        continue;
                    }
                    let hi = volumes[mesh].cbrt();
                    let hj = volumes[j].cbrt();
                    let dij = (hi + hj) / (hi / di + hj / dj);
                    let (surface, distance) = space.edge_attrs(mesh, slot);
                    out[s * slots + slot] = dij * surface / (volumes[mesh] * distance);
                    inward[s * slots + slot] = dij * surface / (volumes[j] * distance);
                }
            }
            kd_out.push(out);
            kd_in.push(inward);
        }

        Self {
            kr: build_kr(n_meshes, |mesh| volumes[mesh], env, network),
            kd_out,
            kd_in,
        }
    }
}

/// `kr[i,r] = k[r] * vol[i]^(1 - q_r) * r_env[r, env[i]]` where `q_r` is the
/// total substrate order of reaction `r`. Higher-order reactions scale down
/// with volume so that count products yield a count rate.
fn build_kr(
    n_meshes: usize,
    volume_of: impl Fn(usize) -> f64,
    env: &[usize],
    network: &ReactionNetwork,
) -> Vec<f64> {
    let nr = network.n_reactions;
    let mut kr = vec![0.0; n_meshes * nr];
    for mesh in 0..n_meshes {
        for r in 0..nr {
            let order: f64 = (0..network.n_species)
                .map(|s| network.sub[s * nr + r])
                .sum();
            kr[mesh * nr + r] = network.k[r]
                * volume_of(mesh).powf(1.0 - order)
                * network.r_env[r * network.n_env + env[mesh]];
        }
    }
    kr
}
