//! Stochastic initial-state generation.
//!
//! Converts a real-valued concentration field into integer counts while
//! preserving each species' floored total. Counts are drawn per mesh
//! (Poisson below a mean of 100, floored Normal above, where the Poisson
//! sampler gets slow), then a correction pass redistributes the surplus or
//! deficit by inverse-CDF draws over the original float mass so the totals
//! come out exact.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Poisson};

const NORMAL_APPROXIMATION_MEAN: f64 = 100.0;

pub fn stochastic_counts(
    mesh_x: &[f64],
    n_meshes: usize,
    n_species: usize,
    rng: &mut ChaCha8Rng,
) -> Vec<f64> {
    let mut totals = vec![0.0; n_species];
    for mesh in 0..n_meshes {
        for s in 0..n_species {
            totals[s] += mesh_x[mesh * n_species + s];
        }
    }
    for total in &mut totals {
        *total = total.floor();
    }

    let mut counts = vec![0.0; mesh_x.len()];
    for (count, &mean) in counts.iter_mut().zip(mesh_x) {
        *count = if mean < NORMAL_APPROXIMATION_MEAN {
            draw_poisson(rng, mean)
        } else {
            match Normal::new(mean, mean.sqrt()) {
                Ok(normal) => normal.sample(rng).floor().max(0.0),
                Err(_) => mean.floor(),
            }
        };
    }

    let mut drawn = vec![0.0; n_species];
    for mesh in 0..n_meshes {
        for s in 0..n_species {
            drawn[s] += counts[mesh * n_species + s];
        }
    }

    for s in 0..n_species {
        let delta = (drawn[s] - totals[s]) as i64;
        let remove = delta > 0;
        let delta = delta.abs();
        let mut applied = 0i64;

        if remove && totals[s] == 0.0 {
            // No float mass to sample against; strip the surplus in index
            // order so the pass still terminates.
            for mesh in 0..n_meshes {
                let count = &mut counts[mesh * n_species + s];
                while *count > 0.0 && applied < delta {
                    *count -= 1.0;
                    applied += 1;
                }
            }
            continue;
        }

        while applied < delta {
            let target = rng.r#gen::<f64>() * totals[s];
            let mut cumul = 0.0;
            for mesh in 0..n_meshes {
                cumul += mesh_x[mesh * n_species + s];
                if target < cumul {
                    let count = &mut counts[mesh * n_species + s];
                    if remove {
                        if *count > 0.0 {
                            *count -= 1.0;
                            applied += 1;
                        }
                    } else {
                        *count += 1.0;
                        applied += 1;
                    }
                    break;
                }
            }
        }
    }

    counts
}

fn draw_poisson(rng: &mut ChaCha8Rng, lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 0.0;
    }
    match Poisson::new(lambda) {
        Ok(poisson) => poisson.sample(rng),
        Err(_) => 0.0,
    }
}
