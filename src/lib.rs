use std::time::Duration;

use numpy::{
    Element, IxDyn, PyArrayDyn, PyArrayMethods, PyReadonlyArray1, PyReadonlyArray2,
    PyUntypedArrayMethods,
};
use pyo3::prelude::*;

mod config;
mod error;
mod kernel;
mod rates;
mod sampling;
mod session;
mod stoinit;
mod topology;

use config::{Algorithm, Boundary, ReactionNetwork, SamplingPolicy, SimOptions};
use error::EngineError;
use session::{GraphInit, GridInit, Session};
use topology::GraphEdge;

fn flatten_pyarray2<T: Copy + Element>(
    array: PyReadonlyArray2<T>,
    name: &str,
) -> Result<(usize, usize, Vec<T>), EngineError> {
    let shape = array.shape();
    if shape.len() != 2 {
        return Err(EngineError::Shape(format!("{name} must be 2-dimensional")));
    }
    let data = array
        .as_slice()
        .map_err(|_| EngineError::Shape(format!("{name} must be contiguous")))?;
    Ok((shape[0], shape[1], data.to_vec()))
}

fn read_array1<T: Copy + Element>(
    array: PyReadonlyArray1<T>,
    expected: usize,
    name: &str,
) -> Result<Vec<T>, EngineError> {
    let slice = array
        .as_slice()
        .map_err(|_| EngineError::Shape(format!("{name} array must be contiguous")))?;
    if slice.len() != expected {
        return Err(EngineError::Shape(format!(
            "{name} length {} does not match expected {}",
            slice.len(),
            expected
        )));
    }
    Ok(slice.to_vec())
}

/// The external layout is species-major (`data[s * n_meshes + i]`); the
/// kernels only ever see the mesh-major transpose.
fn species_major_to_mesh_major<T: Copy>(data: &[T], n_species: usize, n_meshes: usize) -> Vec<T> {
    (0..n_meshes * n_species)
        .map(|idx| data[(idx % n_species) * n_meshes + idx / n_species])
        .collect()
}

fn mesh_major_to_species_major(data: &[f64], n_species: usize, n_meshes: usize) -> Vec<f64> {
    (0..n_species * n_meshes)
        .map(|idx| data[(idx % n_meshes) * n_species + idx / n_meshes])
        .collect()
}

fn new_f64_array(py: Python<'_>, dims: &[usize], data: &[f64]) -> PyResult<Py<PyAny>> {
    let array = unsafe { PyArrayDyn::<f64>::new(py, IxDyn(dims), false) };
    unsafe {
        array
            .as_slice_mut()
            .map_err(|_| EngineError::Shape("failed to export data".into()))?
            .copy_from_slice(data);
    }
    Ok(array.into_any().unbind())
}

struct MeshArrays {
    n_species: usize,
    state: Vec<f64>,
    chstt: Vec<bool>,
    env: Vec<usize>,
}

fn extract_mesh_arrays(
    mesh_state: PyReadonlyArray2<f64>,
    mesh_chstt: PyReadonlyArray2<i32>,
    mesh_env: PyReadonlyArray1<i32>,
    expected_meshes: usize,
) -> Result<MeshArrays, EngineError> {
    let (n_species, n_meshes, state_sf) = flatten_pyarray2(mesh_state, "mesh_state")?;
    if n_meshes != expected_meshes {
        return Err(EngineError::Shape(format!(
            "mesh_state has {} meshes but the topology has {}",
            n_meshes, expected_meshes
        )));
    }
    let (cs, cm, chstt_sf) = flatten_pyarray2(mesh_chstt, "mesh_chstt")?;
    if cs != n_species || cm != n_meshes {
        return Err(EngineError::Shape(
            "mesh_chstt shape does not match mesh_state".into(),
        ));
    }
    let env = read_array1(mesh_env, n_meshes, "mesh_env")?
        .into_iter()
        .map(|e| e as usize)
        .collect();
    Ok(MeshArrays {
        n_species,
        state: species_major_to_mesh_major(&state_sf, n_species, n_meshes),
        chstt: species_major_to_mesh_major(&chstt_sf, n_species, n_meshes)
            .into_iter()
            .map(|flag| flag != 0)
            .collect(),
        env,
    })
}

#[allow(clippy::too_many_arguments)]
fn extract_network(
    n_species: usize,
    k: PyReadonlyArray1<f64>,
    sub: PyReadonlyArray2<i32>,
    sto: PyReadonlyArray2<i32>,
    r_env: PyReadonlyArray2<f64>,
    diffusivity: PyReadonlyArray2<f64>,
) -> Result<ReactionNetwork, EngineError> {
    let (ss, n_reactions, sub_vec) = flatten_pyarray2(sub, "sub")?;
    if ss != n_species {
        return Err(EngineError::Shape(format!(
            "sub has {} species rows but mesh_state has {}",
            ss, n_species
        )));
    }
    let (ts, tr, sto_vec) = flatten_pyarray2(sto, "sto")?;
    if ts != n_species || tr != n_reactions {
        return Err(EngineError::Shape("sto shape does not match sub".into()));
    }
    let k = read_array1(k, n_reactions, "k")?;
    let (rr, n_env, r_env_vec) = flatten_pyarray2(r_env, "r_env")?;
    if rr != n_reactions {
        return Err(EngineError::Shape(format!(
            "r_env has {} reaction rows but sub has {} reactions",
            rr, n_reactions
        )));
    }
    let (ds, de, diffusivity_vec) = flatten_pyarray2(diffusivity, "diffusivity")?;
    if ds != n_species || de != n_env {
        return Err(EngineError::Shape(
            "diffusivity shape does not match species and environment counts".into(),
        ));
    }
    Ok(ReactionNetwork {
        n_species,
        n_reactions,
        n_env,
        k,
        sub: sub_vec.into_iter().map(f64::from).collect(),
        sto: sto_vec.into_iter().map(f64::from).collect(),
        r_env: r_env_vec,
        diffusivity: diffusivity_vec,
    })
}

#[allow(clippy::too_many_arguments)]
fn extract_options(
    sample_t: Option<PyReadonlyArray1<f64>>,
    sampling_policy: &str,
    sampling_interval: f64,
    t_max: f64,
    time_step: f64,
    seed: u64,
    algorithm: &str,
) -> Result<SimOptions, EngineError> {
    let t_samples = match sample_t {
        Some(array) => array
            .as_slice()
            .map_err(|_| EngineError::Shape("sample_t array must be contiguous".into()))?
            .to_vec(),
        None => Vec::new(),
    };
    Ok(SimOptions {
        algorithm: algorithm.parse::<Algorithm>()?,
        policy: sampling_policy.parse::<SamplingPolicy>()?,
        t_samples,
        sampling_interval,
        t_max,
        time_step,
        seed,
    })
}

/// A reaction-diffusion simulation engine holding at most one active
/// simulation at a time. Re-initialization replaces the running one.
///
/// Array conventions: `mesh_state` and `mesh_chstt` are
/// `(n_species, n_meshes)` with meshes varying fastest; `sub` and `sto` are
/// `(n_species, n_reactions)`; `r_env` is `(n_reactions, n_env)` and is
/// applied as a floating-point rate multiplier; `diffusivity` is
/// `(n_species, n_env)`.
#[pyclass]
pub struct Engine {
    session: Session,
}

#[pymethods]
impl Engine {
    #[new]
    fn new() -> Self {
        Self {
            session: Session::new(),
        }
    }

    /// Initialize a simulation on a `w x h x d` grid of cubic meshes of
    /// volume `mesh_vol`, with per-axis `reflecting` or `periodical`
    /// boundaries. `algorithm` is one of `gillespie`, `tauleap`, `euler`;
    /// the stochastic algorithms convert `mesh_state` into integer counts
    /// preserving each species' floored total.
    #[allow(clippy::too_many_arguments)]
    #[pyo3(signature = (
        width, height, depth, mesh_state, mesh_chstt, mesh_env, mesh_vol,
        k, sub, sto, r_env, diffusivity, boundary_x, boundary_y, boundary_z,
        sample_t, sampling_policy, sampling_interval, t_max, time_step, seed,
        algorithm
    ))]
    fn initialize_3d(
        &mut self,
        width: usize,
        height: usize,
        depth: usize,
        mesh_state: PyReadonlyArray2<f64>,
        mesh_chstt: PyReadonlyArray2<i32>,
        mesh_env: PyReadonlyArray1<i32>,
        mesh_vol: f64,
        k: PyReadonlyArray1<f64>,
        sub: PyReadonlyArray2<i32>,
        sto: PyReadonlyArray2<i32>,
        r_env: PyReadonlyArray2<f64>,
        diffusivity: PyReadonlyArray2<f64>,
        boundary_x: &str,
        boundary_y: &str,
        boundary_z: &str,
        sample_t: Option<PyReadonlyArray1<f64>>,
        sampling_policy: &str,
        sampling_interval: f64,
        t_max: f64,
        time_step: f64,
        seed: u64,
        algorithm: &str,
    ) -> PyResult<()> {
        let boundaries = [
            boundary_x.parse::<Boundary>()?,
            boundary_y.parse::<Boundary>()?,
            boundary_z.parse::<Boundary>()?,
        ];
        let meshes = extract_mesh_arrays(mesh_state, mesh_chstt, mesh_env, width * height * depth)?;
        let network = extract_network(meshes.n_species, k, sub, sto, r_env, diffusivity)?;
        let opts = extract_options(
            sample_t,
            sampling_policy,
            sampling_interval,
            t_max,
            time_step,
            seed,
            algorithm,
        )?;
        let init = GridInit {
            width,
            height,
            depth,
            boundaries,
            state: meshes.state,
            chstt: meshes.chstt,
            env: meshes.env,
            volume: mesh_vol,
        };
        self.session.initialize_grid(init, network, opts)?;
        Ok(())
    }

    /// Initialize a simulation over an arbitrary graph of meshes.
    /// `edge_i`/`edge_j` index the two endpoints of each undirected edge;
    /// `edge_sfc` and `edge_dst` carry the contact surface and
    /// center-to-center distance. `mesh_vol` gives each node's volume.
    #[allow(clippy::too_many_arguments)]
    #[pyo3(signature = (
        edge_i, edge_j, edge_sfc, edge_dst, mesh_state, mesh_chstt, mesh_env,
        mesh_vol, k, sub, sto, r_env, diffusivity, sample_t, sampling_policy,
        sampling_interval, t_max, time_step, seed, algorithm
    ))]
    fn initialize_graph(
        &mut self,
        edge_i: PyReadonlyArray1<i32>,
        edge_j: PyReadonlyArray1<i32>,
        edge_sfc: PyReadonlyArray1<f64>,
        edge_dst: PyReadonlyArray1<f64>,
        mesh_state: PyReadonlyArray2<f64>,
        mesh_chstt: PyReadonlyArray2<i32>,
        mesh_env: PyReadonlyArray1<i32>,
        mesh_vol: PyReadonlyArray1<f64>,
        k: PyReadonlyArray1<f64>,
        sub: PyReadonlyArray2<i32>,
        sto: PyReadonlyArray2<i32>,
        r_env: PyReadonlyArray2<f64>,
        diffusivity: PyReadonlyArray2<f64>,
        sample_t: Option<PyReadonlyArray1<f64>>,
        sampling_policy: &str,
        sampling_interval: f64,
        t_max: f64,
        time_step: f64,
        seed: u64,
        algorithm: &str,
    ) -> PyResult<()> {
        let volumes = mesh_vol
            .as_slice()
            .map_err(|_| EngineError::Shape("mesh_vol array must be contiguous".into()))?
            .to_vec();
        let n_nodes = volumes.len();
        let meshes = extract_mesh_arrays(mesh_state, mesh_chstt, mesh_env, n_nodes)?;
        let network = extract_network(meshes.n_species, k, sub, sto, r_env, diffusivity)?;
        let opts = extract_options(
            sample_t,
            sampling_policy,
            sampling_interval,
            t_max,
            time_step,
            seed,
            algorithm,
        )?;

        let n_edges = edge_i.shape()[0];
        let i_vec = read_array1(edge_i, n_edges, "edge_i")?;
        let j_vec = read_array1(edge_j, n_edges, "edge_j")?;
        let sfc_vec = read_array1(edge_sfc, n_edges, "edge_sfc")?;
        let dst_vec = read_array1(edge_dst, n_edges, "edge_dst")?;
        let edges = i_vec
            .into_iter()
            .zip(j_vec)
            .zip(sfc_vec.into_iter().zip(dst_vec))
            .map(|((a, b), (surface, distance))| GraphEdge {
                a: a as usize,
                b: b as usize,
                surface,
                distance,
            })
            .collect();

        let init = GraphInit {
            n_nodes,
            edges,
            state: meshes.state,
            chstt: meshes.chstt,
            env: meshes.env,
            volumes,
        };
        self.session.initialize_graph(init, network, opts)?;
        Ok(())
    }

    /// Advance one step. Returns true while the simulation is unfinished.
    fn iterate(&mut self) -> PyResult<bool> {
        Ok(self.session.iterate()?)
    }

    /// Advance up to `n` steps, stopping early on completion.
    fn iterate_n(&mut self, n: usize) -> PyResult<bool> {
        Ok(self.session.iterate_n(n)?)
    }

    /// Iterate until completion or until `budget_ms` milliseconds of wall
    /// clock have elapsed. The GIL is released for the duration.
    fn run(&mut self, py: Python<'_>, budget_ms: u64) -> PyResult<bool> {
        let session = &mut self.session;
        Ok(py.detach(move || session.run(Duration::from_millis(budget_ms)))?)
    }

    /// Force a snapshot of the current state into the trajectory buffer.
    fn sample(&mut self) -> PyResult<()> {
        Ok(self.session.sample()?)
    }

    fn get_t(&self) -> PyResult<f64> {
        Ok(self.session.t()?)
    }

    /// `100 * t / t_max`, or 0 when no time cap is set.
    fn get_progress(&self) -> PyResult<f64> {
        Ok(self.session.progress()?)
    }

    fn get_n_samples(&self) -> PyResult<usize> {
        Ok(self.session.n_samples()?)
    }

    /// Snapshot times, shape `(n_samples,)`.
    fn get_t_sample(&self, py: Python<'_>) -> PyResult<Py<PyAny>> {
        let times = self.session.sampled_times()?;
        new_f64_array(py, &[times.len()], times)
    }

    /// Current state, shape `(n_species, n_meshes)`.
    fn get_state(&self, py: Python<'_>) -> PyResult<Py<PyAny>> {
        let n_species = self.session.n_species()?;
        let n_meshes = self.session.n_meshes()?;
        let data = mesh_major_to_species_major(self.session.state()?, n_species, n_meshes);
        new_f64_array(py, &[n_species, n_meshes], &data)
    }

    /// Sampled trajectory, shape `(n_samples, n_species, n_meshes)`.
    fn get_output(&self, py: Python<'_>) -> PyResult<Py<PyAny>> {
        let n_species = self.session.n_species()?;
        let n_meshes = self.session.n_meshes()?;
        let snapshots = self.session.sampled_states()?;
        let mut data = Vec::with_capacity(snapshots.len() * n_species * n_meshes);
        for snapshot in snapshots {
            data.extend(mesh_major_to_species_major(snapshot, n_species, n_meshes));
        }
        new_f64_array(py, &[snapshots.len(), n_species, n_meshes], &data)
    }

    /// Release the active simulation. Idempotent.
    fn finalize(&mut self) {
        self.session.finalize();
    }
}

#[pymodule]
fn rdmeso(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<Engine>()?;
    Ok(())
}

#[cfg(test)]
mod tests;
