use super::*;
use crate::config::{Algorithm, Boundary, ReactionNetwork, SamplingPolicy, SimOptions};
use crate::error::EngineError;
use crate::session::{GraphInit, GridInit, Session};
use crate::topology::GraphEdge;

fn reflecting() -> [Boundary; 3] {
    [Boundary::Reflecting; 3]
}

fn decay_network() -> ReactionNetwork {
    // A -> 0, k = 1
    ReactionNetwork {
        n_species: 1,
        n_reactions: 1,
        n_env: 1,
        k: vec![1.0],
        sub: vec![1.0],
        sto: vec![-1.0],
        r_env: vec![1.0],
        diffusivity: vec![0.0],
    }
}

fn diffusion_network(d: f64) -> ReactionNetwork {
    ReactionNetwork {
        n_species: 1,
        n_reactions: 0,
        n_env: 1,
        k: vec![],
        sub: vec![],
        sto: vec![],
        r_env: vec![],
        diffusivity: vec![d],
    }
}

fn options(algorithm: Algorithm, policy: SamplingPolicy, seed: u64) -> SimOptions {
    SimOptions {
        algorithm,
        policy,
        t_samples: Vec::new(),
        sampling_interval: 0.0,
        t_max: -1.0,
        time_step: 0.01,
        seed,
    }
}

fn line_grid(state: Vec<f64>, boundaries: [Boundary; 3]) -> GridInit {
    let n = state.len();
    GridInit {
        width: n,
        height: 1,
        depth: 1,
        boundaries,
        chstt: vec![false; n],
        env: vec![0; n],
        volume: 1.0,
        state,
    }
}

fn run_to_completion(session: &mut Session) {
    let mut iterations = 0usize;
    while session.iterate().unwrap() {
        iterations += 1;
        assert!(iterations < 2_000_000, "simulation failed to terminate");
    }
}

#[test]
fn euler_decay_matches_the_exponential_solution() {
    let mut session = Session::new();
    let mut opts = options(Algorithm::Euler, SamplingPolicy::OnInterval, 0);
    opts.sampling_interval = 1.0;
    opts.t_max = 5.0;
    session
        .initialize_grid(line_grid(vec![100.0], reflecting()), decay_network(), opts)
        .unwrap();
    run_to_completion(&mut session);

    let times = session.sampled_times().unwrap().to_vec();
    let states = session.sampled_states().unwrap().to_vec();
    assert_eq!(times.len(), 6);
    for (pos, (t, state)) in times.iter().zip(&states).enumerate() {
        assert!(
            (t - pos as f64).abs() < 0.02,
            "snapshot {pos} taken at t = {t}"
        );
        let expected = 100.0 * (-t).exp();
        assert!(
            (state[0] - expected).abs() < 0.05 * expected + 1e-9,
            "x(t = {t}) = {} but the analytic decay gives {expected}",
            state[0]
        );
    }
}

#[test]
fn gillespie_decay_terminates_quiescent() {
    let mut session = Session::new();
    session
        .initialize_grid(
            line_grid(vec![10.0], reflecting()),
            decay_network(),
            options(Algorithm::Gillespie, SamplingPolicy::OnIteration, 42),
        )
        .unwrap();
    run_to_completion(&mut session);

    assert_eq!(session.state().unwrap(), &[0.0]);
    // one snapshot at t = 0 plus one per decay event; the quiescent
    // iteration records nothing
    assert_eq!(session.n_samples().unwrap(), 11);
    let times = session.sampled_times().unwrap();
    assert_eq!(times[0], 0.0);
    assert!(times.windows(2).all(|w| w[1] >= w[0]));
    assert!(session.t().unwrap() > 0.0);
    // completion is sticky
    assert!(!session.iterate().unwrap());
}

#[test]
fn ssa_diffusion_conserves_mass_on_a_reflecting_line() {
    let mut session = Session::new();
    let mut opts = options(Algorithm::Gillespie, SamplingPolicy::OnIteration, 7);
    opts.t_max = 50.0;
    session
        .initialize_grid(
            line_grid(vec![10.0, 0.0, 0.0], reflecting()),
            diffusion_network(1.0),
            opts,
        )
        .unwrap();
    run_to_completion(&mut session);

    for state in session.sampled_states().unwrap() {
        assert_eq!(state.iter().sum::<f64>(), 10.0);
        assert!(state.iter().all(|&x| x >= 0.0));
    }
    assert!(session.t().unwrap() > 50.0);
}

#[test]
fn ssa_diffusion_conserves_mass_with_a_periodic_axis() {
    let mut session = Session::new();
    let mut opts = options(Algorithm::Gillespie, SamplingPolicy::OnIteration, 7);
    opts.t_max = 50.0;
    session
        .initialize_grid(
            line_grid(
                vec![10.0, 0.0, 0.0],
                [Boundary::Periodic, Boundary::Reflecting, Boundary::Reflecting],
            ),
            diffusion_network(1.0),
            opts,
        )
        .unwrap();
    run_to_completion(&mut session);

    for state in session.sampled_states().unwrap() {
        assert_eq!(state.iter().sum::<f64>(), 10.0);
        assert!(state.iter().all(|&x| x >= 0.0));
    }
}

#[test]
fn chemostatted_graph_node_holds_its_count_under_tauleap() {
    let mut session = Session::new();
    let mut opts = options(Algorithm::TauLeap, SamplingPolicy::OnIteration, 3);
    opts.t_max = 10.0;
    session
        .initialize_graph(
            GraphInit {
                n_nodes: 2,
                edges: vec![GraphEdge { a: 0, b: 1, surface: 1.0, distance: 1.0 }],
                state: vec![100.0, 0.0],
                chstt: vec![true, false],
                env: vec![0, 0],
                volumes: vec![1.0, 1.0],
            },
            diffusion_network(1.0),
            opts,
        )
        .unwrap();

    // the stochastic initializer must leave the pinned count exact
    assert_eq!(session.state().unwrap()[0], 100.0);
    run_to_completion(&mut session);

    for state in session.sampled_states().unwrap() {
        assert_eq!(state[0], 100.0);
    }
    assert!(session.state().unwrap()[1] > 0.0);
}

#[test]
fn graph_diffusion_equilibrates_to_the_volume_ratio() {
    // volumes 1 : 8 with one unit edge; Euler converges to counts 1 : 8
    let mut session = Session::new();
    let mut opts = options(Algorithm::Euler, SamplingPolicy::NoSampling, 0);
    opts.t_max = 200.0;
    session
        .initialize_graph(
            GraphInit {
                n_nodes: 2,
                edges: vec![GraphEdge { a: 0, b: 1, surface: 1.0, distance: 1.0 }],
                state: vec![9.0, 0.0],
                chstt: vec![false, false],
                env: vec![0, 0],
                volumes: vec![1.0, 8.0],
            },
            diffusion_network(1.0),
            opts,
        )
        .unwrap();
    run_to_completion(&mut session);

    let state = session.state().unwrap();
    assert!((state[0] + state[1] - 9.0).abs() < 1e-6);
    assert!((state[0] - 1.0).abs() < 1e-2, "mesh 0 ended at {}", state[0]);
    assert!((state[1] - 8.0).abs() < 1e-2, "mesh 1 ended at {}", state[1]);
}

#[test]
fn identical_seeds_reproduce_the_trajectory_bit_for_bit() {
    let run = || {
        let mut session = Session::new();
        let mut opts = options(Algorithm::Gillespie, SamplingPolicy::OnIteration, 1234);
        opts.t_max = 5.0;
        session
            .initialize_grid(
                line_grid(vec![20.0, 5.0, 0.0], reflecting()),
                diffusion_network(1.0),
                opts,
            )
            .unwrap();
        run_to_completion(&mut session);
        (
            session.sampled_times().unwrap().to_vec(),
            session.sampled_states().unwrap().to_vec(),
        )
    };
    let (times_a, states_a) = run();
    let (times_b, states_b) = run();
    assert_eq!(times_a, times_b);
    assert_eq!(states_a, states_b);
}

#[test]
fn zero_rate_reactions_leave_species_totals_constant_under_tauleap() {
    let mut network = decay_network();
    network.k = vec![0.0];
    network.diffusivity = vec![1.0];
    let mut session = Session::new();
    let mut opts = options(Algorithm::TauLeap, SamplingPolicy::OnIteration, 5);
    opts.t_max = 2.0;
    session
        .initialize_grid(line_grid(vec![30.0, 0.0], reflecting()), network, opts)
        .unwrap();
    run_to_completion(&mut session);

    for state in session.sampled_states().unwrap() {
        assert_eq!(state.iter().sum::<f64>(), 30.0);
    }
}

#[test]
fn grid_gillespie_honors_chemostats() {
    let mut init = line_grid(vec![10.0, 0.0], reflecting());
    init.chstt = vec![true, false];
    let mut session = Session::new();
    let mut opts = options(Algorithm::Gillespie, SamplingPolicy::OnIteration, 9);
    opts.t_max = 1.0;
    let mut network = decay_network();
    network.diffusivity = vec![1.0];
    session.initialize_grid(init, network, opts).unwrap();
    run_to_completion(&mut session);

    for state in session.sampled_states().unwrap() {
        assert_eq!(state[0], 10.0);
    }
}

#[test]
fn on_t_sample_takes_every_reachable_target() {
    let mut session = Session::new();
    let mut opts = options(Algorithm::Euler, SamplingPolicy::OnTSample, 0);
    opts.t_samples = vec![0.0, 0.25, 0.5, 1.0];
    opts.t_max = 2.0;
    opts.time_step = 0.1;
    session
        .initialize_grid(line_grid(vec![1.0], reflecting()), diffusion_network(0.0), opts)
        .unwrap();
    run_to_completion(&mut session);

    let times = session.sampled_times().unwrap();
    assert_eq!(times.len(), 4);
    for (t, target) in times.iter().zip([0.0, 0.25, 0.5, 1.0]) {
        assert!(t >= &target, "snapshot at {t} is before its target {target}");
    }
}

#[test]
fn one_coarse_step_can_emit_several_snapshots() {
    let mut session = Session::new();
    let mut opts = options(Algorithm::Euler, SamplingPolicy::OnTSample, 0);
    opts.t_samples = vec![0.05, 0.06, 0.07];
    opts.t_max = 1.0;
    opts.time_step = 0.1;
    session
        .initialize_grid(line_grid(vec![1.0], reflecting()), diffusion_network(0.0), opts)
        .unwrap();
    assert!(session.iterate().unwrap());

    let times = session.sampled_times().unwrap();
    assert_eq!(times.len(), 3);
    assert!(times.iter().all(|&t| (t - 0.1).abs() < 1e-12));
}

#[test]
fn explicit_sample_respects_the_per_iteration_guard() {
    let mut session = Session::new();
    session
        .initialize_grid(
            line_grid(vec![1.0], reflecting()),
            diffusion_network(0.0),
            options(Algorithm::Euler, SamplingPolicy::NoSampling, 0),
        )
        .unwrap();
    assert_eq!(session.n_samples().unwrap(), 0);
    session.sample().unwrap();
    session.sample().unwrap();
    assert_eq!(session.n_samples().unwrap(), 1);
    session.iterate().unwrap();
    session.sample().unwrap();
    assert_eq!(session.n_samples().unwrap(), 2);
}

#[test]
fn species_major_round_trip_is_identity() {
    let n_species = 3;
    let n_meshes = 4;
    let species_major: Vec<f64> = (0..n_species * n_meshes).map(|v| v as f64).collect();
    let mesh_major = species_major_to_mesh_major(&species_major, n_species, n_meshes);
    // mesh 0, species 2 lands at the head of the mesh-major layout
    assert_eq!(mesh_major[2], species_major[2 * n_meshes]);
    assert_eq!(
        mesh_major_to_species_major(&mesh_major, n_species, n_meshes),
        species_major
    );
}

#[test]
fn session_calls_require_an_active_simulation() {
    let mut session = Session::new();
    assert!(matches!(session.iterate(), Err(EngineError::NoSession)));
    assert!(matches!(session.t(), Err(EngineError::NoSession)));
    assert!(matches!(session.state(), Err(EngineError::NoSession)));
    // finalize is safe without a session
    session.finalize();
    session.finalize();
}

#[test]
fn reinitialization_replaces_the_previous_simulation() {
    let mut session = Session::new();
    let mut opts = options(Algorithm::Euler, SamplingPolicy::OnIteration, 0);
    opts.t_max = 1.0;
    session
        .initialize_grid(
            line_grid(vec![5.0], reflecting()),
            decay_network(),
            opts.clone(),
        )
        .unwrap();
    run_to_completion(&mut session);
    assert!(session.t().unwrap() > 1.0);

    session
        .initialize_grid(line_grid(vec![7.0, 7.0], reflecting()), decay_network(), opts)
        .unwrap();
    assert_eq!(session.t().unwrap(), 0.0);
    assert_eq!(session.n_meshes().unwrap(), 2);
    assert_eq!(session.n_samples().unwrap(), 1);

    session.finalize();
    assert!(matches!(session.iterate(), Err(EngineError::NoSession)));
}

#[test]
fn iterate_n_stops_early_on_completion() {
    let mut session = Session::new();
    session
        .initialize_grid(
            line_grid(vec![3.0], reflecting()),
            decay_network(),
            options(Algorithm::Gillespie, SamplingPolicy::NoSampling, 21),
        )
        .unwrap();
    // three decays plus the quiescent step
    assert!(!session.iterate_n(100).unwrap());
    assert_eq!(session.state().unwrap(), &[0.0]);
}

#[test]
fn run_honors_its_wall_clock_budget() {
    let mut session = Session::new();
    session
        .initialize_grid(
            line_grid(vec![1000.0, 0.0, 0.0, 0.0], reflecting()),
            diffusion_network(1.0),
            options(Algorithm::Gillespie, SamplingPolicy::NoSampling, 2),
        )
        .unwrap();
    // endless system: the budget is the only stop
    let started = std::time::Instant::now();
    let unfinished = session.run(Duration::from_millis(20)).unwrap();
    assert!(unfinished);
    assert!(started.elapsed() < Duration::from_secs(10));

    // a finishing system reports completion instead
    let mut finishing = Session::new();
    finishing
        .initialize_grid(
            line_grid(vec![3.0], reflecting()),
            decay_network(),
            options(Algorithm::Gillespie, SamplingPolicy::NoSampling, 21),
        )
        .unwrap();
    assert!(!finishing.run(Duration::from_secs(5)).unwrap());
}

#[test]
fn progress_tracks_the_time_cap() {
    let mut session = Session::new();
    let mut opts = options(Algorithm::Euler, SamplingPolicy::NoSampling, 0);
    opts.t_max = 1.0;
    opts.time_step = 0.25;
    session
        .initialize_grid(line_grid(vec![1.0], reflecting()), diffusion_network(0.0), opts)
        .unwrap();
    assert_eq!(session.progress().unwrap(), 0.0);
    session.iterate().unwrap();
    assert!((session.progress().unwrap() - 25.0).abs() < 1e-9);
    run_to_completion(&mut session);
    assert!(session.progress().unwrap() > 100.0);
}

#[test]
fn euler_uses_the_float_field_verbatim() {
    let mut session = Session::new();
    session
        .initialize_grid(
            line_grid(vec![10.6, 0.3], reflecting()),
            diffusion_network(0.0),
            options(Algorithm::Euler, SamplingPolicy::NoSampling, 0),
        )
        .unwrap();
    assert_eq!(session.state().unwrap(), &[10.6, 0.3]);
}

#[test]
fn stochastic_initialization_floors_species_totals() {
    let mut session = Session::new();
    session
        .initialize_grid(
            line_grid(vec![10.6, 0.3, 5.5], reflecting()),
            diffusion_network(0.0),
            options(Algorithm::Gillespie, SamplingPolicy::NoSampling, 8),
        )
        .unwrap();
    let state = session.state().unwrap();
    assert_eq!(state.iter().sum::<f64>(), 16.0);
    assert!(state.iter().all(|&x| x >= 0.0 && x.fract() == 0.0));
}
