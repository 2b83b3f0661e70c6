//! Trajectory sampling.
//!
//! The sampler owns the in-memory trajectory buffer and decides, after each
//! time advance, whether the current state is copied into it. A
//! per-iteration guard keeps `on_iteration`, `on_interval`, and explicit
//! requests from recording the same instant twice; `on_t_sample` records one
//! snapshot per crossed target (tagged with the real time, not the target),
//! so a coarse step over several targets still yields one snapshot each.

use crate::config::SamplingPolicy;

pub struct Sampler {
    policy: SamplingPolicy,
    t_samples: Vec<f64>,
    sample_pos: usize,
    interval: f64,
    // floor(t / interval) of the last interval snapshot; starts below zero
    // so the pre-iteration pass can capture t = 0.
    last_tsi_ratio: f64,
    sampled_this_iteration: bool,
    times: Vec<f64>,
    states: Vec<Vec<f64>>,
}

impl Sampler {
    pub fn new(policy: SamplingPolicy, t_samples: Vec<f64>, interval: f64) -> Self {
        Self {
            policy,
            t_samples,
            sample_pos: 0,
            interval,
            last_tsi_ratio: -1.0,
            sampled_this_iteration: false,
            times: Vec::new(),
            states: Vec::new(),
        }
    }

    pub fn begin_iteration(&mut self) {
        self.sampled_this_iteration = false;
    }

    fn record(&mut self, t: f64, state: &[f64]) {
        self.times.push(t);
        self.states.push(state.to_vec());
        self.sampled_this_iteration = true;
    }

    /// Guarded snapshot, used by the iteration-driven policies and by
    /// explicit requests from the caller.
    pub fn sample(&mut self, t: f64, state: &[f64]) {
        if !self.sampled_this_iteration {
            self.record(t, state);
        }
    }

    /// Runs the active policy against the current time.
    pub fn after_step(&mut self, t: f64, state: &[f64]) {
        match self.policy {
            SamplingPolicy::OnTSample => {
                while self.sample_pos < self.t_samples.len() && t >= self.t_samples[self.sample_pos]
                {
                    self.record(t, state);
                    self.sample_pos += 1;
                }
            }
            SamplingPolicy::OnIteration => self.sample(t, state),
            SamplingPolicy::OnInterval => {
                let tsi_ratio = (t / self.interval).floor();
                if tsi_ratio > self.last_tsi_ratio {
                    self.sample(t, state);
                    self.last_tsi_ratio = tsi_ratio;
                }
            }
            SamplingPolicy::NoSampling => {}
        }
    }

    pub fn n_samples(&self) -> usize {
        self.times.len()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn states(&self) -> &[Vec<f64>] {
        &self.states
    }
}
