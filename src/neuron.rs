//! A single neuron: weight vector, bias, stable id, and its own
//! optimizer state. The per-neuron optimizer state and gradient
//! accumulator live directly on the struct rather than in a side
//! table, since a Layer owns its Neurons outright.
use crate::optimizer::{Optimizer, OptimizerState};
use rand::Rng;

pub struct Neuron {
    pub id: u32,
    pub weights: Vec<f32>,
    pub bias: f32,
    opt_state: OptimizerState,
    bias_opt_state: OptimizerState,
    /// Gradient accumulated across the current batch. `None` means this
    /// neuron has not been touched by any example in the batch yet.
    grad_w: Option<Vec<f32>>,
    grad_b: f32,
    touches: u32,
}

impl Neuron {
    pub fn new<R: Rng>(id: u32, fan_in: usize, rng: &mut R, init: &crate::init::Initializer, optimizer: &Optimizer) -> Self {
        let mut weights = vec![0.0; fan_in];
        init.fill(rng, &mut weights);
        let bias = 0.0;
        Neuron {
            id,
            weights,
            bias,
            opt_state: optimizer.new_state(fan_in),
            bias_opt_state: optimizer.new_state(1),
            grad_w: None,
            grad_b: 0.0,
            touches: 0,
        }
    }

    pub fn fan_in(&self) -> usize {
        self.weights.len()
    }

    /// Pre-activation `z = b + w . x`.
    pub fn preactivate(&self, x: &[f32]) -> f32 {
        debug_assert_eq!(x.len(), self.weights.len());
        self.bias + self.weights.iter().zip(x).map(|(w, xi)| w * xi).sum::<f32>()
    }

    /// Accumulate this example's contribution to `dL/dw` and `dL/db`
    /// for the current batch. `g` is `delta_out * activation'(z)`.
    pub fn accumulate_gradient(&mut self, g: f32, x: &[f32]) {
        let buf = self.grad_w.get_or_insert_with(|| vec![0.0; self.weights.len()]);
        for (acc, xi) in buf.iter_mut().zip(x) {
            *acc += g * xi;
        }
        self.grad_b += g;
        self.touches += 1;
    }

    /// Merge an already-computed per-parameter gradient contribution
    /// (used by the parallel-batch path, which computes `g * x_f` in a
    /// per-thread shadow buffer and only reduces into the neuron at
    /// the batch barrier).
    pub fn accumulate_gradient_shadow(&mut self, grad_w: &[f32], grad_b: f32) {
        let buf = self.grad_w.get_or_insert_with(|| vec![0.0; self.weights.len()]);
        for (acc, g) in buf.iter_mut().zip(grad_w) {
            *acc += g;
        }
        self.grad_b += grad_b;
        self.touches += 1;
    }

    /// Whether this neuron was touched by at least one example this
    /// batch. Untouched neurons must be unchanged after update.
    pub fn was_touched(&self) -> bool {
        self.grad_w.is_some()
    }

    /// Apply one optimizer step using the batch-averaged accumulated
    /// gradient (with additive L2 decay), then clear the accumulator.
    /// No-op if this neuron was never touched this batch.
    pub fn apply_update(&mut self, optimizer: &Optimizer, batch_size: usize, l2: f32) {
        let mut grad_w = match self.grad_w.take() {
            Some(g) => g,
            None => return,
        };
        let scale = 1.0 / batch_size as f32;
        for (g, w) in grad_w.iter_mut().zip(&self.weights) {
            *g = *g * scale + l2 * w;
        }
        let grad_b = self.grad_b * scale;

        optimizer.step(&mut self.opt_state, &mut self.weights, &grad_w);
        let mut bias_arr = [self.bias];
        optimizer.step(&mut self.bias_opt_state, &mut bias_arr, &[grad_b]);
        self.bias = bias_arr[0];

        self.grad_b = 0.0;
        self.touches = 0;
    }
}
