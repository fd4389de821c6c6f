//! Neuron/Layer: the sparse layer engine kernel. Active-set selection,
//! sparse forward/backward, and rebuild. The layer owns its neurons,
//! its hasher, and its tables directly rather than delegating to an
//! external indexing service.
use crate::activation::Activation;
use crate::batch::LayerCache;
use crate::error::{Error, Result};
use crate::hash::{HashFamily, HashSpec, VecHash};
use crate::init::Initializer;
use crate::neuron::Neuron;
use crate::optimizer::Optimizer;
use crate::table::HashTable;
use crate::utils::create_rng;
use fnv::FnvHashSet;
use rayon::prelude::*;
use std::collections::HashMap;

pub struct Layer {
    fan_in: usize,
    units: usize,
    activation: Activation,
    neurons: Vec<Neuron>,
    hasher: HashFamily,
    tables: HashTable,
    /// Fraction of `units` that must be active per example (0 disables
    /// padding).
    sparsity: f32,
}

impl Layer {
    pub fn new(
        fan_in: usize,
        units: usize,
        activation: Activation,
        hash_spec: HashSpec,
        initializer: &Initializer,
        optimizer: &Optimizer,
        sparsity: f32,
        seed: u64,
    ) -> Result<Self> {
        if fan_in == 0 || units == 0 {
            return Err(Error::InvalidArgument(
                "layer fan_in and units must both be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&sparsity) {
            return Err(Error::InvalidArgument("sparsity must be in [0, 1]".into()));
        }
        let mut rng = create_rng(seed);
        let neurons: Vec<Neuron> = (0..units as u32)
            .map(|id| Neuron::new(id, fan_in, &mut rng, initializer, optimizer))
            .collect();
        let hasher = hash_spec.build(fan_in, seed.wrapping_add(1))?;
        let mut tables = HashTable::new(hasher.l());
        tables.rebuild(&hasher, neurons.iter().map(|n| (n.id, n.weights.clone())))?;

        Ok(Layer {
            fan_in,
            units,
            activation,
            neurons,
            hasher,
            tables,
            sparsity,
        })
    }

    pub fn fan_in(&self) -> usize {
        self.fan_in
    }

    pub fn units(&self) -> usize {
        self.units
    }

    /// Neurons colliding with `x` in at least one of the `L` buckets,
    /// optionally unioned with label-forced neurons, with the empty-set
    /// and sparsity-floor fallbacks applied. Never empty.
    fn active_set(&self, x: &[f32], label: Option<&[f32]>) -> Result<Vec<u32>> {
        let keys = self.hasher.hash(x)?;
        let mut seen = FnvHashSet::default();
        let mut active = Vec::new();
        for (table_idx, key) in keys.into_iter().enumerate() {
            for &id in self.tables.bucket(table_idx, key) {
                if seen.insert(id) {
                    active.push(id);
                }
            }
        }

        if let Some(y) = label {
            for (id, &y_n) in y.iter().enumerate() {
                if y_n != 0.0 && seen.insert(id as u32) {
                    active.push(id as u32);
                }
            }
        }

        if active.is_empty() {
            let stride = (self.units as f64 / self.hasher.l() as f64).ceil() as u32;
            let stride = stride.max(1);
            for id in (0..self.units as u32).filter(|id| id % stride == 0) {
                if seen.insert(id) {
                    active.push(id);
                }
            }
        }

        let floor = (self.sparsity as f64 * self.units as f64).ceil() as usize;
        if self.sparsity > 0.0 && active.len() < floor {
            let mut ranked: Vec<(u32, f32)> = (0..self.units as u32)
                .filter(|id| !seen.contains(id))
                .map(|id| {
                    let z = self.neurons[id as usize].preactivate(x).abs();
                    (id, z)
                })
                .collect();
            // highest magnitude first, ties broken by ascending id.
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)));
            let needed = floor - active.len();
            active.extend(ranked.into_iter().take(needed).map(|(id, _)| id));
        }

        Ok(active)
    }

    /// Sparse forward pass for one example.
    pub fn forward(&self, x: &[f32], label: Option<&[f32]>) -> Result<LayerCache> {
        if x.len() != self.fan_in {
            return Err(Error::ShapeMismatch {
                expected: (1, self.fan_in),
                got: (1, x.len()),
            });
        }
        let active = self.active_set(x, label)?;
        let mut z = Vec::with_capacity(active.len());
        let mut a = vec![0.0; self.units];
        for &id in &active {
            let z_n = self.neurons[id as usize].preactivate(x);
            a[id as usize] = self.activation.f(z_n);
            z.push(z_n);
        }
        Ok(LayerCache {
            active,
            input: x.to_vec(),
            z,
            a,
        })
    }

    /// Sparse backward pass for a whole batch at once, so per-neuron
    /// gradient accumulation can run through per-thread shadow buffers
    /// reduced at a barrier instead of atomics. Returns `delta_in` for
    /// each example, in the same order as `items`.
    pub fn backward_batch(&mut self, items: &[(LayerCache, Vec<f32>)]) -> Vec<Vec<f32>> {
        let fan_in = self.fan_in;
        let activation = self.activation;
        let neurons = &self.neurons;

        let (delta_ins, shadows): (Vec<Vec<f32>>, Vec<HashMap<u32, (Vec<f32>, f32)>>) = items
            .par_iter()
            .map(|(cache, delta_out)| {
                let mut delta_in = vec![0.0f32; fan_in];
                let mut shadow: HashMap<u32, (Vec<f32>, f32)> = HashMap::new();
                for (&n_id, &z) in cache.active.iter().zip(cache.z.iter()) {
                    let g = delta_out[n_id as usize] * activation.f_prime(z);
                    let neuron = &neurons[n_id as usize];
                    let entry = shadow
                        .entry(n_id)
                        .or_insert_with(|| (vec![0.0; fan_in], 0.0));
                    for (acc, xi) in entry.0.iter_mut().zip(&cache.input) {
                        *acc += g * xi;
                    }
                    entry.1 += g;
                    for (di, &w) in delta_in.iter_mut().zip(&neuron.weights) {
                        *di += g * w;
                    }
                }
                (delta_in, shadow)
            })
            .unzip();

        for shadow in shadows {
            for (n_id, (gw, gb)) in shadow {
                self.neurons[n_id as usize].accumulate_gradient_shadow(&gw, gb);
            }
        }

        delta_ins
    }

    /// Optimizer step on every touched neuron, with additive L2 decay,
    /// then clears accumulators. Untouched neurons are left
    /// bit-for-bit unchanged.
    pub fn update(&mut self, optimizer: &Optimizer, batch_size: usize, l2: f32) {
        for neuron in self.neurons.iter_mut() {
            neuron.apply_update(optimizer, batch_size, l2);
        }
    }

    /// Re-hash every neuron's current weight vector and rebuild all
    /// `L` tables.
    pub fn rebuild(&mut self) -> Result<()> {
        let neurons = &self.neurons;
        self.tables
            .rebuild(&self.hasher, neurons.iter().map(|n| (n.id, n.weights.clone())))
    }

    #[cfg(test)]
    pub(crate) fn neuron_weights(&self, id: u32) -> &[f32] {
        &self.neurons[id as usize].weights
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hash::HashSpec;

    fn test_layer(fan_in: usize, units: usize, sparsity: f32) -> Layer {
        let init = Initializer::gauss(0.0, 1.0).unwrap();
        let opt = Optimizer::sgd(0.1).unwrap();
        Layer::new(
            fan_in,
            units,
            Activation::ReLU,
            HashSpec::Dwta { k: 4, l: 5 },
            &init,
            &opt,
            sparsity,
            7,
        )
        .unwrap()
    }

    #[test]
    fn test_forward_output_zero_outside_active() {
        let layer = test_layer(6, 20, 0.0);
        let x = vec![0.1, -0.2, 0.3, 0.0, 0.5, -0.1];
        let cache = layer.forward(&x, None).unwrap();
        let active: FnvHashSet<u32> = cache.active.iter().copied().collect();
        for (id, &a) in cache.a.iter().enumerate() {
            if !active.contains(&(id as u32)) {
                assert_eq!(a, 0.0);
            }
        }
    }

    #[test]
    fn test_active_set_never_empty() {
        let layer = test_layer(6, 20, 0.0);
        let x = vec![0.0; 6];
        let cache = layer.forward(&x, None).unwrap();
        assert!(!cache.active.is_empty());
    }

    #[test]
    fn test_label_aware_retrieval_forces_inclusion() {
        let layer = test_layer(6, 20, 0.0);
        let x = vec![0.1, -0.2, 0.3, 0.0, 0.5, -0.1];
        let mut label = vec![0.0; 20];
        label[17] = 1.0;
        let cache = layer.forward(&x, Some(&label)).unwrap();
        assert!(cache.active.contains(&17));
    }

    #[test]
    fn test_sparsity_floor_is_respected() {
        let layer = test_layer(6, 100, 0.8);
        let x = vec![0.2, -0.1, 0.0, 0.3, -0.4, 0.1];
        let cache = layer.forward(&x, None).unwrap();
        assert!(cache.active.len() >= 80);
    }

    #[test]
    fn test_active_set_has_no_duplicates_even_when_hash_misses_and_sparsity_pads() {
        // with a single table and a tiny bin size most inputs will miss
        // every bucket, forcing the empty-set fallback; sparsity then
        // pads further. Neither step must double-insert an id.
        let init = Initializer::gauss(0.0, 1.0).unwrap();
        let opt = Optimizer::sgd(0.1).unwrap();
        let layer = Layer::new(
            6,
            50,
            Activation::ReLU,
            HashSpec::Dwta { k: 2, l: 1 },
            &init,
            &opt,
            0.9,
            11,
        )
        .unwrap();
        for seed in 0..20u32 {
            let x: Vec<f32> = (0..6).map(|i| ((seed * 7 + i) % 5) as f32 - 2.0).collect();
            let active = layer.active_set(&x, None).unwrap();
            let unique: FnvHashSet<u32> = active.iter().copied().collect();
            assert_eq!(active.len(), unique.len(), "duplicate neuron id in active set for x={:?}", x);
        }
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let layer = test_layer(6, 10, 0.0);
        let x = vec![0.0; 3];
        assert!(matches!(layer.forward(&x, None), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_untouched_neurons_unchanged_after_batch_update() {
        let mut layer = test_layer(4, 50, 0.0);
        let x = vec![0.3, -0.2, 0.1, 0.05];
        let cache = layer.forward(&x, None).unwrap();
        let untouched: Vec<u32> = (0..50).filter(|id| !cache.active.contains(id)).collect();
        assert!(!untouched.is_empty());
        let before: Vec<Vec<f32>> = untouched.iter().map(|&id| layer.neuron_weights(id).to_vec()).collect();

        let delta_out = vec![1.0; 50];
        layer.backward_batch(&[(cache, delta_out)]);
        layer.update(&Optimizer::sgd(0.1).unwrap(), 1, 0.0);

        for (id, before_w) in untouched.iter().zip(before) {
            assert_eq!(layer.neuron_weights(*id), before_w.as_slice());
        }
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let mut layer = test_layer(6, 10, 0.0);
        layer.rebuild().unwrap();
        let x = vec![0.1; 6];
        let a = layer.forward(&x, None).unwrap().active;
        layer.rebuild().unwrap();
        let b = layer.forward(&x, None).unwrap().active;
        assert_eq!(a, b);
    }
}
