//! Network: layer composition, batch orchestration, and the parallel
//! regions of the forward/backward/rebuild cycle.
use crate::activation::Activation;
use crate::batch::BatchContext;
use crate::error::{Error, Result};
use crate::hash::HashSpec;
use crate::init::Initializer;
use crate::layer::Layer;
use crate::optimizer::Optimizer;
use crate::scheduler::Scheduler;
use ndarray::{Array2, Axis};
use rayon::prelude::*;

/// Grouped construction parameters, so callers don't have to thread an
/// 8-argument function. `Network::new` is a thin flat-argument wrapper
/// over this.
#[derive(Clone)]
pub struct NetworkConfig {
    /// Default number of hash tables `L`, used only to build the
    /// default hash family when `hash` is `None` (an explicit `hash`
    /// carries its own `L`).
    pub l: usize,
    pub activation: Activation,
    pub optimizer: Optimizer,
    pub scheduler: Scheduler,
    /// `None` means "auto": `Gauss(0, 1/sqrt(fan_in))` per layer.
    pub initializer: Option<Initializer>,
    /// `None` means "auto": `DWTA(8, l)`.
    pub hash: Option<HashSpec>,
    pub sparsity: f32,
    pub l2: f32,
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            l: 50,
            activation: Activation::ReLU,
            optimizer: Optimizer::adam_default(),
            scheduler: Scheduler::constant_frequency(50).expect("50 > 0"),
            initializer: None,
            hash: None,
            sparsity: 0.0,
            l2: 0.0,
            seed: 1,
        }
    }
}

pub struct Network {
    layers: Vec<Layer>,
    optimizer: Optimizer,
    scheduler: Scheduler,
    l2: f32,
    d_in: usize,
    d_out: usize,
    /// Set by `forward`, consumed by the next `backward`; `None` means
    /// no forward is currently pending.
    pending: Option<BatchContext>,
    last_output_shape: (usize, usize),
}

impl Network {
    /// `units` is empty for a zero-layer passthrough network: valid,
    /// e.g. `Network::new(16, &[], ..)` with no hidden or output layers.
    pub fn new(input_size: i64, units: &[i64], config: NetworkConfig) -> Result<Self> {
        if input_size <= 0 {
            return Err(Error::InvalidArgument("input_size must be > 0".into()));
        }
        let input_size = input_size as usize;

        let mut sizes = Vec::with_capacity(units.len());
        for &u in units {
            if u <= 0 {
                return Err(Error::InvalidArgument("every unit count must be > 0".into()));
            }
            sizes.push(u as usize);
        }

        if config.l == 0 {
            return Err(Error::InvalidArgument("L must be > 0".into()));
        }

        let mut layers = Vec::with_capacity(sizes.len());
        let mut fan_in = input_size;
        for (i, &units) in sizes.iter().enumerate() {
            let initializer = match &config.initializer {
                Some(init) => init.clone(),
                None => Initializer::gauss(0.0, 1.0 / (fan_in as f32).sqrt())?,
            };
            let hash_spec = config.hash.unwrap_or(HashSpec::Dwta { k: 8, l: config.l });
            let layer = Layer::new(
                fan_in,
                units,
                config.activation,
                hash_spec,
                &initializer,
                &config.optimizer,
                config.sparsity,
                config.seed.wrapping_add(i as u64 * 7919),
            )?;
            layers.push(layer);
            fan_in = units;
        }
        let d_out = sizes.last().copied().unwrap_or(input_size);

        Ok(Network {
            layers,
            optimizer: config.optimizer,
            scheduler: config.scheduler,
            l2: config.l2,
            d_in: input_size,
            d_out,
            pending: None,
            last_output_shape: (0, d_out),
        })
    }

    pub fn input_size(&self) -> usize {
        self.d_in
    }

    pub fn output_size(&self) -> usize {
        self.d_out
    }

    /// Dense batch forward pass. `X` is `(B, d_in)`, returns `(B,
    /// d_out)`. Caches batch context for the matching `backward` call.
    pub fn forward(&mut self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.d_in {
            return Err(Error::ShapeMismatch {
                expected: (x.nrows(), self.d_in),
                got: x.dim(),
            });
        }
        let batch_size = x.nrows();

        if self.layers.is_empty() {
            self.pending = Some(BatchContext::new(0));
            self.last_output_shape = x.dim();
            return Ok(x.clone());
        }

        let mut ctx = BatchContext::new(self.layers.len());
        let mut current_inputs: Vec<Vec<f32>> = x.axis_iter(Axis(0)).map(|row| row.to_vec()).collect();

        for (k, layer) in self.layers.iter().enumerate() {
            let caches: Vec<_> = current_inputs
                .par_iter()
                .map(|row| layer.forward(row, None))
                .collect::<Result<Vec<_>>>()?;
            current_inputs = caches.iter().map(|c| c.a.clone()).collect();
            ctx.per_layer[k] = caches;
        }

        let d_out = self.d_out;
        let mut y = Array2::zeros((batch_size, d_out));
        for (mut row, a) in y.axis_iter_mut(Axis(0)).zip(&current_inputs) {
            row.as_slice_mut().unwrap().copy_from_slice(a);
        }

        self.last_output_shape = y.dim();
        self.pending = Some(ctx);
        Ok(y)
    }

    /// One optimizer step from the incoming loss gradient `G` (shape of
    /// the last `forward`'s output), then periodic rebuild. Must be
    /// preceded by exactly one `forward`.
    pub fn backward(&mut self, g: &Array2<f32>) -> Result<()> {
        let mut ctx = self
            .pending
            .take()
            .ok_or_else(|| Error::InvalidState("backward called without a matching forward".into()))?;

        if g.dim() != self.last_output_shape {
            self.pending = None;
            return Err(Error::ShapeMismatch {
                expected: self.last_output_shape,
                got: g.dim(),
            });
        }

        if self.layers.is_empty() {
            return Ok(());
        }

        let batch_size = g.nrows();
        let mut delta: Vec<Vec<f32>> = g.axis_iter(Axis(0)).map(|row| row.to_vec()).collect();

        for (k, layer) in self.layers.iter_mut().enumerate().rev() {
            let caches = std::mem::take(&mut ctx.per_layer[k]);
            let items: Vec<_> = caches.into_iter().zip(delta.into_iter()).collect();
            delta = layer.backward_batch(&items);
        }

        for layer in self.layers.iter_mut() {
            layer.update(&self.optimizer, batch_size, self.l2);
        }

        if self.scheduler.tick() {
            log::debug!("rebuilding hash tables for {} layers", self.layers.len());
            // Rebuild failures are fatal to this step: every layer's
            // task reports into a shared slot and the first one to
            // fail becomes the single error `backward` re-raises once
            // the parallel region has joined.
            let first_error: std::sync::Mutex<Option<String>> = std::sync::Mutex::new(None);
            rayon::scope(|s| {
                for layer in self.layers.iter_mut() {
                    let first_error = &first_error;
                    s.spawn(move |_| {
                        if let Err(e) = layer.rebuild() {
                            let mut slot = first_error.lock().unwrap();
                            if slot.is_none() {
                                *slot = Some(e.to_string());
                            }
                        }
                    });
                }
            });
            if let Some(msg) = first_error.into_inner().unwrap() {
                return Err(Error::ParallelFailure(msg));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hash::HashSpec;
    use ndarray::Array2;

    #[test]
    fn test_shape_round_trip() {
        let config = NetworkConfig {
            l: 5,
            scheduler: Scheduler::constant_frequency(5).unwrap(),
            hash: Some(HashSpec::Dwta { k: 8, l: 5 }),
            ..NetworkConfig::default()
        };
        let mut net = Network::new(2, &[1], config).unwrap();
        let x = Array2::zeros((1, 2));
        let y = net.forward(&x).unwrap();
        assert_eq!(y.dim(), (1, 1));
        assert!(net.backward(&y).is_ok());
    }

    #[test]
    fn test_constructor_validation() {
        assert!(matches!(
            Network::new(-2, &[], NetworkConfig::default()),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Network::new(16, &[-10, 2, 5], NetworkConfig::default()),
            Err(Error::InvalidArgument(_))
        ));
        let mut bad_l = NetworkConfig::default();
        bad_l.l = 0;
        assert!(matches!(Network::new(16, &[10, 10], bad_l), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_default_network_constructs() {
        assert!(Network::new(16, &[], NetworkConfig::default()).is_ok());
    }

    #[test]
    fn test_backward_without_forward_is_invalid_state() {
        let mut net = Network::new(4, &[3], NetworkConfig::default()).unwrap();
        let g = Array2::zeros((1, 3));
        assert!(matches!(net.backward(&g), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_backward_shape_mismatch() {
        let mut net = Network::new(4, &[3], NetworkConfig::default()).unwrap();
        let x = Array2::zeros((2, 4));
        net.forward(&x).unwrap();
        let wrong_g = Array2::zeros((2, 99));
        assert!(matches!(net.backward(&wrong_g), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_forward_shape_mismatch() {
        let mut net = Network::new(4, &[3], NetworkConfig::default()).unwrap();
        let x = Array2::zeros((2, 7));
        assert!(matches!(net.forward(&x), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_sparsity_bound_across_batch() {
        let mut config = NetworkConfig::default();
        config.sparsity = 0.8;
        config.hash = Some(HashSpec::Dwta { k: 6, l: 8 });
        let mut net = Network::new(20, &[100], config).unwrap();
        let x = Array2::from_shape_fn((32, 20), |(i, j)| ((i * 7 + j * 3) % 11) as f32 - 5.0);
        let y = net.forward(&x).unwrap();
        assert_eq!(y.dim(), (32, 100));
        // every example's layer-0 active set respected the 80-neuron floor.
        let ctx = net.pending.as_ref().unwrap();
        for cache in &ctx.per_layer[0] {
            assert!(cache.active.len() >= 80);
        }
        net.backward(&y).unwrap();
    }
}
