//! Per-batch forward cache. Named explicitly so its lifetime (acquired
//! in `forward`, released at the matching `backward`) is visible in the
//! type system rather than implicit in control flow.

/// Everything one layer needs to remember about one example's forward
/// pass in order to run backward later.
#[derive(Clone)]
pub struct LayerCache {
    /// Neuron ids active for this example.
    pub active: Vec<u32>,
    /// Dense input to this layer for this example (the previous
    /// layer's dense output, or the network input for layer 0).
    pub input: Vec<f32>,
    /// Pre-activation values, aligned with `active`.
    pub z: Vec<f32>,
    /// Dense post-activation output, length `units`, zero outside
    /// `active`.
    pub a: Vec<f32>,
}

/// One example's cache across every layer of the network, plus the
/// dense network input needed to re-derive `delta_in` free variables.
/// Scoped: built by `Network::forward`, consumed by exactly one
/// `Network::backward` call, then dropped.
pub struct BatchContext {
    pub per_layer: Vec<Vec<LayerCache>>,
}

impl BatchContext {
    pub fn new(n_layers: usize) -> Self {
        BatchContext {
            per_layer: (0..n_layers).map(|_| Vec::new()).collect(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.per_layer.first().map(|l| l.len()).unwrap_or(0)
    }
}
