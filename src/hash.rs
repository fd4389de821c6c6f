//! Winner-Take-All family locality-sensitive hashers.
//!
//! Both [`WTA`] and [`DWTA`] sample their permutations once, at
//! construction, from a seeded RNG and freeze them.
use crate::error::{Error, Result};
use crate::utils::create_rng;
use rand::seq::SliceRandom;
use rand::Rng;

/// Default bin size `P`: the number of coordinates a single permutation
/// restricts its argmax search to. Not exposed as a constructor
/// argument (`WTA`/`DWTA` only take `K` and `L`), so it is a fixed
/// implementation constant, consistent with the literature's common
/// default.
const DEFAULT_BIN_SIZE: usize = 8;

/// A bucket key: the concatenation of `K` per-permutation codes for one
/// of the `L` hash tables.
pub type HashKey = u64;

/// Common contract for the WTA-family hashers: map a dense activation
/// vector to `L` bucket keys. Side-effect free.
pub trait VecHash {
    /// Hash a query/activation vector into `L` bucket keys.
    fn hash(&self, x: &[f32]) -> Result<Vec<HashKey>>;

    fn k(&self) -> usize;
    fn l(&self) -> usize;
    fn dim(&self) -> usize;
}

/// One permutation: a fixed ordering of coordinate indices, truncated to
/// the first `bin_size` entries.
type Permutation = Vec<u32>;

fn sample_permutations<R: Rng>(rng: &mut R, dim: usize, bin_size: usize, n: usize) -> Vec<Permutation> {
    let bin_size = bin_size.min(dim);
    let mut base: Vec<u32> = (0..dim as u32).collect();
    (0..n)
        .map(|_| {
            base.shuffle(rng);
            base[..bin_size].to_vec()
        })
        .collect()
}

/// Argmax (and whether the window is degenerate, i.e. every coordinate
/// equal, e.g. all zero) within one permutation's window.
fn window_argmax(x: &[f32], perm: &Permutation) -> (usize, bool) {
    let mut best_idx = 0;
    let mut best_val = x[perm[0] as usize];
    let mut degenerate = true;
    for (i, &coord) in perm.iter().enumerate().skip(1) {
        let v = x[coord as usize];
        if v != best_val {
            degenerate = false;
        }
        if v > best_val {
            best_val = v;
            best_idx = i;
        }
    }
    (best_idx, degenerate)
}

fn check_dim(x: &[f32], dim: usize) -> Result<()> {
    if x.len() != dim {
        return Err(Error::InvalidArgument(format!(
            "expected input of dimension {}, got {}",
            dim,
            x.len()
        )));
    }
    Ok(())
}

/// Winner-Take-All hashing. `K` permutations per table, `L` independent
/// tables. Each permutation contributes the index (within its window)
/// of the argmax coordinate; the `K` contributions are combined with a
/// mixed-radix accumulation into one [`HashKey`] per table.
#[derive(Clone)]
pub struct WTA {
    permutations: Vec<Permutation>,
    k: usize,
    l: usize,
    bin_size: usize,
    dim: usize,
}

impl WTA {
    /// `k` permutations per table, `l` independent tables.
    pub fn new(k: usize, l: usize, dim: usize, seed: u64) -> Result<Self> {
        Self::with_bin_size(k, l, dim, DEFAULT_BIN_SIZE, seed)
    }

    pub fn with_bin_size(k: usize, l: usize, dim: usize, bin_size: usize, seed: u64) -> Result<Self> {
        if k == 0 || l == 0 {
            return Err(Error::InvalidArgument(
                "WTA requires k > 0 and l > 0".into(),
            ));
        }
        if dim == 0 {
            return Err(Error::InvalidArgument("WTA requires dim > 0".into()));
        }
        let mut rng = create_rng(seed);
        let permutations = sample_permutations(&mut rng, dim, bin_size, k * l);
        Ok(WTA {
            permutations,
            k,
            l,
            bin_size: bin_size.min(dim),
            dim,
        })
    }
}

impl VecHash for WTA {
    fn hash(&self, x: &[f32]) -> Result<Vec<HashKey>> {
        check_dim(x, self.dim)?;
        let radix = self.bin_size as HashKey;
        let mut keys = Vec::with_capacity(self.l);
        for t in 0..self.l {
            let mut key: HashKey = 0;
            for j in 0..self.k {
                let perm = &self.permutations[t * self.k + j];
                let (argmax, _) = window_argmax(x, perm);
                key = key * radix + argmax as HashKey;
            }
            keys.push(key);
        }
        Ok(keys)
    }

    fn k(&self) -> usize {
        self.k
    }
    fn l(&self) -> usize {
        self.l
    }
    fn dim(&self) -> usize {
        self.dim
    }
}

/// Densified WTA. Identical to [`WTA`], except a degenerate window (all
/// coordinates tied, e.g. all zero) borrows its code from the next
/// permutation in the same table that is *not* degenerate, scanned
/// cyclically; if every permutation in a table is degenerate the code
/// falls back to `0`. This keeps hashing deterministic (same input
/// always yields the same densification decisions) and total (`A` is
/// never starved just because the input happens to be sparse).
#[derive(Clone)]
pub struct DWTA {
    permutations: Vec<Permutation>,
    k: usize,
    l: usize,
    bin_size: usize,
    dim: usize,
}

impl DWTA {
    pub fn new(k: usize, l: usize, dim: usize, seed: u64) -> Result<Self> {
        Self::with_bin_size(k, l, dim, DEFAULT_BIN_SIZE, seed)
    }

    pub fn with_bin_size(k: usize, l: usize, dim: usize, bin_size: usize, seed: u64) -> Result<Self> {
        if k == 0 || l == 0 {
            return Err(Error::InvalidArgument(
                "DWTA requires k > 0 and l > 0".into(),
            ));
        }
        if dim == 0 {
            return Err(Error::InvalidArgument("DWTA requires dim > 0".into()));
        }
        let mut rng = create_rng(seed);
        let permutations = sample_permutations(&mut rng, dim, bin_size, k * l);
        Ok(DWTA {
            permutations,
            k,
            l,
            bin_size: bin_size.min(dim),
            dim,
        })
    }

    fn densified_code(&self, x: &[f32], table: usize, slot: usize) -> usize {
        let base = table * self.k;
        let (argmax, degenerate) = window_argmax(x, &self.permutations[base + slot]);
        if !degenerate {
            return argmax;
        }
        for offset in 1..self.k {
            let probe = (slot + offset) % self.k;
            let (argmax, degenerate) = window_argmax(x, &self.permutations[base + probe]);
            if !degenerate {
                return argmax;
            }
        }
        0
    }
}

impl VecHash for DWTA {
    fn hash(&self, x: &[f32]) -> Result<Vec<HashKey>> {
        check_dim(x, self.dim)?;
        let radix = self.bin_size as HashKey;
        let mut keys = Vec::with_capacity(self.l);
        for t in 0..self.l {
            let mut key: HashKey = 0;
            for j in 0..self.k {
                let code = self.densified_code(x, t, j);
                key = key * radix + code as HashKey;
            }
            keys.push(key);
        }
        Ok(keys)
    }

    fn k(&self) -> usize {
        self.k
    }
    fn l(&self) -> usize {
        self.l
    }
    fn dim(&self) -> usize {
        self.dim
    }
}

/// Either hash family, so a [`crate::layer::Layer`] can own one without
/// a trait object. A small tagged-variant style is preferred here over
/// a deeper inheritance hierarchy for a capability this narrow.
#[derive(Clone)]
pub enum HashFamily {
    Wta(WTA),
    Dwta(DWTA),
}

impl VecHash for HashFamily {
    fn hash(&self, x: &[f32]) -> Result<Vec<HashKey>> {
        match self {
            HashFamily::Wta(h) => h.hash(x),
            HashFamily::Dwta(h) => h.hash(x),
        }
    }
    fn k(&self) -> usize {
        match self {
            HashFamily::Wta(h) => h.k(),
            HashFamily::Dwta(h) => h.k(),
        }
    }
    fn l(&self) -> usize {
        match self {
            HashFamily::Wta(h) => h.l(),
            HashFamily::Dwta(h) => h.l(),
        }
    }
    fn dim(&self) -> usize {
        match self {
            HashFamily::Wta(h) => h.dim(),
            HashFamily::Dwta(h) => h.dim(),
        }
    }
}

/// Constructor parameters for a hash family, independent of `dim` (the
/// layer knows `dim`, the caller only picks the family and `(K, L)`).
#[derive(Clone, Copy)]
pub enum HashSpec {
    Wta { k: usize, l: usize },
    Dwta { k: usize, l: usize },
}

impl HashSpec {
    pub fn l(&self) -> usize {
        match self {
            HashSpec::Wta { l, .. } | HashSpec::Dwta { l, .. } => *l,
        }
    }

    pub(crate) fn build(&self, dim: usize, seed: u64) -> Result<HashFamily> {
        match *self {
            HashSpec::Wta { k, l } => Ok(HashFamily::Wta(WTA::new(k, l, dim, seed)?)),
            HashSpec::Dwta { k, l } => Ok(HashFamily::Dwta(DWTA::new(k, l, dim, seed)?)),
        }
    }
}
