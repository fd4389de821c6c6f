//! Weight initializers.
use crate::error::{Error, Result};
use crate::utils::create_rng;
use ndarray::Array1;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::Rng;

/// A source of initial scalar weights. Each variant exposes a single
/// nullary `sample` operation; determinism comes from the seed handed
/// to the owning layer.
#[derive(Clone)]
pub enum Initializer {
    Constant(f32),
    Gauss { mu: f32, sigma: f32 },
}

impl Initializer {
    pub fn constant(c: f32) -> Result<Self> {
        if !c.is_finite() {
            return Err(Error::TypeMismatch("constant initializer value must be finite".into()));
        }
        Ok(Initializer::Constant(c))
    }

    pub fn gauss(mu: f32, sigma: f32) -> Result<Self> {
        if !mu.is_finite() || !sigma.is_finite() {
            return Err(Error::TypeMismatch("gauss initializer parameters must be finite".into()));
        }
        if sigma < 0.0 {
            return Err(Error::InvalidArgument("gauss initializer sigma must be >= 0".into()));
        }
        Ok(Initializer::Gauss { mu, sigma })
    }

    /// Fill `out` with `out.len()` independent samples, seeded by `rng`.
    pub(crate) fn fill<R: Rng>(&self, rng: &mut R, out: &mut [f32]) {
        match self {
            Initializer::Constant(c) => out.iter_mut().for_each(|v| *v = *c),
            Initializer::Gauss { mu, sigma } => {
                let sigma = sigma.max(f32::EPSILON);
                let samples = Array1::<f32>::random_using(out.len(), StandardNormal, rng);
                for (v, s) in out.iter_mut().zip(samples.iter()) {
                    *v = mu + sigma * s;
                }
            }
        }
    }

    pub(crate) fn sample_one<R: Rng>(&self, rng: &mut R) -> f32 {
        let mut v = [0.0_f32];
        self.fill(rng, &mut v);
        v[0]
    }

    /// Build a fresh, seeded RNG for a caller who only wants the
    /// nullary `sample` operation, without owning an RNG of their own.
    pub fn sample(&self, seed: u64) -> f32 {
        let mut rng = create_rng(seed);
        self.sample_one(&mut rng)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_constant_initializer() {
        let init = Initializer::constant(5.0).unwrap();
        let mut rng = create_rng(1);
        assert_eq!(init.sample_one(&mut rng), 5.0);
    }

    #[test]
    fn test_gauss_initializer_runs() {
        let init = Initializer::gauss(0.0, 1.0).unwrap();
        let mut rng = create_rng(1);
        let mut buf = [0.0_f32; 100];
        init.fill(&mut rng, &mut buf);
        let mean: f32 = buf.iter().sum::<f32>() / buf.len() as f32;
        assert!(mean.abs() < 1.0);
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(Initializer::constant(f32::NAN).is_err());
        assert!(Initializer::gauss(f32::NAN, 1.0).is_err());
        assert!(Initializer::gauss(0.0, -1.0).is_err());
    }
}
