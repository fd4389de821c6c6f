//! Rebuild scheduler. A stateful counter the network consults after
//! every batch update to decide whether to re-hash.
use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub enum Scheduler {
    ConstantFrequency {
        n: u64,
        step: u64,
    },
    ExponentialDecay {
        next_at: u64,
        /// Gap that produced `next_at`; multiplied by `exp(lambda)` once
        /// `next_at` fires, to produce the gap for the firing after
        /// that (i.e. the multiplier lags one firing behind, so the
        /// first two firings are `n0` apart, so `ExponentialDecay(50,
        /// ln 2)` fires at 50, 100, 200, 400, ...).
        interval: f64,
        lambda: f64,
        step: u64,
    },
}

impl Scheduler {
    pub fn constant_frequency(n: u64) -> Result<Self> {
        if n == 0 {
            return Err(Error::InvalidArgument("ConstantFrequency period must be > 0".into()));
        }
        Ok(Scheduler::ConstantFrequency { n, step: 0 })
    }

    pub fn exponential_decay(n0: u64, lambda: f64) -> Result<Self> {
        if n0 == 0 {
            return Err(Error::InvalidArgument("ExponentialDecay n0 must be > 0".into()));
        }
        if !lambda.is_finite() {
            return Err(Error::TypeMismatch("ExponentialDecay lambda must be finite".into()));
        }
        Ok(Scheduler::ExponentialDecay {
            next_at: n0,
            interval: n0 as f64,
            lambda,
            step: 0,
        })
    }

    /// Advance one step; returns `true` exactly on the steps the
    /// scheduler signals a rebuild.
    pub fn tick(&mut self) -> bool {
        match self {
            Scheduler::ConstantFrequency { n, step } => {
                *step += 1;
                *step % *n == 0
            }
            Scheduler::ExponentialDecay {
                next_at,
                interval,
                lambda,
                step,
            } => {
                *step += 1;
                if *step == *next_at {
                    let gap = interval.max(1.0) as u64;
                    *next_at += gap;
                    *interval = (*interval * lambda.exp()).ceil();
                    true
                } else {
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn hits(mut s: Scheduler, up_to: u64) -> Vec<u64> {
        (1u64..=up_to).filter_map(|i| if s.tick() { Some(i) } else { None }).collect()
    }

    #[test]
    fn test_constant_frequency_fires_on_multiples() {
        let s = Scheduler::constant_frequency(50).unwrap();
        assert_eq!(hits(s, 150), vec![50, 100, 150]);
    }

    #[test]
    fn test_exponential_decay_schedule_matches_worked_example() {
        let s = Scheduler::exponential_decay(50, std::f64::consts::LN_2).unwrap();
        assert_eq!(hits(s, 450), vec![50, 100, 200, 400]);
    }

    #[test]
    fn test_exponential_decay_negative_lambda_speeds_up() {
        let s = Scheduler::exponential_decay(100, -std::f64::consts::LN_2).unwrap();
        let hits = hits(s, 310);
        assert_eq!(&hits[..2], &[100, 200]);
        // gaps should shrink monotonically once past the first plateau.
        let gaps: Vec<i64> = hits.windows(2).map(|w| (w[1] - w[0]) as i64).collect();
        for w in gaps.windows(2).skip(1) {
            assert!(w[1] <= w[0]);
        }
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(Scheduler::constant_frequency(0).is_err());
        assert!(Scheduler::exponential_decay(0, 1.0).is_err());
    }
}
