//! Activation functions: value and derivative for each variant used by
//! a sparse layer's forward/backward pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    Linear,
    ReLU,
    Sigmoid,
}

impl Activation {
    pub fn f(&self, z: f32) -> f32 {
        use Activation::*;
        match self {
            Linear => z,
            ReLU => z.max(0.0),
            // 1/(1+exp(-z)) naively overflows exp() for very negative z;
            // the mirrored form keeps exp()'s argument <= 0 either way.
            Sigmoid => {
                if z >= 0.0 {
                    1.0 / (1.0 + (-z).exp())
                } else {
                    let e = z.exp();
                    e / (1.0 + e)
                }
            }
        }
    }

    pub fn f_prime(&self, z: f32) -> f32 {
        use Activation::*;
        match self {
            Linear => 1.0,
            ReLU => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Sigmoid => {
                let a = self.f(z);
                a * (1.0 - a)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_linear() {
        let a = Activation::Linear;
        assert_eq!(a.f(0.0), 0.0);
        assert_eq!(a.f(1.0), 1.0);
        assert_eq!(a.f(-1.0), -1.0);
        assert_eq!(a.f_prime(42.0), 1.0);
    }

    #[test]
    fn test_relu() {
        let a = Activation::ReLU;
        assert_eq!(a.f(0.0), 0.0);
        assert_eq!(a.f(1.0), 1.0);
        assert_eq!(a.f(-1.0), 0.0);
        assert_eq!(a.f_prime(1.0), 1.0);
        assert_eq!(a.f_prime(-1.0), 0.0);
    }

    #[test]
    fn test_sigmoid() {
        let a = Activation::Sigmoid;
        assert_eq!(a.f(0.0), 0.5);
        assert!(a.f(100.0) <= 1.0);
        assert!(a.f(-100.0) >= 0.0);
        assert!(a.f(-1000.0).is_finite());
        assert!(a.f(1000.0).is_finite());
    }

    #[test]
    fn test_sigmoid_prime_matches_closed_form() {
        let a = Activation::Sigmoid;
        let z = 0.3;
        let s = a.f(z);
        assert!((a.f_prime(z) - s * (1.0 - s)).abs() < 1e-6);
    }
}
