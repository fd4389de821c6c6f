//! Softmax cross-entropy. Purely a caller-side helper; the core
//! network imposes no loss contract beyond shape equality.
use crate::error::{Error, Result};
use ndarray::{Array2, Axis};

pub struct SoftmaxCrossEntropy;

impl SoftmaxCrossEntropy {
    pub fn new() -> Self {
        SoftmaxCrossEntropy
    }

    fn softmax_row(row: &[f32]) -> Vec<f32> {
        let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = row.iter().map(|&v| (v - max).exp()).collect();
        let sum: f32 = exps.iter().sum();
        exps.into_iter().map(|e| e / sum).collect()
    }

    /// Mean cross-entropy loss over the batch, `y_true` one-hot (or any
    /// nonnegative distribution summing to 1 per row) and `y_pred` the
    /// network's raw (pre-softmax) output.
    pub fn loss(&self, y_true: &Array2<f32>, y_pred: &Array2<f32>) -> Result<f32> {
        check_shapes(y_true, y_pred)?;
        let mut total = 0.0;
        for (true_row, pred_row) in y_true.axis_iter(Axis(0)).zip(y_pred.axis_iter(Axis(0))) {
            let probs = Self::softmax_row(pred_row.as_slice().unwrap());
            for (&t, p) in true_row.iter().zip(probs) {
                if t != 0.0 {
                    total -= t * p.max(1e-12).ln();
                }
            }
        }
        Ok(total / y_true.nrows() as f32)
    }

    /// `d loss / d y_pred`, the gradient fed to `Network::backward`.
    /// For softmax-cross-entropy this is simply `softmax(y_pred) -
    /// y_true`.
    pub fn gradient(&self, y_true: &Array2<f32>, y_pred: &Array2<f32>) -> Result<Array2<f32>> {
        check_shapes(y_true, y_pred)?;
        let mut grad = Array2::zeros(y_pred.raw_dim());
        for ((mut grad_row, true_row), pred_row) in grad
            .axis_iter_mut(Axis(0))
            .zip(y_true.axis_iter(Axis(0)))
            .zip(y_pred.axis_iter(Axis(0)))
        {
            let probs = Self::softmax_row(pred_row.as_slice().unwrap());
            for ((g, &t), p) in grad_row.iter_mut().zip(true_row.iter()).zip(probs) {
                *g = p - t;
            }
        }
        Ok(grad)
    }
}

impl Default for SoftmaxCrossEntropy {
    fn default() -> Self {
        Self::new()
    }
}

fn check_shapes(y_true: &Array2<f32>, y_pred: &Array2<f32>) -> Result<()> {
    if y_true.dim() != y_pred.dim() {
        return Err(Error::ShapeMismatch {
            expected: y_true.dim(),
            got: y_pred.dim(),
        });
    }
    Ok(())
}
