//! Loss selection.
//!
//! Two-way, hard-coded policy keyed on the class count: a two-unit head
//! trains with binary cross-entropy, anything wider with sparse categorical
//! cross-entropy. Class counts below two never reach this module; they are
//! widened to the fallback head size first.

use burn::nn::loss::CrossEntropyLossConfig;
use burn::tensor::activation::log_sigmoid;
use burn::tensor::{backend::Backend, Int, Tensor};

/// Which loss the fit loop computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossKind {
    /// Binary cross-entropy on the positive-minus-negative logit.
    Binary,
    /// Sparse categorical cross-entropy over all classes.
    Multiclass,
}

impl LossKind {
    pub fn for_classes(num_classes: usize) -> Self {
        if num_classes == 2 {
            Self::Binary
        } else {
            Self::Multiclass
        }
    }

    /// Scalar loss for logits `[batch, classes]` and integer targets `[batch]`.
    pub fn forward<B: Backend>(
        &self,
        logits: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> Tensor<B, 1> {
        match self {
            LossKind::Multiclass => CrossEntropyLossConfig::new()
                .init(&logits.device())
                .forward(logits, targets),
            LossKind::Binary => binary_cross_entropy(logits, targets),
        }
    }
}

/// Binary cross-entropy with logits over a two-unit head.
///
/// sigmoid(z1 - z0) equals the two-class softmax probability of class 1, so
/// the head reduces to a single-logit sigmoid problem:
/// `loss = -mean(t * log_sigmoid(z) + (1 - t) * log_sigmoid(-z))`.
fn binary_cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
) -> Tensor<B, 1> {
    let [batch_size, _] = logits.dims();
    let positive = logits.clone().slice([0..batch_size, 1..2]).squeeze::<1>(1);
    let negative = logits.slice([0..batch_size, 0..1]).squeeze::<1>(1);
    let margin = positive - negative;

    let targets = targets.float();
    let ones = targets.ones_like();
    let loss = targets.clone() * log_sigmoid(margin.clone())
        + (ones - targets) * log_sigmoid(margin.neg());
    loss.mean().neg()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::ElementConversion;

    type TestBackend = NdArray;

    #[test]
    fn test_selection_by_class_count() {
        assert_eq!(LossKind::for_classes(2), LossKind::Binary);
        assert_eq!(LossKind::for_classes(3), LossKind::Multiclass);
        assert_eq!(LossKind::for_classes(10), LossKind::Multiclass);
    }

    fn scalar_loss(kind: LossKind, logits: [[f32; 2]; 2], targets: [i32; 2]) -> f64 {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats(logits, &device);
        let targets = Tensor::<TestBackend, 1, Int>::from_ints(targets, &device);
        kind.forward(logits, targets).into_scalar().elem()
    }

    #[test]
    fn test_binary_loss_rewards_correct_margin() {
        let confident_right = scalar_loss(LossKind::Binary, [[8.0, -8.0], [-8.0, 8.0]], [0, 1]);
        assert!(confident_right < 0.01, "got {confident_right}");

        let confident_wrong = scalar_loss(LossKind::Binary, [[-8.0, 8.0], [8.0, -8.0]], [0, 1]);
        assert!(confident_wrong > 1.0, "got {confident_wrong}");
    }

    #[test]
    fn test_binary_matches_two_class_cross_entropy() {
        // With two columns the sigmoid form and softmax cross-entropy agree.
        let logits = [[1.5, -0.5], [-2.0, 1.0]];
        let targets = [0, 1];
        let binary = scalar_loss(LossKind::Binary, logits, targets);
        let multi = scalar_loss(LossKind::Multiclass, logits, targets);
        assert!((binary - multi).abs() < 1e-4, "binary {binary} vs ce {multi}");
    }
}
