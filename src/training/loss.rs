//! Classification losses
//!
//! Cross-entropy and focal loss as the primary criterion, plus the
//! mean-false-error family as an optional auxiliary term for class
//! imbalance.

use burn::tensor::activation::{log_softmax, softmax};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use crate::{LossConfig, LossKind, MfeKind};

/// Copy label indices to the host
pub fn target_indices<B: Backend>(targets: &Tensor<B, 1, Int>) -> Vec<usize> {
    let data = targets.clone().float().to_data();
    let slice: &[f32] = data.as_slice().unwrap();
    slice.iter().map(|v| *v as usize).collect()
}

/// Primary classification loss, selected once from config
pub struct LossFn {
    kind: LossKind,
    gamma: f32,
    /// Per-class weights; built from `fl_alpha` concentrated on the
    /// majority class
    alpha: Option<Vec<f32>>,
}

impl LossFn {
    pub fn from_config(config: &LossConfig, class_count: usize, others_idx: Option<usize>) -> Self {
        let alpha = match (config.fl_alpha, others_idx) {
            (Some(alpha), Some(others)) if class_count > 1 => {
                let rest = (1.0 - alpha) / (class_count - 1) as f32;
                let mut weights = vec![rest; class_count];
                weights[others] = alpha;
                Some(weights)
            }
            _ => None,
        };

        LossFn {
            kind: config.kind,
            gamma: config.fl_gamma,
            alpha,
        }
    }

    /// Mean loss over the batch as a scalar tensor
    pub fn forward<B: Backend>(
        &self,
        logits: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> Tensor<B, 1> {
        match self.kind {
            LossKind::CrossEntropy => self.cross_entropy(logits, targets),
            LossKind::Focal => self.focal(logits, targets),
        }
    }

    fn cross_entropy<B: Backend>(
        &self,
        logits: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> Tensor<B, 1> {
        let [batch_size, _] = logits.dims();
        let log_probs = log_softmax(logits, 1);
        let picked = log_probs
            .gather(1, targets.clone().unsqueeze_dim(1))
            .reshape([batch_size]);
        let nll = picked.neg();

        match self.target_weights(&targets, &nll.device()) {
            Some(weights) => {
                let weighted = nll * weights.clone();
                weighted.sum() / weights.sum()
            }
            None => nll.mean(),
        }
    }

    fn focal<B: Backend>(&self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        let [batch_size, _] = logits.dims();
        let probs = softmax(logits, 1);
        let p_t = probs
            .gather(1, targets.clone().unsqueeze_dim(1))
            .reshape([batch_size])
            .clamp(1e-7, 1.0);

        let focus = (p_t.clone().neg() + 1.0).powf_scalar(self.gamma);
        let loss = focus * p_t.log().neg();

        match self.target_weights(&targets, &loss.device()) {
            Some(weights) => (loss * weights).mean(),
            None => loss.mean(),
        }
    }

    /// Per-sample alpha weights as a constant tensor
    fn target_weights<B: Backend>(
        &self,
        targets: &Tensor<B, 1, Int>,
        device: &B::Device,
    ) -> Option<Tensor<B, 1>> {
        self.alpha.as_ref().map(|alpha| {
            let values: Vec<f32> = target_indices(targets)
                .into_iter()
                .map(|idx| alpha.get(idx).copied().unwrap_or(1.0))
                .collect();
            Tensor::<B, 1>::from_floats(values.as_slice(), device)
        })
    }
}

/// Mean-false-error auxiliary loss
///
/// Per-class mean squared error between one-hot targets and softmax
/// probabilities, summed over classes. The MSFE variant squares each
/// per-class term; the majority class term can be down-weighted.
pub struct MfeLoss {
    kind: MfeKind,
    class_count: usize,
    others_idx: Option<usize>,
    others_weight: f32,
}

impl MfeLoss {
    pub fn from_config(
        config: &LossConfig,
        class_count: usize,
        others_idx: Option<usize>,
    ) -> Option<Self> {
        match config.mfe {
            MfeKind::None => None,
            kind => Some(MfeLoss {
                kind,
                class_count,
                others_idx,
                others_weight: config.mfe_others_weight,
            }),
        }
    }

    pub fn forward<B: Backend>(
        &self,
        logits: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> Tensor<B, 1> {
        let [batch_size, _] = logits.dims();
        let device = logits.device();
        let probs = softmax(logits, 1);
        let ids = target_indices(&targets);

        let mut onehot = vec![0.0f32; batch_size * self.class_count];
        for (row, id) in ids.iter().enumerate() {
            onehot[row * self.class_count + id] = 1.0;
        }
        let onehot = Tensor::<B, 1>::from_floats(onehot.as_slice(), &device)
            .reshape([batch_size, self.class_count]);

        // Per-sample squared error against the one-hot target
        let sq_err = (onehot - probs)
            .powf_scalar(2.0)
            .sum_dim(1)
            .reshape([batch_size]);

        let mut total: Option<Tensor<B, 1>> = None;
        for class in 0..self.class_count {
            let count = ids.iter().filter(|id| **id == class).count();
            if count == 0 {
                continue;
            }
            let mask: Vec<f32> = ids
                .iter()
                .map(|id| if *id == class { 1.0 } else { 0.0 })
                .collect();
            let mask = Tensor::<B, 1>::from_floats(mask.as_slice(), &device);

            let class_err = (sq_err.clone() * mask).sum() / count as f32;
            let class_err = match self.kind {
                MfeKind::Msfe => class_err.powf_scalar(2.0),
                _ => class_err,
            };
            let weight = if Some(class) == self.others_idx {
                self.others_weight
            } else {
                1.0
            };
            let term = class_err * weight;

            total = Some(match total {
                Some(acc) => acc + term,
                None => term,
            });
        }

        total.unwrap_or_else(|| Tensor::zeros([1], &device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LossConfig;
    use burn::backend::NdArray;
    use burn::tensor::ElementConversion;

    type TestBackend = NdArray<f32>;

    fn loss_config(kind: LossKind, fl_alpha: Option<f32>, mfe: MfeKind) -> LossConfig {
        LossConfig {
            kind,
            fl_gamma: 2.0,
            fl_alpha,
            mfe,
            mfe_others_weight: 1.0,
            others_label: "others".to_string(),
        }
    }

    fn scalar(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_scalar().elem()
    }

    fn logits_and_targets() -> (Tensor<TestBackend, 2>, Tensor<TestBackend, 1, burn::tensor::Int>) {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 1>::from_floats(
            [2.0, 0.1, 0.1, 0.2, 3.0, 0.3].as_slice(),
            &device,
        )
        .reshape([2, 3]);
        let targets =
            Tensor::<TestBackend, 1, burn::tensor::Int>::from_ints([0, 1].as_slice(), &device);
        (logits, targets)
    }

    #[test]
    fn test_cross_entropy_matches_manual() {
        let (logits, targets) = logits_and_targets();
        let loss_fn = LossFn::from_config(&loss_config(LossKind::CrossEntropy, None, MfeKind::None), 3, None);
        let loss = scalar(loss_fn.forward(logits.clone(), targets));

        // Manual: mean of -log_softmax at the target index
        let data = logits.to_data();
        let rows: &[f32] = data.as_slice().unwrap();
        let mut expected = 0.0f32;
        for (row, target) in [(0usize, 0usize), (1, 1)] {
            let r = &rows[row * 3..row * 3 + 3];
            let max = r.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            let logsum = r.iter().map(|v| (v - max).exp()).sum::<f32>().ln() + max;
            expected += logsum - r[target];
        }
        expected /= 2.0;

        assert!((loss - expected).abs() < 1e-5, "{} vs {}", loss, expected);
    }

    #[test]
    fn test_focal_with_zero_gamma_equals_cross_entropy() {
        let (logits, targets) = logits_and_targets();
        let mut config = loss_config(LossKind::Focal, None, MfeKind::None);
        config.fl_gamma = 0.0;

        let focal = LossFn::from_config(&config, 3, None);
        let ce = LossFn::from_config(&loss_config(LossKind::CrossEntropy, None, MfeKind::None), 3, None);

        let f = scalar(focal.forward(logits.clone(), targets.clone()));
        let c = scalar(ce.forward(logits, targets));
        assert!((f - c).abs() < 1e-5, "{} vs {}", f, c);
    }

    #[test]
    fn test_focal_downweights_easy_examples() {
        let (logits, targets) = logits_and_targets();
        let focal = LossFn::from_config(&loss_config(LossKind::Focal, None, MfeKind::None), 3, None);
        let ce = LossFn::from_config(&loss_config(LossKind::CrossEntropy, None, MfeKind::None), 3, None);

        let f = scalar(focal.forward(logits.clone(), targets.clone()));
        let c = scalar(ce.forward(logits, targets));
        // Both rows are confidently correct, so the focal factor shrinks them
        assert!(f < c);
        assert!(f > 0.0);
    }

    #[test]
    fn test_alpha_weights_concentrate_on_others() {
        let config = loss_config(LossKind::Focal, Some(0.25), MfeKind::None);
        let loss_fn = LossFn::from_config(&config, 4, Some(0));
        let alpha = loss_fn.alpha.as_ref().unwrap();
        assert!((alpha[0] - 0.25).abs() < 1e-6);
        assert!((alpha[1] - 0.25).abs() < 1e-6);
        assert_eq!(alpha.len(), 4);
    }

    #[test]
    fn test_mfe_positive_and_small_for_confident_correct() {
        let (logits, targets) = logits_and_targets();
        let mfe = MfeLoss::from_config(&loss_config(LossKind::CrossEntropy, None, MfeKind::Mfe), 3, Some(0))
            .unwrap();
        let value = scalar(mfe.forward(logits.clone(), targets.clone()));
        assert!(value > 0.0);

        // Wrong predictions raise the error
        let wrong_targets =
            Tensor::<TestBackend, 1, burn::tensor::Int>::from_ints([2, 2].as_slice(), &Default::default());
        let wrong = scalar(mfe.forward(logits, wrong_targets));
        assert!(wrong > value);
    }

    #[test]
    fn test_msfe_squares_class_terms() {
        let (logits, targets) = logits_and_targets();
        let mfe = MfeLoss::from_config(&loss_config(LossKind::CrossEntropy, None, MfeKind::Mfe), 3, None)
            .unwrap();
        let msfe = MfeLoss::from_config(&loss_config(LossKind::CrossEntropy, None, MfeKind::Msfe), 3, None)
            .unwrap();

        let m = scalar(mfe.forward(logits.clone(), targets.clone()));
        let ms = scalar(msfe.forward(logits, targets));
        // Per-class errors here are well below 1, so squaring shrinks them
        assert!(ms < m);
    }
}
