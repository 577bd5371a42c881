//! Validation pass over a labeled split

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};

use crate::data::dataset::ConversationBatch;
use crate::model::EmoModel;
use crate::training::loss::{target_indices, LossFn};
use crate::training::metrics::ConfusionCounts;

/// Metrics from one full pass over a labeled split
#[derive(Debug, Clone, Copy)]
pub struct Evaluation {
    /// Mean of per-batch mean losses
    pub loss: f32,
    pub accuracy: f64,
    /// Micro F1 excluding the majority class
    pub f1: f64,
}

/// Row-wise argmax computed on the host
pub fn argmax_rows<B: Backend>(logits: &Tensor<B, 2>) -> Vec<usize> {
    let [rows, cols] = logits.dims();
    let data = logits.clone().to_data();
    let values: &[f32] = data.as_slice().unwrap();

    (0..rows)
        .map(|row| {
            let slice = &values[row * cols..(row + 1) * cols];
            let mut best = 0;
            for (idx, value) in slice.iter().enumerate() {
                if *value > slice[best] {
                    best = idx;
                }
            }
            best
        })
        .collect()
}

/// Run the model over every batch of a labeled split.
///
/// Batches without labels are a programming error on the caller's side and
/// are skipped.
pub fn evaluate<B: Backend>(
    model: &EmoModel<B>,
    batches: impl Iterator<Item = ConversationBatch<B>>,
    loss_fn: &LossFn,
    class_count: usize,
    others_idx: Option<usize>,
) -> Evaluation {
    let mut counts = ConfusionCounts::new(class_count);
    let mut loss_sum = 0.0f64;
    let mut batch_count = 0usize;
    let mut correct = 0usize;
    let mut total = 0usize;

    for batch in batches {
        let Some(targets) = batch.labels.clone() else {
            continue;
        };

        let logits = model.forward(&batch);
        let loss: f32 = loss_fn
            .forward(logits.clone(), targets.clone())
            .into_scalar()
            .elem();
        loss_sum += loss as f64;
        batch_count += 1;

        let predicted = argmax_rows(&logits);
        let actual = target_indices(&targets);
        for (pred, target) in predicted.iter().zip(actual.iter()) {
            counts.record(*pred, *target);
            if pred == target {
                correct += 1;
            }
            total += 1;
        }
    }

    Evaluation {
        loss: if batch_count == 0 {
            0.0
        } else {
            (loss_sum / batch_count as f64) as f32
        },
        accuracy: if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64
        },
        f1: counts.micro_f1(others_idx),
    }
}
