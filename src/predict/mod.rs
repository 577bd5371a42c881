//! Inference over the unlabeled test split

pub mod submission;

pub use submission::{write_submission, write_submission_file};

use burn::data::dataloader::batcher::Batcher;
use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;

use crate::data::dataset::{ConversationBatcher, ConversationSample, EmoDataset};
use crate::data::vocab::Vocab;
use crate::model::EmoModel;
use crate::{EmoError, Result};

/// Batched inference preserving dataset order
pub struct Predictor<B: Backend> {
    model: EmoModel<B>,
    batcher: ConversationBatcher<B>,
    batch_size: usize,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    pub fn new(
        model: EmoModel<B>,
        batcher: ConversationBatcher<B>,
        batch_size: usize,
        device: B::Device,
    ) -> Self {
        Predictor {
            model,
            batcher,
            batch_size: batch_size.max(1),
            device,
        }
    }

    /// Per-class probabilities for every sample, in dataset order
    pub fn predict_probs(&self, dataset: &EmoDataset) -> Vec<Vec<f32>> {
        let mut rows = Vec::with_capacity(dataset.samples().len());

        for chunk in dataset.samples().chunks(self.batch_size) {
            let items: Vec<ConversationSample> = chunk.to_vec();
            let batch = self.batcher.batch(items, &self.device);
            let probs = softmax(self.model.forward(&batch), 1);

            let [batch_size, class_count] = probs.dims();
            let data = probs.to_data();
            let values: &[f32] = data.as_slice().unwrap();
            for row in 0..batch_size {
                rows.push(values[row * class_count..(row + 1) * class_count].to_vec());
            }
        }

        rows
    }

    /// Predicted class indices for every sample, in dataset order
    pub fn predict_indices(&self, dataset: &EmoDataset) -> Vec<usize> {
        self.predict_probs(dataset)
            .iter()
            .map(|row| {
                let mut best = 0;
                for (idx, value) in row.iter().enumerate() {
                    if *value > row[best] {
                        best = idx;
                    }
                }
                best
            })
            .collect()
    }

    /// Predicted label strings for every sample, in dataset order
    pub fn predict_labels(&self, dataset: &EmoDataset, label_vocab: &Vocab) -> Result<Vec<String>> {
        self.predict_indices(dataset)
            .into_iter()
            .map(|idx| {
                label_vocab
                    .token(idx)
                    .map(|s| s.to_string())
                    .ok_or_else(|| EmoError::UnknownLabel(format!("class index {}", idx)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::{test_data, test_net_config};
    use crate::ArchKind;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_probabilities_sum_to_one_per_row() {
        let data = test_data();
        let device = Default::default();
        let config = test_net_config(&data, false);
        let model =
            EmoModel::<TestBackend>::new(&device, ArchKind::Single, &config, None);
        let batcher = ConversationBatcher::<TestBackend>::new(
            Default::default(),
            ArchKind::Single,
            false,
            data.char_vocab.max_word_len,
        );

        let predictor = Predictor::new(model, batcher, 2, device);
        let probs = predictor.predict_probs(&data.val);

        assert_eq!(probs.len(), 3);
        for row in &probs {
            assert_eq!(row.len(), data.class_count());
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_chunked_prediction_preserves_order_and_count() {
        let data = test_data();
        let device = Default::default();
        let config = test_net_config(&data, false);
        let model =
            EmoModel::<TestBackend>::new(&device, ArchKind::Single, &config, None);
        let batcher = ConversationBatcher::<TestBackend>::new(
            Default::default(),
            ArchKind::Single,
            false,
            data.char_vocab.max_word_len,
        );

        // Batch size 1 vs one big batch must agree sample for sample
        let one_at_a_time =
            Predictor::new(model.clone(), batcher.clone(), 1, device).predict_indices(&data.val);
        let all_at_once = Predictor::new(model, batcher, 16, Default::default())
            .predict_indices(&data.val);

        assert_eq!(one_at_a_time, all_at_once);
        assert_eq!(one_at_a_time.len(), 3);
    }

    #[test]
    fn test_indices_pick_most_probable_class() {
        let data = test_data();
        let device = Default::default();
        let config = test_net_config(&data, false);
        let model =
            EmoModel::<TestBackend>::new(&device, ArchKind::Single, &config, None);
        let batcher = ConversationBatcher::<TestBackend>::new(
            Default::default(),
            ArchKind::Single,
            false,
            data.char_vocab.max_word_len,
        );

        let predictor = Predictor::new(model, batcher, 8, device);
        let probs = predictor.predict_probs(&data.val);
        let indices = predictor.predict_indices(&data.val);

        for (row, idx) in probs.iter().zip(indices.iter()) {
            let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            assert_eq!(row[*idx], max);
        }
    }

    #[test]
    fn test_labels_come_from_label_vocab() {
        let data = test_data();
        let device = Default::default();
        let config = test_net_config(&data, false);
        let model =
            EmoModel::<TestBackend>::new(&device, ArchKind::Single, &config, None);
        let batcher = ConversationBatcher::<TestBackend>::new(
            Default::default(),
            ArchKind::Single,
            false,
            data.char_vocab.max_word_len,
        );

        let predictor = Predictor::new(model, batcher, 8, device);
        let labels = predictor.predict_labels(&data.val, &data.label_vocab).unwrap();
        for label in &labels {
            assert!(data.label_vocab.lookup(label).is_some());
        }
    }
}
