//! Fusion variant
//!
//! Encodes the conversation context (turns 1-2) and the final turn with a
//! shared encoder, then fuses the two representations with difference and
//! product interaction features before classification.

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::data::dataset::ConversationBatch;
use crate::model::encoder::{ClassifierHead, SentenceEncoder};
use crate::model::NetConfig;

#[derive(Module, Debug)]
pub struct EmoNetFusion<B: Backend> {
    encoder: SentenceEncoder<B>,
    head: ClassifierHead<B>,
}

impl<B: Backend> EmoNetFusion<B> {
    pub fn new(device: &B::Device, config: &NetConfig, pretrained: Option<&[Vec<f32>]>) -> Self {
        EmoNetFusion {
            encoder: SentenceEncoder::new(device, config, pretrained),
            // [context, sent, |context - sent|, context * sent]
            head: ClassifierHead::new(
                device,
                config.d_model * 4,
                config.d_model,
                config.class_count,
                config.dropout,
            ),
        }
    }

    pub fn forward(&self, batch: &ConversationBatch<B>) -> Tensor<B, 2> {
        let context = batch
            .context
            .as_ref()
            .expect("fusion variant requires context tensors");
        let sent = batch
            .sent
            .as_ref()
            .expect("fusion variant requires final-turn tensors");

        let c = self.encoder.forward(context);
        let s = self.encoder.forward(sent);

        let diff = (c.clone() - s.clone()).abs();
        let prod = c.clone() * s.clone();
        let fused = Tensor::cat(vec![c, s, diff, prod], 1);

        self.head.forward(fused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::ConversationBatcher;
    use crate::model::test_support::{test_data, test_net_config};
    use crate::ArchKind;
    use burn::backend::NdArray;
    use burn::data::dataloader::batcher::Batcher;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_fusion_forward_with_chars() {
        let data = test_data();
        let device = Default::default();
        let config = test_net_config(&data, true);
        let model = EmoNetFusion::<TestBackend>::new(&device, &config, None);

        let batcher = ConversationBatcher::<TestBackend>::new(
            Default::default(),
            ArchKind::Fusion,
            true,
            data.char_vocab.max_word_len,
        );
        let batch = batcher.batch(data.train.samples().to_vec(), &device);
        let logits = model.forward(&batch);

        assert_eq!(logits.dims(), [3, data.class_count()]);
    }
}
