//! Ensemble variant
//!
//! Two independently initialized encoder/head pairs over the full
//! conversation sequence; their logits are averaged.

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::data::dataset::ConversationBatch;
use crate::model::encoder::{ClassifierHead, SentenceEncoder};
use crate::model::NetConfig;

#[derive(Module, Debug)]
pub struct EmoNetEnsemble<B: Backend> {
    encoder_a: SentenceEncoder<B>,
    encoder_b: SentenceEncoder<B>,
    head_a: ClassifierHead<B>,
    head_b: ClassifierHead<B>,
}

impl<B: Backend> EmoNetEnsemble<B> {
    pub fn new(device: &B::Device, config: &NetConfig, pretrained: Option<&[Vec<f32>]>) -> Self {
        EmoNetEnsemble {
            encoder_a: SentenceEncoder::new(device, config, pretrained),
            encoder_b: SentenceEncoder::new(device, config, pretrained),
            head_a: ClassifierHead::new(
                device,
                config.d_model,
                config.d_model,
                config.class_count,
                config.dropout,
            ),
            head_b: ClassifierHead::new(
                device,
                config.d_model,
                config.d_model,
                config.class_count,
                config.dropout,
            ),
        }
    }

    pub fn forward(&self, batch: &ConversationBatch<B>) -> Tensor<B, 2> {
        let text = batch
            .text
            .as_ref()
            .expect("ensemble variant requires full-text tensors");

        let logits_a = self.head_a.forward(self.encoder_a.forward(text));
        let logits_b = self.head_b.forward(self.encoder_b.forward(text));

        (logits_a + logits_b) / 2.0
    }
}
