//! Single-sequence variant
//!
//! Encodes the whole conversation as one token sequence.

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::data::dataset::ConversationBatch;
use crate::model::encoder::{ClassifierHead, SentenceEncoder};
use crate::model::NetConfig;

#[derive(Module, Debug)]
pub struct EmoNetSingle<B: Backend> {
    encoder: SentenceEncoder<B>,
    head: ClassifierHead<B>,
}

impl<B: Backend> EmoNetSingle<B> {
    pub fn new(device: &B::Device, config: &NetConfig, pretrained: Option<&[Vec<f32>]>) -> Self {
        EmoNetSingle {
            encoder: SentenceEncoder::new(device, config, pretrained),
            head: ClassifierHead::new(
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
            .expect("single variant requires full-text tensors");
        let repr = self.encoder.forward(text);
        self.head.forward(repr)
    }
}
