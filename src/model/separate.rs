//! Separate-turns variant
//!
//! Encodes each of the three turns with a shared encoder and classifies
//! over the concatenated representations.

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::data::dataset::ConversationBatch;
use crate::model::encoder::{ClassifierHead, SentenceEncoder};
use crate::model::NetConfig;

#[derive(Module, Debug)]
pub struct EmoNetSeparate<B: Backend> {
    encoder: SentenceEncoder<B>,
    head: ClassifierHead<B>,
}

impl<B: Backend> EmoNetSeparate<B> {
    pub fn new(device: &B::Device, config: &NetConfig, pretrained: Option<&[Vec<f32>]>) -> Self {
        EmoNetSeparate {
            encoder: SentenceEncoder::new(device, config, pretrained),
            head: ClassifierHead::new(
                device,
                config.d_model * 3,
                config.d_model,
                config.class_count,
                config.dropout,
            ),
        }
    }

    pub fn forward(&self, batch: &ConversationBatch<B>) -> Tensor<B, 2> {
        let turns = batch
            .turns
            .as_ref()
            .expect("separate variant requires per-turn tensors");

        let reprs: Vec<Tensor<B, 2>> = turns.iter().map(|t| self.encoder.forward(t)).collect();
        let combined = Tensor::cat(reprs, 1);

        self.head.forward(combined)
    }
}
