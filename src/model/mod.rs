//! Neural network architectures
//!
//! Four variants sharing one forward contract (batch → per-class logits):
//! - Single: the whole conversation as one token sequence
//! - Fusion: context and final turn encoded separately, then fused
//! - Ensemble: two independent encoders, logits averaged
//! - Separate: each turn encoded on its own, representations concatenated

pub mod encoder;
pub mod ensemble;
pub mod fusion;
pub mod separate;
pub mod single;

pub use encoder::{ClassifierHead, SentenceEncoder};
pub use ensemble::EmoNetEnsemble;
pub use fusion::EmoNetFusion;
pub use separate::EmoNetSeparate;
pub use single::EmoNetSingle;

use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::data::dataset::{ConversationBatch, EmoData};
use crate::{ArchKind, Config, EmoError};

/// Network dimensions derived from config and dataset
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub vocab_size: usize,
    pub char_vocab_size: usize,
    pub class_count: usize,
    pub embed_dim: usize,
    pub char_dim: usize,
    pub d_model: usize,
    pub dropout: f64,
    pub char_emb: bool,
}

impl NetConfig {
    pub fn from_run(config: &Config, data: &EmoData) -> Self {
        NetConfig {
            vocab_size: data.vocab_size(),
            char_vocab_size: data.char_vocab.len(),
            class_count: data.class_count(),
            embed_dim: config.model.embed_dim,
            char_dim: config.model.char_dim,
            d_model: config.model.d_model,
            dropout: config.model.dropout,
            char_emb: config.model.char_emb,
        }
    }
}

/// The emotion classifier, one of four architecture variants.
///
/// The variant is selected once at construction time; all variants map a
/// `ConversationBatch` to per-class logits.
#[derive(Module, Debug)]
pub enum EmoModel<B: Backend> {
    Single(EmoNetSingle<B>),
    Fusion(EmoNetFusion<B>),
    Ensemble(EmoNetEnsemble<B>),
    Separate(EmoNetSeparate<B>),
}

impl<B: Backend> EmoModel<B> {
    /// Build the variant selected by `arch`, optionally initializing word
    /// embeddings from a pre-aligned matrix.
    pub fn new(
        device: &B::Device,
        arch: ArchKind,
        config: &NetConfig,
        pretrained: Option<&[Vec<f32>]>,
    ) -> Self {
        match arch {
            ArchKind::Single => EmoModel::Single(EmoNetSingle::new(device, config, pretrained)),
            ArchKind::Fusion => EmoModel::Fusion(EmoNetFusion::new(device, config, pretrained)),
            ArchKind::Ensemble => {
                EmoModel::Ensemble(EmoNetEnsemble::new(device, config, pretrained))
            }
            ArchKind::Separate => {
                EmoModel::Separate(EmoNetSeparate::new(device, config, pretrained))
            }
        }
    }

    /// Forward pass: batch → per-class logits [batch, class_count]
    pub fn forward(&self, batch: &ConversationBatch<B>) -> Tensor<B, 2> {
        match self {
            EmoModel::Single(net) => net.forward(batch),
            EmoModel::Fusion(net) => net.forward(batch),
            EmoModel::Ensemble(net) => net.forward(batch),
            EmoModel::Separate(net) => net.forward(batch),
        }
    }

    /// Save model parameters to file
    pub fn save(&self, path: &str) -> crate::Result<()>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(self.clone().into_record(), path.into())
            .map_err(|e| EmoError::Io(std::io::Error::other(e.to_string())))
    }

    /// Load model parameters from file into a freshly built variant
    pub fn load(
        device: &B::Device,
        path: &str,
        arch: ArchKind,
        config: &NetConfig,
    ) -> crate::Result<Self>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let record = recorder
            .load(path.into(), device)
            .map_err(|e| EmoError::Io(std::io::Error::other(e.to_string())))?;

        let model = Self::new(device, arch, config, None);
        Ok(model.load_record(record))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::data::dataset::read_records;
    use std::io::Cursor;

    pub const TSV: &str = "id\tturn1\tturn2\tturn3\tlabel\n\
        0\thello there friend\thi\thow are you\tothers\n\
        1\tgo away now\tno\tleave me alone\tangry\n\
        2\tgood news\treally\ti am so glad\thappy\n";

    pub fn test_data() -> EmoData {
        let records = read_records(Cursor::new(TSV), true).unwrap();
        EmoData::from_records(records.clone(), records, 1).unwrap()
    }

    pub fn test_net_config(data: &EmoData, char_emb: bool) -> NetConfig {
        NetConfig {
            vocab_size: data.vocab_size(),
            char_vocab_size: data.char_vocab.len(),
            class_count: data.class_count(),
            embed_dim: 12,
            char_dim: 6,
            d_model: 16,
            dropout: 0.1,
            char_emb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::data::dataset::ConversationBatcher;
    use burn::backend::NdArray;
    use burn::data::dataloader::batcher::Batcher;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_all_variants_share_forward_contract() {
        let data = test_data();
        let device = Default::default();
        let config = test_net_config(&data, false);

        for arch in [
            ArchKind::Single,
            ArchKind::Fusion,
            ArchKind::Ensemble,
            ArchKind::Separate,
        ] {
            let model = EmoModel::<TestBackend>::new(&device, arch, &config, None);
            let batcher = ConversationBatcher::<TestBackend>::new(
                Default::default(),
                arch,
                false,
                data.char_vocab.max_word_len,
            );
            let batch = batcher.batch(data.train.samples().to_vec(), &device);
            let logits = model.forward(&batch);
            assert_eq!(logits.dims(), [3, data.class_count()], "{:?}", arch);
        }
    }
}
