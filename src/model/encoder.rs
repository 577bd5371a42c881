//! Shared sentence encoder
//!
//! Embeds a token sequence (optionally augmented with character-level
//! embeddings), runs it through an LSTM, and pools with self-attention
//! into a fixed-size sentence representation.

use burn::module::{Module, Param};
use burn::nn::{
    Dropout, DropoutConfig, Embedding, EmbeddingConfig, Linear, LinearConfig, Lstm, LstmConfig,
};
use burn::tensor::activation::{relu, softmax};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::data::dataset::SeqTensors;
use crate::model::NetConfig;

/// Sentence encoder: word (+ char) embedding → LSTM → attentive pooling
#[derive(Module, Debug)]
pub struct SentenceEncoder<B: Backend> {
    word_emb: Embedding<B>,
    char_emb: Option<Embedding<B>>,
    proj: Linear<B>,
    lstm: Lstm<B>,
    attn: Linear<B>,
    dropout: Dropout,
    d_model: usize,
    char_dim: usize,
}

impl<B: Backend> SentenceEncoder<B> {
    pub fn new(device: &B::Device, config: &NetConfig, pretrained: Option<&[Vec<f32>]>) -> Self {
        let mut word_emb = EmbeddingConfig::new(config.vocab_size, config.embed_dim).init(device);
        if let Some(matrix) = pretrained {
            let data: Vec<f32> = matrix.iter().flat_map(|row| row.iter().copied()).collect();
            let weights = Tensor::<B, 1>::from_floats(data.as_slice(), device)
                .reshape([config.vocab_size, config.embed_dim]);
            word_emb.weight = Param::from_tensor(weights);
        }

        let char_emb = if config.char_emb {
            Some(EmbeddingConfig::new(config.char_vocab_size, config.char_dim).init(device))
        } else {
            None
        };

        let input_dim = config.embed_dim + if config.char_emb { config.char_dim } else { 0 };

        SentenceEncoder {
            word_emb,
            char_emb,
            proj: LinearConfig::new(input_dim, config.d_model).init(device),
            lstm: LstmConfig::new(config.d_model, config.d_model, true).init(device),
            attn: LinearConfig::new(config.d_model, 1).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
            d_model: config.d_model,
            char_dim: config.char_dim,
        }
    }

    /// Encode a padded token sequence into [batch, d_model]
    pub fn forward(&self, seq: &SeqTensors<B>) -> Tensor<B, 2> {
        let [batch_size, seq_len] = seq.tokens.dims();

        // Word embeddings: [batch, seq, embed_dim]
        let mut x = self.word_emb.forward(seq.tokens.clone());

        // Character embeddings averaged per token, concatenated feature-wise
        if let Some(char_emb) = &self.char_emb {
            let chars = seq
                .chars
                .clone()
                .expect("char tensors required when char embeddings are enabled");
            let [_, _, word_len] = chars.dims();
            let char_vecs = char_emb.forward(chars.reshape([batch_size, seq_len * word_len]));
            let char_vecs = char_vecs
                .reshape([batch_size, seq_len, word_len, self.char_dim])
                .mean_dim(2)
                .reshape([batch_size, seq_len, self.char_dim]);
            x = Tensor::cat(vec![x, char_vecs], 2);
        }

        let x = relu(self.proj.forward(x));
        let x = self.dropout.forward(x);

        // Sequence states: [batch, seq, d_model]
        let (states, _) = self.lstm.forward(x, None);

        // Attentive pooling over valid positions
        let scores = self
            .attn
            .forward(states.clone())
            .reshape([batch_size, seq_len])
            .mask_fill(seq.pad_mask.clone(), -1e9);
        let weights = softmax(scores, 1)
            .reshape([batch_size, seq_len, 1])
            .expand([batch_size, seq_len, self.d_model]);

        let pooled = (states * weights)
            .sum_dim(1)
            .reshape([batch_size, self.d_model]);

        self.dropout.forward(pooled)
    }

    pub fn d_model(&self) -> usize {
        self.d_model
    }
}

/// Classification head: Linear → ReLU → Dropout → Linear
#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> ClassifierHead<B> {
    pub fn new(device: &B::Device, input_dim: usize, hidden_dim: usize, class_count: usize, dropout: f64) -> Self {
        ClassifierHead {
            fc1: LinearConfig::new(input_dim, hidden_dim).init(device),
            fc2: LinearConfig::new(hidden_dim, class_count).init(device),
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    /// Forward pass returning per-class logits [batch, class_count]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.fc1.forward(x));
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }
}
