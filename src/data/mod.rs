//! Data loading and vocabulary management
//!
//! EmoContext TSV parsing, token/label/char vocabularies, and batching.

pub mod dataset;
pub mod embeddings;
pub mod vocab;

pub use dataset::{ConversationBatch, ConversationBatcher, EmoData, EmoDataset};
pub use vocab::Vocab;
