//! EmoContext emotion classification using deep learning
//!
//! Trains a short-text emotion classifier over 3-turn conversations and
//! generates a tab-separated submission file for the held-out test split.

pub mod data;
pub mod model;
pub mod predict;
pub mod training;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which of the four network variants to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchKind {
    /// Encode the whole conversation as one token sequence
    Single,
    /// Encode context (turns 1+2) and final turn separately, then fuse
    Fusion,
    /// Two independent encoders over the full sequence, logits averaged
    Ensemble,
    /// Encode each turn separately and concatenate
    Separate,
}

/// Primary classification loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossKind {
    CrossEntropy,
    Focal,
}

/// Auxiliary class-imbalance loss added on top of the primary loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MfeKind {
    None,
    /// Mean false error: sum of per-class mean squared errors
    Mfe,
    /// Mean squared false error: sum of squared per-class errors
    Msfe,
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum EmoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Model not trained - run `emo train` first")]
    NoModel,

    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    #[error("Prediction count {predictions} does not match test row count {rows}")]
    SubmissionMismatch { predictions: usize, rows: usize },
}

pub type Result<T> = std::result::Result<T, EmoError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub training: TrainingConfig,
    pub model: ModelConfig,
    pub loss: LossConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub eval_batch_size: usize,
    pub learning_rate: f64,
    /// LR decay factor applied every `lr_step` epochs
    pub lr_gamma: f64,
    pub lr_step: usize,
    /// Gradient norm clipping limit
    pub norm_limit: f32,
    /// Report averaged train loss/accuracy every N steps
    pub print_every: usize,
    /// Run validation every N steps
    pub validate_every: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub arch: ArchKind,
    pub embed_dim: usize,
    pub char_dim: usize,
    pub d_model: usize,
    pub dropout: f64,
    /// Include character-level embeddings alongside word embeddings
    pub char_emb: bool,
    /// Initialize word embeddings from a pre-aligned matrix file
    pub pretrained: bool,
    pub pretrained_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossConfig {
    pub kind: LossKind,
    /// Focal loss focusing parameter
    pub fl_gamma: f32,
    /// Optional weight placed on the majority class; the remainder is
    /// spread evenly over the other classes
    pub fl_alpha: Option<f32>,
    pub mfe: MfeKind,
    /// Weight applied to the majority class term of the MFE loss
    pub mfe_others_weight: f32,
    /// Label treated as the majority class (excluded from F1)
    pub others_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub train_path: String,
    pub val_path: String,
    pub test_path: String,
    pub model_dir: String,
    pub submission_dir: String,
    pub run_dir: String,
    /// Minimum token frequency for the word vocabulary
    pub min_freq: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            training: TrainingConfig {
                epochs: 12,
                batch_size: 64,
                eval_batch_size: 256,
                learning_rate: 1e-3,
                lr_gamma: 0.5,
                lr_step: 10,
                norm_limit: 3.0,
                print_every: 100,
                validate_every: 100,
                seed: 42,
            },
            model: ModelConfig {
                arch: ArchKind::Single,
                embed_dim: 300,
                char_dim: 50,
                d_model: 300,
                dropout: 0.3,
                char_emb: false,
                pretrained: false,
                pretrained_path: "data/embeddings/aligned.txt".to_string(),
            },
            loss: LossConfig {
                kind: LossKind::CrossEntropy,
                fl_gamma: 2.0,
                fl_alpha: None,
                mfe: MfeKind::None,
                mfe_others_weight: 1.0,
                others_label: "others".to_string(),
            },
            data: DataConfig {
                train_path: "data/raw/train.txt".to_string(),
                val_path: "data/raw/dev.txt".to_string(),
                test_path: "data/raw/devwithoutlabels.txt".to_string(),
                model_dir: "saved_models".to_string(),
                submission_dir: "submissions".to_string(),
                run_dir: "runs".to_string(),
                min_freq: 1,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EmoError::Config(format!("Failed to read config file {}: {}", path, e)))?;
        toml::from_str(&content)
            .map_err(|e| EmoError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| EmoError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
