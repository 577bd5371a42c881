//! EmoContext CLI
//!
//! Trains the conversation emotion classifier and generates submission
//! files for the held-out test split.

use clap::{Parser, Subcommand};
use emocontext::{ArchKind, Config, Result};

#[derive(Parser)]
#[command(name = "emo")]
#[command(about = "3-turn conversation emotion classification", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model and write a submission from the best checkpoint
    Train {
        /// Override number of epochs
        #[arg(long)]
        epochs: Option<usize>,
        /// Override the architecture variant
        #[arg(long)]
        arch: Option<ArchArg>,
    },
    /// Generate a submission from a saved model
    Submit {
        /// Saved model path (without the .mpk extension)
        model: String,
        /// Output path (defaults under the submission directory)
        #[arg(long)]
        output: Option<String>,
    },
    /// Embedding alignment commands
    Embed {
        #[command(subcommand)]
        action: EmbedCommands,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum EmbedCommands {
    /// Align a matrix indexed by an external vocabulary file
    Indexed {
        /// Source vocabulary file, one token per line
        vocab: String,
        /// Source matrix file, one row of floats per line
        matrix: String,
        /// Output path for the aligned matrix
        output: String,
    },
    /// Align a raw text embedding file (`word v1 v2 ...` per line)
    Text {
        /// Source embedding file
        source: String,
        /// Output path for the aligned matrix
        output: String,
    },
}

#[derive(Clone, Copy, Debug)]
struct ArchArg(ArchKind);

impl std::str::FromStr for ArchArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(ArchArg(ArchKind::Single)),
            "fusion" => Ok(ArchArg(ArchKind::Fusion)),
            "ensemble" => Ok(ArchArg(ArchKind::Ensemble)),
            "separate" => Ok(ArchArg(ArchKind::Separate)),
            _ => Err(format!(
                "Unknown architecture: {}. Use single, fusion, ensemble, or separate.",
                s
            )),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    // Run command
    let result = match cli.command {
        Commands::Train { epochs, arch } => commands::train(&config, epochs, arch.map(|a| a.0)),
        Commands::Submit { model, output } => commands::submit(&config, &model, output),
        Commands::Embed { action } => match action {
            EmbedCommands::Indexed {
                vocab,
                matrix,
                output,
            } => commands::embed_indexed(&config, &vocab, &matrix, &output),
            EmbedCommands::Text { source, output } => {
                commands::embed_text(&config, &source, &output)
            }
        },
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use emocontext::data::dataset::{ConversationBatcher, EmoData};
    use emocontext::data::embeddings;
    use emocontext::model::{EmoModel, NetConfig};
    use emocontext::predict::{write_submission_file, Predictor};

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data/raw")?;
        std::fs::create_dir_all(&config.data.model_dir)?;
        std::fs::create_dir_all(&config.data.submission_dir)?;
        std::fs::create_dir_all(&config.data.run_dir)?;
        println!("Created data and output directories");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Place train.txt, dev.txt, and devwithoutlabels.txt under data/raw/");
        println!("  3. Run 'emo train' to train and generate a submission");

        Ok(())
    }

    pub fn train(config: &Config, epochs: Option<usize>, arch: Option<ArchKind>) -> Result<()> {
        use burn::backend::{Autodiff, NdArray};
        use burn::module::AutodiffModule;
        use emocontext::training::{ScalarLog, Trainer};

        type MyBackend = NdArray<f32>;
        type MyAutodiffBackend = Autodiff<MyBackend>;

        let mut training_config = config.clone();
        if let Some(e) = epochs {
            training_config.training.epochs = e;
        }
        if let Some(a) = arch {
            training_config.model.arch = a;
        }

        println!("Loading data...");
        let data = EmoData::load(&training_config)?;
        println!(
            "  {} training / {} validation conversations",
            data.train.samples().len(),
            data.val.samples().len()
        );
        println!(
            "  vocab: {} tokens, {} chars, {} classes",
            data.vocab_size(),
            data.char_vocab.len(),
            data.class_count()
        );

        if data.train.is_empty() || data.val.is_empty() {
            return Err(emocontext::EmoError::Config(
                "Empty training or validation split. Check the data paths.".to_string(),
            ));
        }

        // Pre-aligned word vectors, if configured
        let pretrained = if training_config.model.pretrained {
            let matrix = embeddings::load_matrix(&training_config.model.pretrained_path)?;
            embeddings::check_shape(&matrix, data.vocab_size(), training_config.model.embed_dim)?;
            println!("  loaded pretrained embeddings ({} rows)", matrix.len());
            Some(matrix)
        } else {
            None
        };

        let run_id = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut scalars = ScalarLog::create(&training_config.data.run_dir, &run_id)?;

        let device = Default::default();
        let net_config = NetConfig::from_run(&training_config, &data);
        let model = EmoModel::<MyAutodiffBackend>::new(
            &device,
            training_config.model.arch,
            &net_config,
            pretrained.as_deref(),
        );

        println!("\nStarting training...\n");
        let trainer = Trainer::new(model, training_config.clone(), &data, device);
        let (best_model, best) =
            trainer.train(data.train.clone(), data.val.clone(), &mut scalars)?;

        // Save the best checkpoint under a name carrying its dev F1
        std::fs::create_dir_all(&training_config.data.model_dir)?;
        let model_path = format!(
            "{}/EMONET_{}_{:.4}",
            training_config.data.model_dir, run_id, best.best_f1
        );
        best_model.save(&model_path)?;
        println!("\nSaved best model to {}.mpk", model_path);

        // Submission from the best checkpoint
        let inference_model: EmoModel<MyBackend> = best_model.valid();
        let submission_path = format!(
            "{}/EMONET_{}.txt",
            training_config.data.submission_dir, run_id
        );
        generate_submission(
            &training_config,
            &data,
            inference_model,
            &submission_path,
        )?;

        println!("\nTraining complete!");
        println!("  Best dev F1:  {:.4}", best.best_f1);
        println!("  Best dev acc: {:.4}", best.best_acc);
        println!("  Submission:   {}", submission_path);

        Ok(())
    }

    pub fn submit(config: &Config, model_path: &str, output: Option<String>) -> Result<()> {
        use burn::backend::NdArray;

        type MyBackend = NdArray<f32>;

        // Burn adds the .mpk extension
        let model_file = format!("{}.mpk", model_path);
        if !std::path::Path::new(&model_file).exists() {
            return Err(emocontext::EmoError::NoModel);
        }

        // Vocabularies must be rebuilt from the same training data the
        // model was trained on.
        println!("Loading data...");
        let data = EmoData::load(config)?;

        let device = Default::default();
        let net_config = NetConfig::from_run(config, &data);
        let model =
            EmoModel::<MyBackend>::load(&device, model_path, config.model.arch, &net_config)?;

        let output = output.unwrap_or_else(|| {
            let run_id = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
            format!("{}/EMONET_{}.txt", config.data.submission_dir, run_id)
        });
        generate_submission(config, &data, model, &output)?;
        println!("Submission written to {}", output);

        Ok(())
    }

    fn generate_submission<B: burn::tensor::backend::Backend>(
        config: &Config,
        data: &EmoData,
        model: EmoModel<B>,
        output: &str,
    ) -> Result<()> {
        let (_, test_set) = data.load_test(&config.data.test_path)?;
        println!("  {} test conversations", test_set.samples().len());

        let device: B::Device = Default::default();
        let batcher = ConversationBatcher::<B>::new(
            device.clone(),
            config.model.arch,
            config.model.char_emb,
            data.char_vocab.max_word_len,
        );
        let predictor = Predictor::new(
            model,
            batcher,
            config.training.eval_batch_size,
            device,
        );

        let labels = predictor.predict_labels(&test_set, &data.label_vocab)?;
        write_submission_file(&config.data.test_path, &labels, output)
    }

    pub fn embed_indexed(
        config: &Config,
        vocab_path: &str,
        matrix_path: &str,
        output: &str,
    ) -> Result<()> {
        let data = EmoData::load(config)?;
        let source_vocab = embeddings::load_vocab_file(vocab_path)?;
        let source = embeddings::load_matrix(matrix_path)?;

        let aligned = embeddings::align_indexed(&data.text_vocab, &source_vocab, &source);
        embeddings::save_matrix(output, &aligned)?;
        println!(
            "Aligned {} rows ({} source vectors) to {}",
            aligned.len(),
            source.len(),
            output
        );

        Ok(())
    }

    pub fn embed_text(config: &Config, source_path: &str, output: &str) -> Result<()> {
        use std::fs::File;
        use std::io::BufReader;

        let data = EmoData::load(config)?;
        let file = File::open(source_path).map_err(|e| {
            emocontext::EmoError::Parse(format!("Failed to open {}: {}", source_path, e))
        })?;

        let aligned = embeddings::align_text(&data.text_vocab, BufReader::new(file))?;
        embeddings::save_matrix(output, &aligned)?;
        println!("Aligned {} rows to {}", aligned.len(), output);

        Ok(())
    }
}
