//! Training loop

use burn::data::dataloader::DataLoaderBuilder;
use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;

use crate::data::dataset::{ConversationBatcher, EmoData, EmoDataset};
use crate::model::EmoModel;
use crate::training::evaluate::{argmax_rows, evaluate};
use crate::training::loss::{target_indices, LossFn, MfeLoss};
use crate::training::metrics::{BestTracker, MetricsWindow};
use crate::training::scalars::ScalarLog;
use crate::{Config, Result};

/// Trainer for the EmoModel variants
pub struct Trainer<B: AutodiffBackend> {
    model: EmoModel<B>,
    optimizer: burn::optim::adaptor::OptimizerAdaptor<burn::optim::Adam, EmoModel<B>, B>,
    loss_fn: LossFn,
    mfe: Option<MfeLoss>,
    config: Config,
    device: B::Device,
    class_count: usize,
    others_idx: Option<usize>,
    max_word_len: usize,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create a new trainer
    pub fn new(model: EmoModel<B>, config: Config, data: &EmoData, device: B::Device) -> Self {
        let optimizer = AdamConfig::new()
            .with_grad_clipping(Some(GradientClippingConfig::Norm(
                config.training.norm_limit,
            )))
            .init();

        let class_count = data.class_count();
        let others_idx = data.others_idx(&config.loss.others_label);

        Trainer {
            model,
            optimizer,
            loss_fn: LossFn::from_config(&config.loss, class_count, others_idx),
            mfe: MfeLoss::from_config(&config.loss, class_count, others_idx),
            config,
            device,
            class_count,
            others_idx,
            max_word_len: data.char_vocab.max_word_len,
        }
    }

    /// Learning rate for a zero-based epoch, decayed every `lr_step` epochs
    fn learning_rate(&self, epoch: usize) -> f64 {
        let steps = (epoch / self.config.training.lr_step.max(1)) as i32;
        self.config.training.learning_rate * self.config.training.lr_gamma.powi(steps)
    }

    /// Train the model, returning the parameters from the validation pass
    /// with the highest F1.
    pub fn train(
        mut self,
        train_dataset: EmoDataset,
        val_dataset: EmoDataset,
        scalars: &mut ScalarLog,
    ) -> Result<(EmoModel<B>, BestTracker)> {
        let arch = self.config.model.arch;
        let char_emb = self.config.model.char_emb;

        let batcher_train =
            ConversationBatcher::<B>::new(self.device.clone(), arch, char_emb, self.max_word_len);
        let batcher_val = ConversationBatcher::<B::InnerBackend>::new(
            self.device.clone(),
            arch,
            char_emb,
            self.max_word_len,
        );

        let train_loader = DataLoaderBuilder::new(batcher_train)
            .batch_size(self.config.training.batch_size)
            .shuffle(self.config.training.seed)
            .build(train_dataset);

        let val_loader = DataLoaderBuilder::new(batcher_val)
            .batch_size(self.config.training.eval_batch_size)
            .build(val_dataset);

        let mut best = BestTracker::new();
        let mut best_model = self.model.clone();
        let mut window = MetricsWindow::new(self.config.training.print_every);
        let mut global_step = 0usize;

        log::info!(
            "Starting training for {} epochs ({:?} variant)",
            self.config.training.epochs,
            arch
        );

        for epoch in 0..self.config.training.epochs {
            let lr = self.learning_rate(epoch);
            log::info!(
                "Epoch {}/{} (lr {:.6})",
                epoch + 1,
                self.config.training.epochs,
                lr
            );

            // Partial windows never carry across epochs; the validation
            // cadence restarts with them.
            window.reset();
            let mut epoch_step = 0usize;

            for batch in train_loader.iter() {
                let batch_size = batch.size;
                let targets = match batch.labels.clone() {
                    Some(targets) => targets,
                    None => continue,
                };

                let logits = self.model.forward(&batch);

                let mut loss = self.loss_fn.forward(logits.clone(), targets.clone());
                if let Some(mfe) = &self.mfe {
                    loss = loss + mfe.forward(logits.clone(), targets.clone());
                }

                let loss_val: f32 = loss.clone().into_scalar().elem();

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &self.model);
                self.model = self.optimizer.step(lr, self.model.clone(), grads);

                let predicted = argmax_rows(&logits);
                let actual = target_indices(&targets);
                let correct = predicted
                    .iter()
                    .zip(actual.iter())
                    .filter(|(p, t)| p == t)
                    .count();

                global_step += 1;
                epoch_step += 1;

                if let Some(report) = window.push(loss_val, correct, batch_size) {
                    log::info!(
                        "step {}: train loss: {:.4} / train acc: {:.4}",
                        global_step,
                        report.loss,
                        report.accuracy
                    );
                    scalars.write("loss/train", global_step, report.loss as f64)?;
                    scalars.write("acc/train", global_step, report.accuracy)?;
                }

                if epoch_step % self.config.training.validate_every == 0 {
                    let eval = evaluate(
                        &self.model.valid(),
                        val_loader.iter(),
                        &self.loss_fn,
                        self.class_count,
                        self.others_idx,
                    );

                    let snapshot = best.observe(eval.f1, eval.accuracy);
                    if snapshot {
                        best_model = self.model.clone();
                    }

                    log::info!(
                        "step {}: dev loss: {:.4} / dev acc: {:.4} / dev f1: {:.4} (max dev acc: {:.4} / max dev f1: {:.4}){}",
                        global_step,
                        eval.loss,
                        eval.accuracy,
                        eval.f1,
                        best.best_acc,
                        best.best_f1,
                        if snapshot { " [snapshot]" } else { "" }
                    );
                    scalars.write("loss/dev", global_step, eval.loss as f64)?;
                    scalars.write("acc/dev", global_step, eval.accuracy)?;
                    scalars.write("f1/dev", global_step, eval.f1)?;
                }
            }
        }

        scalars.flush()?;
        log::info!(
            "Training complete (max dev acc: {:.4} / max dev f1: {:.4})",
            best.best_acc,
            best.best_f1
        );

        Ok((best_model, best))
    }

    /// Get the current model
    pub fn model(&self) -> &EmoModel<B> {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::{test_data, test_net_config};
    use crate::model::NetConfig;
    use crate::ArchKind;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray<f32>>;

    fn small_config() -> Config {
        let mut config = Config::default();
        config.training.epochs = 1;
        config.training.batch_size = 3;
        config.training.eval_batch_size = 3;
        config.training.print_every = 1;
        config.training.validate_every = 1;
        config.model.embed_dim = 12;
        config.model.char_dim = 6;
        config.model.d_model = 16;
        config
    }

    #[test]
    fn test_lr_decays_every_lr_step_epochs() {
        let data = test_data();
        let mut config = small_config();
        config.training.learning_rate = 1e-3;
        config.training.lr_gamma = 0.5;
        config.training.lr_step = 10;

        let device = Default::default();
        let net_config = test_net_config(&data, false);
        let model =
            EmoModel::<TestBackend>::new(&device, ArchKind::Single, &net_config, None);
        let trainer = Trainer::new(model, config, &data, device);

        assert!((trainer.learning_rate(0) - 1e-3).abs() < 1e-12);
        assert!((trainer.learning_rate(9) - 1e-3).abs() < 1e-12);
        assert!((trainer.learning_rate(10) - 5e-4).abs() < 1e-12);
        assert!((trainer.learning_rate(20) - 2.5e-4).abs() < 1e-12);
    }

    #[test]
    fn test_validation_cadence_restarts_each_epoch() {
        // 3 samples at batch size 1 give 3 steps per epoch. With
        // validate_every = 2 only local step 2 validates; the trailing
        // step is dropped, so 2 epochs mean exactly 2 validation passes
        // (a run-global trigger would fire at steps 2, 4, and 6).
        let data = test_data();
        let mut config = small_config();
        config.training.epochs = 2;
        config.training.batch_size = 1;
        config.training.validate_every = 2;
        config.training.print_every = 100;

        let device = Default::default();
        let net_config = NetConfig::from_run(&config, &data);
        let model =
            EmoModel::<TestBackend>::new(&device, config.model.arch, &net_config, None);

        let dir = std::env::temp_dir().join("emocontext_trainer_cadence_test");
        let dir = dir.to_str().unwrap().to_string();
        let mut scalars = ScalarLog::create(&dir, "cadence").unwrap();

        let trainer = Trainer::new(model, config, &data, device);
        trainer
            .train(data.train.clone(), data.val.clone(), &mut scalars)
            .unwrap();

        let contents = std::fs::read_to_string(scalars.path()).unwrap();
        let dev_rows = contents
            .lines()
            .filter(|line| line.starts_with("f1/dev\t"))
            .count();
        assert_eq!(dev_rows, 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_one_epoch_updates_and_tracks_best() {
        let data = test_data();
        let config = small_config();
        let device = Default::default();
        let net_config = NetConfig::from_run(&config, &data);
        let model =
            EmoModel::<TestBackend>::new(&device, config.model.arch, &net_config, None);

        let dir = std::env::temp_dir().join("emocontext_trainer_test");
        let dir = dir.to_str().unwrap().to_string();
        let mut scalars = ScalarLog::create(&dir, "test").unwrap();

        let trainer = Trainer::new(model, config, &data, device);
        let (_best_model, best) = trainer
            .train(data.train.clone(), data.val.clone(), &mut scalars)
            .unwrap();

        // One step over three samples with validate_every = 1 always
        // produces at least one validation pass.
        assert!(best.best_f1 >= 0.0);
        assert!(best.best_acc > 0.0 || best.best_f1 == 0.0);

        std::fs::remove_dir_all(&dir).ok();
    }
}
