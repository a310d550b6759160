use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{
    layer_norm, linear, loss, ops, Dropout, LayerNorm, LayerNormConfig, Linear, Module, Optimizer,
    ParamsAdamW, VarBuilder, VarMap,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::{ModelConfig, TrainParams};
use crate::dataset::{Label, TrainingExample};
use crate::error::PpiError;
use crate::stats::{TrainingMetrics, TrainingPhase};

/// Raw model output for one protein pair: the interaction probability and
/// the distribution over interaction-type labels. Confidence bucketing and
/// response shaping happen above this layer.
#[derive(Debug, Clone)]
pub struct PairPrediction {
    pub probability: f32,
    pub type_probs: Vec<f32>,
}

impl PairPrediction {
    pub fn interacts(&self) -> bool {
        self.probability > 0.5
    }

    /// Index of the most probable interaction type.
    pub fn top_type_index(&self) -> Option<usize> {
        self.type_probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}

/// Multi-task classifier over a pair of protein embeddings.
///
/// The concatenated `2*D` feature vector passes through a shared
/// feed-forward extractor (Linear, LayerNorm, ReLU, Dropout per hidden
/// layer) into two heads: a 1-unit binary interaction head and a K-unit
/// interaction-type head. `forward` produces logits; `predict_pair` applies
/// sigmoid/softmax.
///
/// Concatenation is order-sensitive, so `predict(a, b)` and `predict(b, a)`
/// are close but not guaranteed identical. Replacing the concatenation with
/// an order-invariant combination would change the checkpoint layout and is
/// deliberately not done here.
pub struct InteractionModel {
    varmap: VarMap,
    config: ModelConfig,
    device: Device,
    hidden: Vec<(Linear, LayerNorm)>,
    dropout: Dropout,
    binary_head: Linear,
    type_head: Linear,
    is_training: bool,
}

impl InteractionModel {
    /// Creates a freshly initialized model ready for training.
    pub fn new_untrained(config: ModelConfig, device: Device) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let mut hidden = Vec::with_capacity(config.hidden_dims.len());
        let mut prev_dim = config.input_dim();
        for (i, &dim) in config.hidden_dims.iter().enumerate() {
            let layer = linear(prev_dim, dim, vb.pp(format!("feature_extractor.{i}.linear")))?;
            let norm = layer_norm(
                dim,
                LayerNormConfig::default(),
                vb.pp(format!("feature_extractor.{i}.norm")),
            )?;
            hidden.push((layer, norm));
            prev_dim = dim;
        }

        let binary_head = linear(prev_dim, 1, vb.pp("binary_head"))?;
        let type_head = linear(prev_dim, config.num_types(), vb.pp("type_head"))?;

        Ok(Self {
            varmap,
            dropout: Dropout::new(config.dropout),
            config,
            device,
            hidden,
            binary_head,
            type_head,
            is_training: true,
        })
    }

    /// Loads trained weights from a safetensors checkpoint. The architecture
    /// in `config` must match the one the checkpoint was saved from. The
    /// returned model is in evaluation mode.
    pub fn from_checkpoint<P: AsRef<Path>>(
        path: P,
        config: ModelConfig,
        device: Device,
    ) -> Result<Self> {
        if !path.as_ref().exists() {
            anyhow::bail!("model checkpoint not found: {:?}", path.as_ref());
        }
        let mut model = Self::new_untrained(config, device)?;
        model
            .varmap
            .load(path.as_ref())
            .with_context(|| format!("failed to load model checkpoint {:?}", path.as_ref()))?;
        model.is_training = false;
        Ok(model)
    }

    /// Saves model weights in safetensors format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        log::info!("Saving interaction model weights to {:?}", path.as_ref());
        self.varmap.save(path.as_ref())?;
        Ok(())
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Disables dropout for inference.
    pub fn set_evaluation_mode(&mut self) {
        self.is_training = false;
    }

    pub fn set_training_mode(&mut self) {
        self.is_training = true;
    }

    /// Direct access to the parameter map. Used by the training loop's
    /// optimizer and by tests that pin weights to analytic values.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Forward pass over a `(batch, 2*D)` feature tensor. Returns
    /// `(binary_logits: (batch,), type_logits: (batch, K))`.
    fn forward(&self, xs: &Tensor) -> Result<(Tensor, Tensor), candle_core::Error> {
        let mut x = xs.clone();
        for (layer, norm) in &self.hidden {
            x = layer.forward(&x)?;
            x = norm.forward(&x)?;
            x = x.relu()?;
            x = self.dropout.forward(&x, self.is_training)?;
        }
        let binary_logits = self.binary_head.forward(&x)?.squeeze(1)?;
        let type_logits = self.type_head.forward(&x)?;
        Ok((binary_logits, type_logits))
    }

    /// Predicts the interaction probability and type distribution for a
    /// single embedding pair. Both vectors must have the configured
    /// dimensionality; anything else fails fast with
    /// [`PpiError::DimensionMismatch`].
    pub fn predict_pair(&self, emb_a: &[f32], emb_b: &[f32]) -> Result<PairPrediction, PpiError> {
        let expected = self.config.embedding_dim;
        for emb in [emb_a, emb_b] {
            if emb.len() != expected {
                return Err(PpiError::DimensionMismatch {
                    expected,
                    actual: emb.len(),
                });
            }
        }

        let mut features = Vec::with_capacity(self.config.input_dim());
        features.extend_from_slice(emb_a);
        features.extend_from_slice(emb_b);
        let input = Tensor::from_vec(features, (1, self.config.input_dim()), &self.device)?;

        let (binary_logits, type_logits) = self.forward(&input)?;
        let probability = ops::sigmoid(&binary_logits)?.to_vec1::<f32>()?[0];
        let type_probs = ops::softmax(&type_logits, 1)?.to_vec2::<f32>()?.remove(0);

        Ok(PairPrediction {
            probability,
            type_probs,
        })
    }

    /// Fits the model with mini-batch AdamW.
    ///
    /// The primary loss is binary cross-entropy on the interaction label;
    /// examples carrying a type label additionally contribute a weighted
    /// cross-entropy term through the type head. Per-epoch loss and accuracy
    /// are recorded for both phases.
    pub fn train(
        &mut self,
        training_data: &[TrainingExample],
        validation_data: Option<&[TrainingExample]>,
        params: &TrainParams,
    ) -> Result<TrainingMetrics> {
        if training_data.is_empty() {
            anyhow::bail!("training set is empty");
        }
        self.check_examples(training_data)?;
        if let Some(val) = validation_data {
            self.check_examples(val)?;
        }

        let batch_size = params.batch_size.max(1);
        let num_batches = training_data.len().div_ceil(batch_size);
        log::info!(
            "Training interaction model on {} examples ({} batches) for {} epochs",
            training_data.len(),
            num_batches,
            params.epochs
        );

        let mut opt = candle_nn::AdamW::new(
            self.varmap.all_vars(),
            ParamsAdamW {
                lr: params.learning_rate,
                ..Default::default()
            },
        )?;
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut metrics = TrainingMetrics::new();

        let mut indices: Vec<usize> = (0..training_data.len()).collect();
        for epoch in 0..params.epochs {
            self.set_training_mode();
            indices.shuffle(&mut rng);

            let mut epoch_loss = 0.0f32;
            let mut correct = 0usize;
            for batch_indices in indices.chunks(batch_size) {
                let batch = Batch::assemble(training_data, batch_indices, &self.config, &self.device)?;
                let (binary_logits, type_logits) = self.forward(&batch.features)?;

                let mut total = loss::binary_cross_entropy_with_logit(&binary_logits, &batch.labels)?;
                if let Some((row_indices, targets)) = &batch.type_targets {
                    let selected = type_logits.index_select(row_indices, 0)?;
                    let aux = loss::cross_entropy(&selected, targets)?;
                    total = (&total + &(aux * params.aux_loss_weight)?)?;
                }

                opt.backward_step(&total)?;
                epoch_loss += total.to_scalar::<f32>()?;
                correct += batch.count_correct(&binary_logits)?;
            }

            let train_loss = epoch_loss / num_batches as f32;
            let train_acc = correct as f32 / training_data.len() as f32;
            metrics.push(epoch, TrainingPhase::Train, train_loss, train_acc);

            if let Some(val) = validation_data {
                let (val_loss, val_acc) = self.evaluate(val, batch_size)?;
                metrics.push(epoch, TrainingPhase::Validation, val_loss, val_acc);
                log::info!(
                    "Epoch {}/{}: train loss {:.4} acc {:.4} | val loss {:.4} acc {:.4}",
                    epoch + 1,
                    params.epochs,
                    train_loss,
                    train_acc,
                    val_loss,
                    val_acc
                );
            } else {
                log::info!(
                    "Epoch {}/{}: train loss {:.4} acc {:.4}",
                    epoch + 1,
                    params.epochs,
                    train_loss,
                    train_acc
                );
            }
        }

        self.set_evaluation_mode();
        Ok(metrics)
    }

    /// Loss and accuracy over a dataset without gradient updates.
    pub fn evaluate(&mut self, data: &[TrainingExample], batch_size: usize) -> Result<(f32, f32)> {
        if data.is_empty() {
            anyhow::bail!("evaluation set is empty");
        }
        let was_training = self.is_training;
        self.set_evaluation_mode();

        let batch_size = batch_size.max(1);
        let indices: Vec<usize> = (0..data.len()).collect();
        let num_batches = data.len().div_ceil(batch_size);
        let mut total_loss = 0.0f32;
        let mut correct = 0usize;
        for batch_indices in indices.chunks(batch_size) {
            let batch = Batch::assemble(data, batch_indices, &self.config, &self.device)?;
            let (binary_logits, _) = self.forward(&batch.features)?;
            let bce = loss::binary_cross_entropy_with_logit(&binary_logits, &batch.labels)?;
            total_loss += bce.to_scalar::<f32>()?;
            correct += batch.count_correct(&binary_logits)?;
        }

        self.is_training = was_training;
        Ok((
            total_loss / num_batches as f32,
            correct as f32 / data.len() as f32,
        ))
    }

    fn check_examples(&self, examples: &[TrainingExample]) -> Result<(), PpiError> {
        let expected = self.config.input_dim();
        for example in examples {
            if example.features.len() != expected {
                return Err(PpiError::DimensionMismatch {
                    expected,
                    actual: example.features.len(),
                });
            }
        }
        Ok(())
    }
}

/// Tensors for one mini-batch: features, binary targets, and the subset of
/// rows that carry interaction-type labels.
struct Batch {
    features: Tensor,
    labels: Tensor,
    type_targets: Option<(Tensor, Tensor)>,
    label_values: Vec<f32>,
}

impl Batch {
    fn assemble(
        data: &[TrainingExample],
        indices: &[usize],
        config: &ModelConfig,
        device: &Device,
    ) -> Result<Self> {
        let input_dim = config.input_dim();
        let mut features = Vec::with_capacity(indices.len() * input_dim);
        let mut label_values = Vec::with_capacity(indices.len());
        let mut typed_rows: Vec<u32> = Vec::new();
        let mut type_classes: Vec<u32> = Vec::new();

        for (row, &i) in indices.iter().enumerate() {
            let example = &data[i];
            features.extend_from_slice(&example.features);
            label_values.push(match example.label {
                Label::Positive => 1.0,
                Label::Negative => 0.0,
            });
            if let Some(class) = example.type_label {
                typed_rows.push(row as u32);
                type_classes.push(class);
            }
        }

        let features = Tensor::from_vec(features, (indices.len(), input_dim), device)?;
        let labels = Tensor::from_vec(label_values.clone(), indices.len(), device)?;
        let type_targets = if typed_rows.is_empty() {
            None
        } else {
            let rows = Tensor::from_vec(typed_rows.clone(), typed_rows.len(), device)?;
            let classes = Tensor::from_vec(type_classes.clone(), type_classes.len(), device)?;
            Some((rows, classes))
        };

        Ok(Self {
            features,
            labels,
            type_targets,
            label_values,
        })
    }

    /// Number of rows where thresholding the logit at 0 matches the label.
    fn count_correct(&self, binary_logits: &Tensor) -> Result<usize> {
        let logits = binary_logits.to_vec1::<f32>()?;
        Ok(logits
            .iter()
            .zip(&self.label_values)
            .filter(|(logit, label)| (**logit > 0.0) == (**label > 0.5))
            .count())
    }
}
