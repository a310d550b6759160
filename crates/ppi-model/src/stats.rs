//! Step-wise training metrics in a struct-of-arrays layout.

/// Training or validation phase of a recorded step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrainingPhase {
    Train,
    Validation,
}

/// Per-epoch metrics recorded during model fitting.
#[derive(Debug, Clone, Default)]
pub struct TrainingMetrics {
    pub epochs: Vec<usize>,
    pub phases: Vec<TrainingPhase>,
    pub losses: Vec<f32>,
    pub accuracies: Vec<f32>,
}

impl TrainingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, epoch: usize, phase: TrainingPhase, loss: f32, accuracy: f32) {
        self.epochs.push(epoch);
        self.phases.push(phase);
        self.losses.push(loss);
        self.accuracies.push(accuracy);
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Loss and accuracy of the last recorded step in the given phase.
    pub fn last_for_phase(&self, phase: TrainingPhase) -> Option<(f32, f32)> {
        self.phases
            .iter()
            .rposition(|p| *p == phase)
            .map(|i| (self.losses[i], self.accuracies[i]))
    }

    /// (epoch, train_loss, validation_loss) rows for reporting; validation
    /// is `None` for epochs without a validation pass.
    pub fn loss_by_epoch(&self) -> Vec<(usize, f32, Option<f32>)> {
        let mut epochs: Vec<usize> = self.epochs.clone();
        epochs.sort_unstable();
        epochs.dedup();

        epochs
            .into_iter()
            .map(|epoch| {
                let find = |phase: TrainingPhase| {
                    (0..self.len())
                        .find(|&i| self.epochs[i] == epoch && self.phases[i] == phase)
                        .map(|i| self.losses[i])
                };
                let train = find(TrainingPhase::Train).unwrap_or(f32::NAN);
                (epoch, train, find(TrainingPhase::Validation))
            })
            .collect()
    }
}
