//! Random search over the space of a [`MetaModelGraph`].
use std::time::Instant;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use layer_graph::Model;
use crate::error::{MetaModelError, Result};
use crate::meta_models::{MetaModel, MetaModelGraph};
use crate::space::{sample_space, Assignment};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum OptimizeDirection {
    Minimize,
    Maximize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Number of sampled architectures
    pub trials: usize,
    /// Scores averaged per architecture
    pub holdouts: usize,
    pub direction: OptimizeDirection,
    /// Random seed; `None` draws one from the OS
    pub seed: Option<u64>
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            trials: 10,
            holdouts: 1,
            direction: OptimizeDirection::Minimize,
            seed: Some(42),
        }
    }
}

impl TunerConfig {
    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    pub fn with_holdouts(mut self, holdouts: usize) -> Self {
        self.holdouts = holdouts;
        self
    }

    pub fn with_direction(mut self, direction: OptimizeDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(MetaModelError::InvalidTunerConfiguration("at least one trial is required".to_string()));
        }
        if self.holdouts == 0 {
            return Err(MetaModelError::InvalidTunerConfiguration("at least one holdout is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub trial_id: usize,
    pub assignment: Assignment,
    pub holdout_scores: Vec<f64>,
    /// Mean of the holdout scores
    pub score: f64,
    pub parameter_count: usize,
    pub duration_secs: f64
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Study {
    pub trials: Vec<Trial>,
    pub best_trial_idx: Option<usize>,
    pub direction: OptimizeDirection
}

impl Study {
    pub fn new(direction: OptimizeDirection) -> Self {
        Self {
            trials: Vec::new(),
            best_trial_idx: None,
            direction,
        }
    }

    pub fn best_trial(&self) -> Option<&Trial> {
        self.best_trial_idx.and_then(|idx| self.trials.get(idx))
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_trial().map(|t| t.score)
    }

    pub fn best_assignment(&self) -> Option<&Assignment> {
        self.best_trial().map(|t| &t.assignment)
    }

    /// Records a trial; scores that are NaN never become the best.
    pub fn add_trial(&mut self, trial: Trial) {
        let idx = self.trials.len();
        let is_better = !trial.score.is_nan()
            && match self.best_score() {
                None => true,
                Some(best) => match self.direction {
                    OptimizeDirection::Minimize => trial.score < best,
                    OptimizeDirection::Maximize => trial.score > best,
                },
            };
        if is_better {
            self.best_trial_idx = Some(idx);
        }
        self.trials.push(trial);
    }
}

pub struct RandomSearchTuner {
    config: TunerConfig
}

impl RandomSearchTuner {
    pub fn new(config: TunerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Samples, builds and scores `trials` architectures.
    ///
    /// `score` is called once per holdout with the built model and the
    /// holdout index.
    pub fn tune<M, F>(&self, meta_model: &mut MetaModelGraph<M>, mut score: F) -> Result<Study>
    where
        M: MetaModel,
        F: FnMut(&Model, usize) -> f64,
    {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let space = meta_model.space()?;
        log::info!(
            "Tuning {} over {} parameter(s) for {} trial(s)",
            meta_model.model().name(),
            space.len(),
            self.config.trials
        );
        let mut study = Study::new(self.config.direction);
        for trial_id in 0..self.config.trials {
            let start = Instant::now();
            let assignment = sample_space(&space, &mut rng)?;
            let model = meta_model.build(&assignment)?;
            let holdout_scores: Vec<f64> = (0..self.config.holdouts).map(|holdout| score(&model, holdout)).collect();
            let mean = holdout_scores.iter().sum::<f64>() / holdout_scores.len() as f64;
            log::info!(
                "Trial {}: score {:.6}, {} layer(s), {} parameter(s)",
                trial_id,
                mean,
                model.layer_count(),
                model.parameter_count()
            );
            study.add_trial(Trial {
                trial_id,
                assignment,
                holdout_scores,
                score: mean,
                parameter_count: model.parameter_count(),
                duration_secs: start.elapsed().as_secs_f64(),
            });
        }
        if let Some(best) = study.best_trial() {
            log::info!("Best trial {} with score {:.6}", best.trial_id, best.score);
        }
        Ok(study)
    }
}
