//! Model initialization and evaluation loop
//!
//! Parameter update rules are not implemented here; a `Solver` prepares a
//! model's parameters and measures loss and accuracy over its data
//! iterators.

use rand::Rng;
use tracing::{debug, info};

use crate::array::ArrayFactory;
use crate::data::BatchIter;
use crate::dtype::DType;
use crate::error::{HybridError, Result};
use crate::layers::accuracy;
use crate::model::{InitRule, Model};

#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub init_rule: InitRule,
    pub dtype: DType,
    /// Log every `print_every` batches when `verbose`
    pub print_every: usize,
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            init_rule: InitRule::Xavier,
            dtype: DType::F32,
            print_every: 20,
            verbose: true,
        }
    }
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_init_rule(mut self, init_rule: InitRule) -> Self {
        self.init_rule = init_rule;
        self
    }

    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn with_print_every(mut self, print_every: usize) -> Self {
        self.print_every = print_every;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Model data must use a float dtype.
    ///
    /// # Errors
    /// `InvalidParameter` for integer and bool dtypes, whose casts truncate
    /// centered inputs and initial weights to zero.
    pub fn validate(&self) -> Result<()> {
        if !self.dtype.is_float() {
            return Err(HybridError::InvalidParameter(format!(
                "model dtype must be a float type, got {}",
                self.dtype
            )));
        }
        Ok(())
    }
}

/// Which iterator to evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalReport {
    pub loss: f32,
    pub accuracy: f32,
    /// Samples counted, padding excluded
    pub samples: usize,
    pub batches: usize,
}

pub struct Solver<M: Model> {
    model: M,
    train_iter: BatchIter,
    test_iter: BatchIter,
    config: SolverConfig,
}

impl<M: Model> Solver<M> {
    pub fn new(
        model: M,
        train_iter: BatchIter,
        test_iter: BatchIter,
        config: SolverConfig,
    ) -> Self {
        Solver {
            model,
            train_iter,
            test_iter,
            config,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Initialize every declared model parameter
    pub fn init<R: Rng + ?Sized>(&mut self, factory: &ArrayFactory, rng: &mut R) -> Result<()> {
        self.config.validate()?;
        let SolverConfig {
            init_rule, dtype, ..
        } = self.config;
        self.model
            .base_mut()
            .init_params(factory, init_rule, dtype, rng)?;
        info!(
            backend = factory.backend(),
            params = self.model.base().param_configs().len(),
            rule = ?init_rule,
            "initialized model"
        );
        Ok(())
    }

    /// Mean loss and accuracy over one pass of the chosen iterator
    ///
    /// Padding rows of the final batch are left out of both numbers.
    pub fn evaluate<R: Rng + ?Sized>(&mut self, split: Split, rng: &mut R) -> Result<EvalReport> {
        let iter = match split {
            Split::Train => &mut self.train_iter,
            Split::Test => &mut self.test_iter,
        };
        iter.reset(rng);

        let mut loss_sum = 0.0;
        let mut correct = 0.0;
        let mut samples = 0;
        let mut batches = 0;
        for batch in iter {
            let batch = batch?;
            let scores = self.model.forward(&batch.data)?;
            let valid = batch.valid();
            let scores = scores.rows(0, valid)?;
            let labels = &batch.labels[..valid];

            let loss = self.model.loss(&scores, labels)?;
            let acc = accuracy(&scores, labels)?;
            loss_sum += loss * valid as f32;
            correct += acc * valid as f32;
            samples += valid;
            batches += 1;

            if self.config.verbose
                && self.config.print_every > 0
                && batches % self.config.print_every == 0
            {
                info!(?split, batch = batches, loss, accuracy = acc, "evaluating");
            } else {
                debug!(?split, batch = batches, loss, "batch");
            }
        }

        let denom = samples.max(1) as f32;
        let report = EvalReport {
            loss: loss_sum / denom,
            accuracy: correct / denom,
            samples,
            batches,
        };
        info!(
            ?split,
            loss = report.loss,
            accuracy = report.accuracy,
            samples,
            "evaluation done"
        );
        Ok(report)
    }
}
