//! Model-guided completion of a partial search.
//!
//! After a partial search, a model is trained on the measured configurations
//! of each kernel. It predicts the times of every configuration that was
//! never run, and only the best predictions are executed for real.

use crate::backend::ExecutionBackend;
use crate::error::TuneError;
use crate::kernel::KernelInfo;
use crate::result::TuningResult;
use crate::tuner::Tuner;
use kerneltune_models::{success_rate, ModelKind, ModelOptions};
use kerneltune_space::Configuration;
use ndarray::{s, Array1, Array2};
use std::collections::HashSet;
use tracing::{debug, info};

/// Relative margin used when reporting how many samples a model predicts well.
pub const SUCCESS_MARGIN: f64 = 0.1;

impl<B: ExecutionBackend> Tuner<B> {
    /// Trains a `kind` model per tuned kernel, predicts all unexplored
    /// configurations and runs the `top_k` with the lowest predicted time.
    ///
    /// The last `validation_fraction` of the measured samples is held out for
    /// validation. Every kernel is ranked before anything runs, and results
    /// are only appended once all confirmations succeed, so an error leaves
    /// the recorded results untouched. Returns the newly appended results.
    pub fn model_prediction(
        &mut self,
        kind: ModelKind,
        validation_fraction: f64,
        top_k: usize,
    ) -> Result<Vec<TuningResult>, TuneError> {
        let options = self
            .options
            .model
            .clone()
            .unwrap_or_else(|| kind.default_options());

        let mut ranked = Vec::new();
        for kernel in self.kernels.iter().filter(|k| !k.space.is_empty()) {
            let best = self.rank_kernel(kernel, kind, &options, validation_fraction, top_k)?;
            ranked.push((kernel.clone(), best));
        }

        let mut confirmed = Vec::new();
        for (kernel, best) in ranked {
            let total = best.len();
            for (step, (predicted, config)) in best.into_iter().enumerate() {
                debug!(kernel = %kernel.name, configuration = %config, predicted_ms = predicted, "testing prediction");
                confirmed.push(self.run_configuration(&kernel, &config, step, total)?);
            }
        }
        self.results.extend(confirmed.iter().cloned());
        Ok(confirmed)
    }

    /// The `top_k` unexplored configurations of a kernel with the lowest
    /// predicted time, paired with that prediction.
    fn rank_kernel(
        &self,
        kernel: &KernelInfo,
        kind: ModelKind,
        options: &ModelOptions,
        validation_fraction: f64,
        top_k: usize,
    ) -> Result<Vec<(f64, Configuration)>, TuneError> {
        let features = kernel.space.parameters().len();
        let (x, y) = self.samples(&kernel.name, features);
        let samples = y.len();
        let validation = (samples as f64 * validation_fraction.clamp(0.0, 1.0)).floor() as usize;
        let training = samples - validation;
        if training == 0 {
            return Err(TuneError::NoMeasurements(kernel.name.clone()));
        }
        info!(
            kernel = %kernel.name,
            model = %kind,
            training,
            validation,
            "training prediction model"
        );

        let mut model = kind.build(options, features)?;
        model.train(x.slice(s![..training, ..]), y.slice(s![..training]))?;
        if validation > 0 {
            let (vx, vy) = (x.slice(s![training.., ..]), y.slice(s![training..]));
            model.validate(vx, vy)?;
            let rate = success_rate(model.as_ref(), vx, vy, SUCCESS_MARGIN)?;
            info!(kernel = %kernel.name, success_rate = rate, "validation predictions within margin");
        }

        let explored: HashSet<&Configuration> = self
            .results
            .iter()
            .filter(|r| r.kernel_name == kernel.name)
            .map(|r| &r.configuration)
            .collect();
        let mut predictions = Vec::new();
        for config in kernel.configurations().iter() {
            if explored.contains(config) {
                continue;
            }
            let predicted = model.predict(features_of(config).view())?;
            predictions.push((predicted, config.clone()));
        }
        predictions.sort_by(|a, b| a.0.total_cmp(&b.0));
        predictions.truncate(top_k);
        Ok(predictions)
    }

    /// Correct, finite measurements of one kernel as a feature matrix and a
    /// time vector, in execution order.
    fn samples(&self, kernel_name: &str, features: usize) -> (Array2<f64>, Array1<f64>) {
        let measured: Vec<(&Configuration, f64)> = self
            .results
            .iter()
            .filter(|r| r.kernel_name == kernel_name)
            .filter_map(|r| r.valid_time().filter(|t| *t > 0.0).map(|t| (&r.configuration, t)))
            .collect();
        let x = Array2::from_shape_fn((measured.len(), features), |(i, j)| {
            measured[i]
                .0
                .settings()
                .get(j)
                .map_or(0.0, |s| s.value as f64)
        });
        let y = measured.iter().map(|(_, t)| *t).collect();
        (x, y)
    }
}

fn features_of(config: &Configuration) -> Array1<f64> {
    config.iter().map(|s| s.value as f64).collect()
}
