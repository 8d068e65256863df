//! The tuning loop.

use crate::backend::{ExecutionBackend, ExecutionOutcome, KernelLaunch, OutputBuffer};
use crate::error::TuneError;
use crate::kernel::KernelInfo;
use crate::result::{best_result, TuningResult};
use crate::verifier::{Verification, Verifier, DEFAULT_THRESHOLD};
use anyhow::bail;
use kerneltune_models::ModelOptions;
use kerneltune_search::{SearchMethod, SearchState, FAILED_TIME};
use kerneltune_space::{Configuration, ModifierKind, Setting};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunerOptions {
    pub search_method: SearchMethod,
    /// Largest summed absolute output difference still counted as correct.
    pub verification_threshold: f64,
    /// Receives `step;index;time` lines for every tuned kernel.
    pub search_log: Option<PathBuf>,
    /// Seeds every searcher; entropy when unset.
    pub seed: Option<u64>,
    /// Hyper-parameters for model prediction; per-model defaults when unset.
    pub model: Option<ModelOptions>,
}

impl Default for TunerOptions {
    fn default() -> Self {
        Self {
            search_method: SearchMethod::FullSearch,
            verification_threshold: DEFAULT_THRESHOLD,
            search_log: None,
            seed: None,
            model: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunePhase {
    Idle,
    RunningReference,
    GeneratingConfigs,
    Searching,
    Done,
}

pub struct Tuner<B> {
    backend: B,
    pub(crate) options: TunerOptions,
    pub(crate) kernels: Vec<KernelInfo>,
    reference: Option<KernelInfo>,
    reference_settings: Vec<Setting>,
    verifier: Verifier,
    pub(crate) results: Vec<TuningResult>,
    phase: TunePhase,
}

impl<B: ExecutionBackend> Tuner<B> {
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, TunerOptions::default())
    }

    pub fn with_options(backend: B, options: TunerOptions) -> Self {
        let verifier = Verifier::new(options.verification_threshold);
        Self {
            backend,
            options,
            kernels: Vec::new(),
            reference: None,
            reference_settings: Vec::new(),
            verifier,
            results: Vec::new(),
            phase: TunePhase::Idle,
        }
    }

    /// Registers a kernel to tune and returns its id.
    pub fn add_kernel(
        &mut self,
        source: impl Into<String>,
        name: impl Into<String>,
        global: Vec<usize>,
        local: Vec<usize>,
    ) -> usize {
        self.kernels
            .push(KernelInfo::new(name, source, global, local));
        self.kernels.len() - 1
    }

    /// Like [`add_kernel`](Self::add_kernel), concatenating the given source files.
    pub fn add_kernel_from_files<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        name: impl Into<String>,
        global: Vec<usize>,
        local: Vec<usize>,
    ) -> Result<usize, TuneError> {
        let source = load_sources(paths)?;
        Ok(self.add_kernel(source, name, global, local))
    }

    /// Sets the kernel whose outputs every tuned configuration is checked
    /// against. Replaces any previous reference.
    pub fn set_reference(
        &mut self,
        source: impl Into<String>,
        name: impl Into<String>,
        global: Vec<usize>,
        local: Vec<usize>,
    ) {
        self.reference = Some(KernelInfo::new(name, source, global, local));
    }

    pub fn set_reference_from_files<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        name: impl Into<String>,
        global: Vec<usize>,
        local: Vec<usize>,
    ) -> Result<(), TuneError> {
        let source = load_sources(paths)?;
        self.set_reference(source, name, global, local);
        Ok(())
    }

    /// Single-valued define injected into the reference kernel.
    pub fn add_parameter_reference(&mut self, name: impl Into<String>, value: usize) {
        self.reference_settings.push(Setting::new(name, value));
    }

    pub fn add_parameter(
        &mut self,
        id: usize,
        name: impl Into<String>,
        values: Vec<usize>,
    ) -> Result<(), TuneError> {
        self.kernel_mut(id)?.space.add_parameter(name, values)?;
        Ok(())
    }

    pub fn mul_global_size<S: Into<String>>(
        &mut self,
        id: usize,
        range: impl IntoIterator<Item = S>,
    ) -> Result<(), TuneError> {
        self.add_modifier(id, range, ModifierKind::GlobalMultiply)
    }

    pub fn div_global_size<S: Into<String>>(
        &mut self,
        id: usize,
        range: impl IntoIterator<Item = S>,
    ) -> Result<(), TuneError> {
        self.add_modifier(id, range, ModifierKind::GlobalDivide)
    }

    pub fn mul_local_size<S: Into<String>>(
        &mut self,
        id: usize,
        range: impl IntoIterator<Item = S>,
    ) -> Result<(), TuneError> {
        self.add_modifier(id, range, ModifierKind::LocalMultiply)
    }

    pub fn div_local_size<S: Into<String>>(
        &mut self,
        id: usize,
        range: impl IntoIterator<Item = S>,
    ) -> Result<(), TuneError> {
        self.add_modifier(id, range, ModifierKind::LocalDivide)
    }

    /// Adds a legality predicate over the named parameters, which must
    /// already be declared on the kernel.
    pub fn add_constraint<F, S>(
        &mut self,
        id: usize,
        predicate: F,
        parameters: impl IntoIterator<Item = S>,
    ) -> Result<(), TuneError>
    where
        F: Fn(&[usize]) -> bool + Send + Sync + 'static,
        S: Into<String>,
    {
        let names: Vec<String> = parameters.into_iter().map(Into::into).collect();
        let kernel = self.kernel_mut(id)?;
        ensure_declared(kernel, &names)?;
        kernel.space.add_constraint(predicate, names);
        Ok(())
    }

    pub fn set_local_memory_usage<F, S>(
        &mut self,
        id: usize,
        amount: F,
        parameters: impl IntoIterator<Item = S>,
    ) -> Result<(), TuneError>
    where
        F: Fn(&[usize]) -> u64 + Send + Sync + 'static,
        S: Into<String>,
    {
        let names: Vec<String> = parameters.into_iter().map(Into::into).collect();
        let kernel = self.kernel_mut(id)?;
        ensure_declared(kernel, &names)?;
        kernel.space.set_local_memory_usage(amount, names);
        Ok(())
    }

    pub fn use_full_search(&mut self) {
        self.options.search_method = SearchMethod::FullSearch;
    }

    pub fn use_random_search(&mut self, fraction: f64) {
        self.options.search_method = SearchMethod::RandomSearch { fraction };
    }

    pub fn use_annealing(&mut self, fraction: f64, max_temperature: f64) {
        self.options.search_method = SearchMethod::Annealing {
            fraction,
            max_temperature,
        };
    }

    pub fn use_pso(
        &mut self,
        fraction: f64,
        swarm_size: usize,
        influence_global: f64,
        influence_local: f64,
        influence_random: f64,
    ) {
        self.options.search_method = SearchMethod::Pso {
            fraction,
            swarm_size,
            influence_global,
            influence_local,
            influence_random,
        };
    }

    pub fn output_search_log(&mut self, path: impl Into<PathBuf>) {
        self.options.search_log = Some(path.into());
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.options.seed = Some(seed);
    }

    /// Runs the reference kernel (if any), then searches every registered
    /// kernel's configuration space.
    ///
    /// Configuration errors abort the run. Launch and verification failures
    /// are recorded as results and the search continues. Results of an
    /// earlier run are discarded.
    pub fn tune(&mut self) -> Result<(), TuneError> {
        self.results.clear();
        if let Some(path) = &self.options.search_log {
            File::create(path)?;
        }
        if self.reference.is_some() {
            self.enter(TunePhase::RunningReference);
            self.run_reference();
        }
        for id in 0..self.kernels.len() {
            self.tune_kernel(id)?;
        }
        self.enter(TunePhase::Idle);
        Ok(())
    }

    pub fn results(&self) -> &[TuningResult] {
        &self.results
    }

    /// Fastest correct result over all kernels.
    pub fn best_result(&self) -> Option<&TuningResult> {
        best_result(&self.results)
    }

    pub fn best_result_for(&self, kernel_name: &str) -> Option<&TuningResult> {
        best_result(self.results.iter().filter(|r| r.kernel_name == kernel_name))
    }

    pub fn kernels(&self) -> &[KernelInfo] {
        &self.kernels
    }

    pub fn kernel(&self, id: usize) -> Result<&KernelInfo, TuneError> {
        self.kernels.get(id).ok_or(TuneError::UnknownKernel(id))
    }

    pub fn phase(&self) -> TunePhase {
        self.phase
    }

    pub fn options(&self) -> &TunerOptions {
        &self.options
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn kernel_mut(&mut self, id: usize) -> Result<&mut KernelInfo, TuneError> {
        self.kernels.get_mut(id).ok_or(TuneError::UnknownKernel(id))
    }

    fn add_modifier<S: Into<String>>(
        &mut self,
        id: usize,
        range: impl IntoIterator<Item = S>,
        kind: ModifierKind,
    ) -> Result<(), TuneError> {
        let range: Vec<String> = range.into_iter().map(Into::into).collect();
        let kernel = self.kernel_mut(id)?;
        let named: Vec<String> = range.iter().filter(|n| !n.is_empty()).cloned().collect();
        ensure_declared(kernel, &named)?;
        kernel.space.add_modifier(range, kind);
        Ok(())
    }

    fn enter(&mut self, phase: TunePhase) {
        debug!(from = ?self.phase, to = ?phase, "tuner phase");
        self.phase = phase;
    }

    fn run_reference(&mut self) {
        let Some(reference) = self.reference.clone() else {
            return;
        };
        let defines = Configuration::new(self.reference_settings.clone());
        let launch = KernelLaunch {
            kernel_name: reference.name.clone(),
            source: defines.inject_into(&reference.source),
            geometry: reference.geometry.clone(),
        };
        info!(kernel = %launch.kernel_name, "running reference kernel");

        match self.reference_outputs(&launch) {
            Ok(outputs) => self.verifier.capture_reference(outputs),
            Err(err) => {
                self.verifier.clear_reference();
                error!(
                    kernel = %launch.kernel_name,
                    error = %err,
                    "reference kernel failed, continuing without verification"
                );
            }
        }
    }

    fn reference_outputs(
        &mut self,
        launch: &KernelLaunch,
    ) -> anyhow::Result<Vec<OutputBuffer>> {
        self.launch(launch)?;
        self.backend.read_outputs()
    }

    fn tune_kernel(&mut self, id: usize) -> Result<(), TuneError> {
        let kernel = self.kernel(id)?.clone();
        info!(
            kernel = %kernel.name,
            parameters = kernel.space.parameters().len(),
            "tuning kernel"
        );
        self.enter(TunePhase::GeneratingConfigs);

        if kernel.space.is_empty() {
            self.enter(TunePhase::Searching);
            let result = self.run_configuration(&kernel, &Configuration::empty(), 0, 1)?;
            self.results.push(result);
            self.enter(TunePhase::Done);
            return Ok(());
        }

        let configurations: Arc<[Configuration]> = kernel
            .space
            .enumerate(&kernel.geometry, self.backend.device())?
            .into();
        info!(
            kernel = %kernel.name,
            legal = configurations.len(),
            "generated configurations"
        );
        self.kernel_mut(id)?
            .set_configurations(Arc::clone(&configurations));

        self.enter(TunePhase::Searching);
        let mut searcher = self.options.search_method.build(
            configurations,
            kernel.space.parameters(),
            self.options.seed,
        );
        let total = searcher.num_configurations();
        debug!(kernel = %kernel.name, searcher = searcher.name(), total, "starting search");

        for step in 0..total {
            let config = searcher.configuration();
            let result = self.run_configuration(&kernel, &config, step, total)?;
            searcher.push_execution_time(result.valid_time().unwrap_or(FAILED_TIME));
            searcher.calculate_next_index();
            self.results.push(result);
        }

        if let Some(path) = &self.options.search_log {
            append_search_log(path, &kernel.name, searcher.state())?;
        }
        self.enter(TunePhase::Done);
        Ok(())
    }

    /// Launches one configuration and turns the outcome into a result.
    pub(crate) fn run_configuration(
        &mut self,
        kernel: &KernelInfo,
        config: &Configuration,
        step: usize,
        total: usize,
    ) -> Result<TuningResult, TuneError> {
        let geometry = kernel.space.geometry_for(&kernel.geometry, config)?;
        let launch = KernelLaunch {
            kernel_name: kernel.name.clone(),
            source: config.inject_into(&kernel.source),
            geometry,
        };

        let outcome = match self.launch(&launch) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    kernel = %kernel.name,
                    configuration = %config,
                    error = %err,
                    "kernel failed"
                );
                return Ok(TuningResult::failed(&kernel.name, config.clone()));
            }
        };

        let verification = self.verify();
        if let Verification::Failed { reason } = &verification {
            warn!(
                kernel = %kernel.name,
                configuration = %config,
                reason = %reason,
                "verification failed"
            );
        }
        info!(
            kernel = %kernel.name,
            step = step + 1,
            total,
            time_ms = outcome.elapsed_ms,
            "completed"
        );

        Ok(TuningResult {
            kernel_name: kernel.name.clone(),
            time_ms: Some(outcome.elapsed_ms),
            local_threads: outcome.local_threads,
            correct: verification.is_correct(),
            configuration: config.clone(),
        })
    }

    /// Checks the device limits, then runs the kernel.
    fn launch(&mut self, launch: &KernelLaunch) -> anyhow::Result<ExecutionOutcome> {
        if !self
            .backend
            .device()
            .is_local_work_size_valid(&launch.geometry.local)
        {
            bail!("invalid local work size {:?}", launch.geometry.local);
        }
        let bytes = self.backend.local_memory_usage(launch)?;
        if !self.backend.device().is_local_memory_valid(bytes) {
            bail!("using too much local memory ({bytes} bytes)");
        }
        self.backend.execute(launch)
    }

    fn verify(&mut self) -> Verification {
        if !self.verifier.has_reference() {
            return Verification::Skipped;
        }
        match self.backend.read_outputs() {
            Ok(outputs) => self.verifier.compare(&outputs),
            Err(err) => Verification::Failed {
                reason: format!("reading outputs: {err}"),
            },
        }
    }
}

fn ensure_declared(kernel: &KernelInfo, names: &[String]) -> Result<(), TuneError> {
    match names.iter().find(|n| !kernel.space.parameter_exists(n)) {
        Some(missing) => Err(TuneError::UnknownParameter {
            kernel: kernel.name.clone(),
            name: missing.clone(),
        }),
        None => Ok(()),
    }
}

fn load_sources<P: AsRef<Path>>(paths: &[P]) -> Result<String, TuneError> {
    let mut source = String::new();
    for path in paths {
        source.push_str(&fs::read_to_string(path)?);
    }
    Ok(source)
}

fn append_search_log(path: &Path, kernel: &str, state: &SearchState) -> Result<(), TuneError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut out = BufWriter::new(file);
    writeln!(out, "# {kernel}")?;
    state.write_log(&mut out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{define, ScriptedBackend};
    use anyhow::anyhow;
    use kerneltune_space::SpaceError;

    fn ts_of(launch: &KernelLaunch) -> usize {
        define(launch, "TS").unwrap_or(1)
    }

    fn gemm_tuner(backend: ScriptedBackend) -> Tuner<ScriptedBackend> {
        let mut tuner = Tuner::new(backend);
        let id = tuner.add_kernel("kernel void gemm() {}", "gemm", vec![256], vec![8]);
        tuner.add_parameter(id, "TS", vec![16, 32, 64]).unwrap();
        tuner
    }

    #[test]
    fn full_search_runs_every_configuration() {
        let mut tuner = gemm_tuner(ScriptedBackend::new(|l| Ok(128.0 / ts_of(l) as f64)));
        tuner.tune().unwrap();

        let visited: Vec<_> = tuner
            .results()
            .iter()
            .map(|r| r.configuration.value_of("TS").unwrap())
            .collect();
        assert_eq!(visited, vec![16, 32, 64]);
        assert!(tuner.results().iter().all(|r| r.correct));
        let best = tuner.best_result().unwrap();
        assert_eq!(best.configuration.value_of("TS"), Some(64));
        assert_eq!(best.time_ms, Some(2.0));
        assert_eq!(tuner.phase(), TunePhase::Idle);
        assert_eq!(tuner.kernel(0).unwrap().configurations().len(), 3);
    }

    #[test]
    fn tuning_again_replaces_previous_results() {
        let mut tuner = gemm_tuner(ScriptedBackend::new(|l| Ok(128.0 / ts_of(l) as f64)));
        tuner.tune().unwrap();
        tuner.tune().unwrap();

        assert_eq!(tuner.results().len(), 3);
        assert_eq!(tuner.backend().launches.len(), 6);
        assert_eq!(tuner.best_result().unwrap().configuration.value_of("TS"), Some(64));
    }

    #[test]
    fn defines_and_modifiers_reach_the_backend() {
        let mut tuner = gemm_tuner(ScriptedBackend::new(|_| Ok(1.0)));
        tuner.mul_local_size(0, ["TS"]).unwrap();
        tuner.tune().unwrap();

        let launch = &tuner.backend().launches[1];
        assert!(launch.source.starts_with("#define TS 32\n"));
        assert!(launch.source.ends_with("kernel void gemm() {}"));
        assert_eq!(launch.geometry.local, vec![256]);
        assert_eq!(tuner.results()[1].local_threads, 256);
    }

    #[test]
    fn kernel_without_parameters_runs_once() {
        let mut tuner = Tuner::new(ScriptedBackend::new(|_| Ok(4.0)));
        tuner.add_kernel("kernel void copy() {}", "copy", vec![64], vec![8]);
        tuner.tune().unwrap();

        assert_eq!(tuner.results().len(), 1);
        let result = &tuner.results()[0];
        assert!(result.configuration.is_empty());
        assert_eq!(result.time_ms, Some(4.0));
        assert_eq!(tuner.backend().launches[0].source, "kernel void copy() {}");
    }

    #[test]
    fn failed_launch_does_not_stop_the_search() {
        let mut tuner = gemm_tuner(ScriptedBackend::new(|l| match ts_of(l) {
            32 => Err(anyhow!("out of resources")),
            ts => Ok(ts as f64),
        }));
        tuner.tune().unwrap();

        let results = tuner.results();
        assert_eq!(results.len(), 3);
        assert!(results[1].is_failed());
        assert!(!results[1].correct);
        assert_eq!(tuner.best_result().unwrap().configuration.value_of("TS"), Some(16));
    }

    #[test]
    fn excessive_local_memory_fails_the_launch() {
        let mut backend = ScriptedBackend::new(|_| Ok(1.0));
        backend.local_bytes = 1 << 20;
        let mut tuner = gemm_tuner(backend);
        tuner.tune().unwrap();

        assert!(tuner.results().iter().all(TuningResult::is_failed));
        assert!(tuner.backend().launches.is_empty());
        assert!(tuner.best_result().is_none());
    }

    #[test]
    fn verification_mismatch_keeps_the_time() {
        let backend = ScriptedBackend::new(|l| Ok(100.0 / ts_of(l) as f64)).with_outputs(|l| {
            let value = if ts_of(l) == 64 { 2.0 } else { 1.0 };
            vec![OutputBuffer::Float(vec![value; 4])]
        });
        let mut tuner = gemm_tuner(backend);
        tuner.set_reference("kernel void gemm_ref() {}", "gemm_ref", vec![256], vec![8]);
        tuner.tune().unwrap();

        assert!(tuner.verifier().has_reference());
        let results = tuner.results();
        assert!(results[0].correct && results[1].correct);
        assert!(!results[2].correct);
        assert_eq!(results[2].time_ms, Some(100.0 / 64.0));
        assert_eq!(tuner.best_result().unwrap().configuration.value_of("TS"), Some(32));
    }

    #[test]
    fn reference_failure_disables_verification() {
        let backend = ScriptedBackend::new(|l| {
            if l.kernel_name == "gemm_ref" {
                Err(anyhow!("does not compile"))
            } else {
                Ok(1.0)
            }
        });
        let mut tuner = gemm_tuner(backend);
        tuner.set_reference("", "gemm_ref", vec![256], vec![8]);
        tuner.tune().unwrap();

        assert!(!tuner.verifier().has_reference());
        assert_eq!(tuner.results().len(), 3);
        assert!(tuner.results().iter().all(|r| r.correct));
    }

    #[test]
    fn reference_defines_are_injected() {
        let mut tuner = gemm_tuner(ScriptedBackend::new(|_| Ok(1.0)));
        tuner.set_reference("ref", "gemm_ref", vec![256], vec![8]);
        tuner.add_parameter_reference("TS", 1);
        tuner.tune().unwrap();

        assert_eq!(tuner.backend().launches[0].source, "#define TS 1\nref");
    }

    #[test]
    fn registration_checks_ids_and_names() {
        let mut tuner = gemm_tuner(ScriptedBackend::new(|_| Ok(1.0)));
        assert!(matches!(
            tuner.add_parameter(7, "X", vec![1]),
            Err(TuneError::UnknownKernel(7))
        ));
        assert!(matches!(
            tuner.add_constraint(0, |v| v[0] > 1, ["WPT"]),
            Err(TuneError::UnknownParameter { .. })
        ));
        assert!(matches!(
            tuner.div_global_size(0, ["TS", "WPT"]),
            Err(TuneError::UnknownParameter { .. })
        ));
        assert!(tuner.mul_global_size(0, ["", "TS"]).is_ok());
        assert!(matches!(
            tuner.add_parameter(0, "TS", vec![8]),
            Err(TuneError::Space(SpaceError::DuplicateParameter(_)))
        ));
    }

    #[test]
    fn constraints_limit_the_explored_space() {
        let mut tuner = Tuner::new(ScriptedBackend::new(|_| Ok(1.0)));
        let id = tuner.add_kernel("", "tiles", vec![64], vec![1]);
        tuner.add_parameter(id, "TS1", vec![8, 16]).unwrap();
        tuner.add_parameter(id, "TS2", vec![8, 16]).unwrap();
        tuner.add_constraint(id, |v| v[1] <= v[0], ["TS1", "TS2"]).unwrap();
        tuner.tune().unwrap();

        assert_eq!(tuner.results().len(), 3);
        assert!(tuner.results().iter().all(|r| {
            r.configuration.value_of("TS2") <= r.configuration.value_of("TS1")
        }));
    }

    #[test]
    fn random_search_writes_the_search_log() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut tuner = gemm_tuner(ScriptedBackend::new(|l| Ok(ts_of(l) as f64)));
        tuner.use_random_search(1.0);
        tuner.set_seed(11);
        tuner.output_search_log(file.path());
        tuner.tune().unwrap();

        assert_eq!(tuner.results().len(), 3);
        let log = std::fs::read_to_string(file.path()).unwrap();
        let mut lines = log.lines();
        assert_eq!(lines.next(), Some("# gemm"));
        assert_eq!(lines.count(), 3);
    }
}
