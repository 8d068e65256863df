//! CLI wiring for kerneltune.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use kerneltune_autotune::{ConsoleTags, ExecutionBackend, Tuner, TunerOptions, TuningReport, DEFAULT_THRESHOLD};
use kerneltune_backend_cpu::{CpuBackend, CpuOptions, KernelRegistry, MatmulProblem};
use kerneltune_models::{ModelKind, ModelOptions};
use kerneltune_search::SearchMethod;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "kerneltune", about = "Autotuner for compute kernels")]
pub struct Cli {
    /// Seed for searchers and prediction models; random when omitted.
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the legal tiled-matmul configurations for a problem size.
    Space {
        #[command(flatten)]
        problem: ProblemArgs,
    },
    /// Tune the tiled matmul host kernel against the reference matmul.
    TuneMatmul {
        #[command(flatten)]
        problem: ProblemArgs,
        #[command(flatten)]
        search: SearchArgs,
        #[arg(long, default_value_t = 1)]
        warmup: usize,
        #[arg(long, default_value_t = 3)]
        runs: usize,
        /// Largest summed absolute output difference accepted as correct.
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
        /// Train a model on the searched results and run its best predictions.
        #[arg(long)]
        predict: Option<ModelKind>,
        #[arg(long, default_value_t = 0.2)]
        validation_fraction: f64,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
        #[arg(long)]
        search_log: Option<PathBuf>,
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        json: Option<PathBuf>,
        /// Print report tags without ANSI colours.
        #[arg(long, default_value_t = false)]
        plain: bool,
    },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct ProblemArgs {
    #[arg(long, default_value_t = 256)]
    pub m: usize,
    #[arg(long, default_value_t = 256)]
    pub n: usize,
    #[arg(long, default_value_t = 256)]
    pub k: usize,
}

impl From<ProblemArgs> for MatmulProblem {
    fn from(value: ProblemArgs) -> Self {
        MatmulProblem::new(value.m, value.n, value.k)
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchArg {
    Full,
    Random,
    Annealing,
    Pso,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[arg(long, value_enum, default_value = "full")]
    pub search: SearchArg,
    /// Share of the legal configurations a partial search explores.
    #[arg(long, default_value_t = 0.25)]
    pub fraction: f64,
    #[arg(long, default_value_t = 4.0)]
    pub max_temperature: f64,
    #[arg(long, default_value_t = 3)]
    pub swarm_size: usize,
    #[arg(long, default_value_t = 0.1)]
    pub influence_global: f64,
    #[arg(long, default_value_t = 0.3)]
    pub influence_local: f64,
    #[arg(long, default_value_t = 0.6)]
    pub influence_random: f64,
}

impl SearchArgs {
    pub fn method(&self) -> SearchMethod {
        match self.search {
            SearchArg::Full => SearchMethod::FullSearch,
            SearchArg::Random => SearchMethod::RandomSearch {
                fraction: self.fraction,
            },
            SearchArg::Annealing => SearchMethod::Annealing {
                fraction: self.fraction,
                max_temperature: self.max_temperature,
            },
            SearchArg::Pso => SearchMethod::Pso {
                fraction: self.fraction,
                swarm_size: self.swarm_size,
                influence_global: self.influence_global,
                influence_local: self.influence_local,
                influence_random: self.influence_random,
            },
        }
    }
}

/// Registers the tiled matmul and its reference on a host backend.
///
/// Each work-group computes one `TILE_M x TILE_N` output tile, so the local
/// size is the tile and the tiles must divide the output.
pub fn matmul_tuner(
    problem: MatmulProblem,
    cpu: CpuOptions,
    options: TunerOptions,
) -> Result<Tuner<CpuBackend>> {
    let backend =
        CpuBackend::new(KernelRegistry::with_matmul_kernels(), problem.inputs()).with_options(cpu);
    let mut tuner = Tuner::with_options(backend, options);
    let global = vec![problem.m, problem.n];

    tuner.set_reference("", "matmul_reference", global.clone(), vec![1, 1]);
    let id = tuner.add_kernel("", "matmul_tiled", global, vec![1, 1]);
    tuner.add_parameter(id, "TILE_M", vec![8, 16, 32, 64])?;
    tuner.add_parameter(id, "TILE_N", vec![8, 16, 32, 64])?;
    tuner.add_parameter(id, "TILE_K", vec![8, 16, 32])?;
    tuner.add_parameter(id, "VW", vec![1, 2, 4, 8])?;
    tuner.mul_local_size(id, ["TILE_M", "TILE_N"])?;

    let (m, n) = (problem.m, problem.n);
    tuner.add_constraint(id, move |v| m % v[0] == 0 && n % v[1] == 0, ["TILE_M", "TILE_N"])?;
    tuner.add_constraint(id, |v| v[0] % v[1] == 0, ["TILE_K", "VW"])?;
    tuner.set_local_memory_usage(
        id,
        |v| ((v[0] * v[2] + v[2] * v[1]) * 4) as u64,
        ["TILE_M", "TILE_N", "TILE_K"],
    )?;
    Ok(tuner)
}

pub fn run_cli(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let Cli { seed, command } = cli;
    match command {
        Command::Space { problem } => {
            let tuner = matmul_tuner(problem.into(), CpuOptions::default(), TunerOptions::default())?;
            let kernel = tuner.kernel(0)?;
            let configurations = kernel
                .space
                .enumerate(&kernel.geometry, tuner.backend().device())?;
            for configuration in &configurations {
                println!("{configuration}");
            }
            info!(legal = configurations.len(), "enumerated configurations");
        }
        Command::TuneMatmul {
            problem,
            search,
            warmup,
            runs,
            threshold,
            predict,
            validation_fraction,
            top_k,
            search_log,
            csv,
            json,
            plain,
        } => {
            let method = search.method();
            let options = TunerOptions {
                search_method: method.clone(),
                verification_threshold: threshold,
                search_log,
                seed,
                model: predict.map(|kind| ModelOptions {
                    seed,
                    ..kind.default_options()
                }),
            };
            let cpu = CpuOptions {
                warmup_runs: warmup,
                runs,
            };
            let mut tuner = matmul_tuner(problem.into(), cpu, options)?;
            tuner.tune()?;

            if let Some(kind) = predict {
                if method.is_partial() {
                    let confirmed = tuner.model_prediction(kind, validation_fraction, top_k)?;
                    info!(model = %kind, confirmed = confirmed.len(), "tested model predictions");
                } else {
                    warn!("full search explored every configuration; skipping prediction");
                }
            }

            let problem = MatmulProblem::from(problem);
            let report = TuningReport::new(tuner.backend().device_info().name.clone(), tuner.results())
                .with_description("M", problem.m.to_string())
                .with_description("N", problem.n.to_string())
                .with_description("K", problem.k.to_string());
            let tags = if plain {
                ConsoleTags::plain()
            } else {
                ConsoleTags::colored()
            };

            let stdout = io::stdout();
            let mut out = stdout.lock();
            if let Some(best_ms) = report.print(&tags, &mut out)? {
                info!(
                    time_ms = best_ms,
                    gflops = problem.flops() / (best_ms * 1.0e6),
                    "best configuration"
                );
            }
            if let Some(entry) = report.database_entry() {
                println!("{entry}");
            }

            if let Some(path) = csv {
                report.save_csv(&path)?;
                info!(path = %path.display(), "wrote csv");
            }
            if let Some(path) = json {
                report.save_json(&path)?;
                info!(path = %path.display(), "wrote json");
            }
        }
    }
    Ok(())
}
