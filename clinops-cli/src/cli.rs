use std::path::PathBuf;

use anyhow::Result;
use argh::FromArgs;

use crate::config::Config;
use crate::{generate, monitor, observability, simulate};

/// Operations toolkit for the clinical data warehouse.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Simulate(SimulateCommand),
    Generate(GenerateCommand),
    Costs(CostsCommand),
    Cdc(CdcCommand),
    Version(VersionCommand),
}

/// simulate concurrent dashboard users against the interactive warehouse
///
/// Opens patient dashboards in waves of concurrent sessions, refreshes the operational dashboard,
/// prints latency statistics against the SLA and saves every query execution as CSV.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "simulate")]
struct SimulateCommand {
    /// number of dashboards opened at the same time
    #[argh(option, short = 'w')]
    concurrency: Option<usize>,

    /// number of dashboard iterations
    #[argh(option, short = 'n')]
    iterations: Option<usize>,

    /// do not save the results as CSV
    #[argh(switch)]
    no_save: bool,
}

/// generate synthetic patients, encounters and lab results
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "generate")]
struct GenerateCommand {
    /// number of patients to generate
    #[argh(option, short = 'p')]
    patients: Option<usize>,

    /// seed of the random number generator
    #[argh(option, short = 's')]
    seed: Option<u64>,

    /// load the generated records into the raw CDC tables
    #[argh(switch)]
    load: bool,
}

/// report warehouse cost and cost anomalies
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "costs")]
struct CostsCommand {
    /// number of days in the per-warehouse breakdown
    #[argh(option, short = 'd')]
    days: Option<u32>,
}

/// report CDC stream and Dynamic Table status
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "cdc")]
struct CdcCommand {}

/// print the clinops version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

impl Command {
    /// Applies command line overrides on top of the loaded configuration.
    fn apply(&self, config: &mut Config) {
        match self {
            Command::Simulate(cmd) => {
                if let Some(concurrency) = cmd.concurrency {
                    config.simulation.concurrency = concurrency;
                }
                if let Some(iterations) = cmd.iterations {
                    config.simulation.dashboard_iterations = iterations;
                }
            }
            Command::Generate(cmd) => {
                if let Some(patients) = cmd.patients {
                    config.synth.patients = patients;
                }
                if let Some(seed) = cmd.seed {
                    config.synth.seed = seed;
                }
            }
            Command::Costs(cmd) => {
                if let Some(days) = cmd.days {
                    config.cost.days = days;
                }
            }
            Command::Cdc(_) | Command::Version(_) => {}
        }
    }
}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("clinops {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = Config::load(args.config.as_deref())?;
    args.command.apply(&mut config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("main-rt")
        .enable_all()
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    runtime.block_on(async move {
        match args.command {
            Command::Simulate(SimulateCommand { no_save, .. }) => {
                simulate::simulate(config, !no_save).await
            }
            Command::Generate(GenerateCommand { load, .. }) => {
                generate::generate(config, load).await
            }
            Command::Costs(_) => monitor::cost::costs(config).await,
            Command::Cdc(CdcCommand {}) => monitor::cdc::cdc(config).await,
            Command::Version(VersionCommand {}) => unreachable!(),
        }
    })
}
