//! Run example:
//!
//! cargo run --release -- demos/cylinder2d.yaml
//!
//! With mpi:
//!
//! cargo mpirun --np 2 --bin rustibm --release --features mpi -- demos/cylinder2d.yaml
use clap::Parser;
use rustibm::config::SimulationConfig;
use rustibm::mpi::Communicator;
use rustibm::navier_stokes::TairaColonius;
use rustibm::{integrate, Result};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Immersed boundary projection solver
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Simulation configuration (yaml)
    config: PathBuf,

    /// Verbosity: error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: Level,

    /// Continue from a restart file (feature `hdf5`), defaults to the
    /// restart file of `start_step` if that is set
    #[arg(long)]
    restart: Option<PathBuf>,
}

fn run<const N: usize>(comm: &dyn Communicator, config: &SimulationConfig, args: &Args) -> Result<()> {
    let mut navier = TairaColonius::<N>::from_config(comm, config)?;
    let start_step = config.parameters.start_step;
    let restart = args.restart.clone().or_else(|| {
        (start_step > 0).then(|| config.output.directory.join(format!("restart{:07}.h5", start_step)))
    });
    if let Some(restart) = &restart {
        #[cfg(feature = "hdf5")]
        navier.read_restart(&restart.to_string_lossy())?;
        #[cfg(not(feature = "hdf5"))]
        return Err(rustibm::Error::Config(format!(
            "cannot read {:?}, built without hdf5",
            restart
        )));
    }
    navier.open_iteration_log()?;
    let params = &config.parameters;
    let last = navier.step + params.nt;
    integrate(&mut navier, last, Some(params.nsave))
}

fn main() {
    let args = Args::parse();
    let subscriber = FmtSubscriber::builder().with_max_level(args.log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {}", e);
    }
    if let Err(e) = start(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn start(args: &Args) -> Result<()> {
    let config = SimulationConfig::load(&args.config)?;
    #[cfg(feature = "mpi")]
    let comm = rustibm::mpi::MpiWorld::initialize()?;
    #[cfg(not(feature = "mpi"))]
    let comm = rustibm::mpi::Serial;
    if comm.rank() == 0 {
        info!("{} ranks, configuration {:?}", comm.size(), args.config);
    }
    match config.dimension() {
        2 => run::<2>(&comm, &config, args),
        3 => run::<3>(&comm, &config, args),
        d => Err(rustibm::Error::Config(format!("unsupported dimension {}", d))),
    }
}
