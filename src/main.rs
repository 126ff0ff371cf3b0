mod address;
mod conf;
mod demo;
mod device;
mod display;
mod error;
mod resolver;
mod shell;
mod topology;
mod types;

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::process::ExitCode;

#[derive(Parser)]
#[command(version, about = "simulates IPv6 Neighbor Discovery address resolution.", long_about = None)]
struct Cli {
    /// The location of a topology file to start from
    #[arg(short, long, value_name = "FILE")]
    conf: Option<String>,
    /// Start from the demo topology
    #[arg(long)]
    demo: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one address and exit, without the interactive shell
    Resolve {
        /// Name of the device sending the Neighbor Solicitation
        source: String,
        /// The IPv6 address to resolve
        target: String,
    },
}

fn prepare_topology(cli: &Cli) -> Result<topology::Topology, error::Error> {
    let mut top = topology::Topology::new();
    if cli.demo {
        demo::load_demo(&mut top)?;
    }
    if let Some(cfile) = &cli.conf {
        conf::load_topology(&mut top, cfile)?;
    }
    Ok(top)
}

fn run(cli: Cli) -> Result<bool, error::Error> {
    let top = prepare_topology(&cli)?;
    match &cli.command {
        Some(Commands::Resolve { source, target }) => {
            let res = resolver::resolve(&top, source, target)?;
            println!("{}", res);
            if res.is_resolved() {
                return Ok(true);
            }
            if let Err(e) = res.advertisement_path() {
                warn!("{}", e);
            }
            Ok(false)
        }
        None => {
            let stdin = std::io::stdin();
            let mut shell = shell::Shell::new(top);
            shell.run(stdin.lock(), &mut std::io::stdout())?;
            info!("Shell: left with {} devices", shell.topology().len());
            Ok(true)
        }
    }
}

fn main() -> ExitCode {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
