use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag::register;
use nfsond::config::{self, DatabaseConfig};
use nfsond::diag::Diag;
use nfsond::logger;
use nfsond::probe::Probes;
use nfsond::sink;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHOR:  &str = "PB";
const EMAIL:   &str = "pavel.bartos.pb@gmail.com";
const YEAR:    &str = "10/2024";

#[derive(Debug, Parser)]
#[command(name = "nfsond", about = "NetFlow v9 collector", disable_version_flag = true)]
struct Args {
    /// Show version and author information
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Display incoming packets and their acceptance status
    #[arg(short = 'd', long = "display")]
    display: bool,

    /// Path to the configuration file
    #[arg(long = "config", value_name = "PATH", default_value = "nf_sond.ini")]
    config: String,

    /// Check the database connection, initialize the schema and exit
    #[arg(long = "checkdb")]
    checkdb: bool,

    /// Append a hex dump of every received datagram to PATH
    #[arg(long = "diag", value_name = "PATH")]
    diag: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.version {
        println!("NetFlow Collector Version {}", VERSION);
        println!("Author: {}", AUTHOR);
        println!("Email: {}", EMAIL);
        println!("Year: {}", YEAR);
        return Ok(());
    }

    let config = config::load(&args.config)?;

    logger::init(config.syslog)?;

    info!("nfsond {} starting", VERSION);

    let diag = match &args.diag {
        Some(path) => {
            let diag = Diag::open(path)?;
            info!("diagnostic logging enabled, writing to {}", path);
            Some(Arc::new(diag))
        }
        None => None,
    };

    if args.checkdb {
        return checkdb(&config.database);
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    register(SIGTERM, shutdown.clone())?;
    register(SIGINT, shutdown.clone())?;

    let mut probes = Probes::new(shutdown);

    for probe in &config.probes {
        let sink = sink::open(&config.database)
            .with_context(|| format!("cannot open sink for probe {}", probe.name))?;
        probes.add(probe.clone(), sink, diag.clone(), args.display)?;
    }

    probes.join();

    info!("nfsond stopped");

    Ok(())
}

/// `--checkdb`: verify the backend is reachable, make sure the schema
/// exists, exit 0 on success and 1 on failure.
fn checkdb(config: &DatabaseConfig) -> Result<()> {
    let mut sink = sink::make(config);

    sink.health_check().context("database check failed")?;
    sink.open().context("database initialization failed")?;
    sink.close();

    println!("Database check completed successfully.");
    Ok(())
}
