use anyhow::{Context, Result};
use clap::{arg, value_parser, ArgMatches, Command};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use traffic_signaling::{
    evaluate, load_network, load_schedule, write_schedule, Network, Schedule, Simulation,
    TabooConfig, TabooSearch,
};

fn cli() -> Command {
    Command::new("traffic-signaling")
        .about("Optimises the traffic light schedule of a road network")
        .arg(arg!(<NETWORK> "The network description").value_parser(value_parser!(PathBuf)))
        .arg(
            arg!(--schedule <PATH> "Score this schedule instead of searching for a new one")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(--config <PATH> "A JSON file with search options")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(arg!(--iterations <N> "Number of search rounds").value_parser(value_parser!(usize)))
        .arg(
            arg!(--mutations <N> "Candidates proposed per iteration")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            arg!(--"max-worse-jump" <FRACTION> "Tolerated regression, as a fraction of the initial score")
                .value_parser(value_parser!(f64)),
        )
        .arg(arg!(--seed <SEED> "Random seed").value_parser(value_parser!(u64)))
        .arg(
            arg!(--"time-limit" <SECS> "Stop searching after this many seconds")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            arg!(-o --output <PATH> "Where to write the schedule")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(--frames <PATH> "Write the simulation of the schedule to this file, one JSON frame per line")
                .value_parser(value_parser!(PathBuf)),
        )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let matches = cli().get_matches();

    let network_path = matches
        .get_one::<PathBuf>("NETWORK")
        .context("no network given")?;
    let network = load_network(network_path)
        .with_context(|| format!("failed to load network {}", network_path.display()))?;

    let schedule = match matches.get_one::<PathBuf>("schedule") {
        Some(path) => {
            let schedule = load_schedule(&network, path)
                .with_context(|| format!("failed to load schedule {}", path.display()))?;
            println!("Score: {}", evaluate(&network, &schedule)?);
            schedule
        }
        None => {
            let config = search_config(&matches)?;
            let start = Instant::now();
            let outcome = TabooSearch::new(&network, config).run()?;
            println!(
                "Score: {} (from {}) after {} iterations in {:?}{}",
                outcome.score,
                outcome.baseline,
                outcome.history.len(),
                start.elapsed(),
                if outcome.timed_out { ", time limit reached" } else { "" }
            );
            outcome.schedule
        }
    };

    if let Some(path) = matches.get_one::<PathBuf>("output") {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        write_schedule(&network, &schedule, BufWriter::new(file))?;
    }
    if let Some(path) = matches.get_one::<PathBuf>("frames") {
        write_frames(&network, &schedule, path)?;
    }

    Ok(())
}

/// Reads the config file, if any, then applies the command line overrides.
fn search_config(matches: &ArgMatches) -> Result<TabooConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
            serde_json::from_reader(file)
                .with_context(|| format!("invalid search config {}", path.display()))?
        }
        None => TabooConfig::default(),
    };
    if let Some(iterations) = matches.get_one::<usize>("iterations") {
        config.iterations = *iterations;
    }
    if let Some(mutations) = matches.get_one::<usize>("mutations") {
        config.mutations_per_iteration = *mutations;
    }
    if let Some(fraction) = matches.get_one::<f64>("max-worse-jump") {
        config.max_worse_jump_percentage = *fraction;
    }
    if let Some(seed) = matches.get_one::<u64>("seed") {
        config.random_seed = Some(*seed);
    }
    if let Some(secs) = matches.get_one::<f64>("time-limit") {
        config.time_limit_secs = Some(*secs);
    }
    anyhow::ensure!(
        config.mutations_per_iteration > 0,
        "at least one mutation per iteration is required"
    );
    if let Some(secs) = config.time_limit_secs {
        anyhow::ensure!(
            secs.is_finite() && secs >= 0.0,
            "the time limit must be a non-negative number of seconds, got {}",
            secs
        );
    }
    Ok(config)
}

fn write_frames(network: &Network, schedule: &Schedule, path: &Path) -> Result<()> {
    let mut out = BufWriter::new(
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
    );
    let mut sim = Simulation::new(network, schedule)?;
    while !sim.is_finished() {
        serde_json::to_writer(&mut out, &sim.frame())?;
        writeln!(out)?;
        sim.step();
    }
    serde_json::to_writer(&mut out, &sim.frame())?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
