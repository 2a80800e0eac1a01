use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::info;

use rustdefect::pipeline::cluster::{run_cluster_stage, run_clustering};
use rustdefect::pipeline::config::PipelineConfig;
use rustdefect::pipeline::preprocess::run_preprocess;
use rustdefect::pipeline::summary::RunSummary;
use rustdefect::Result;

use dfcore::model::point::BondFailure;

#[derive(Parser)]
#[command(
    name = "rustdefect",
    about = "Bond failure reconstruction and defect clustering for bonded-particle simulations",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse the particle and bond logs and write bonds_preprocessed.txt
    Preprocess {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        logs: LogArgs,
    },

    /// Cluster a preprocessed bond file per time window
    Cluster {
        #[command(flatten)]
        common: CommonArgs,
        /// Preprocessed bond file (default: <output>/bonds_preprocessed.txt)
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,
        /// Time point sidecar (default: time_points.txt next to the input)
        #[arg(long, value_name = "FILE")]
        time_points: Option<PathBuf>,
        #[command(flatten)]
        clustering: ClusterArgs,
    },

    /// Preprocess, then cluster
    Run {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        logs: LogArgs,
        #[command(flatten)]
        clustering: ClusterArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// JSON configuration file; flags given on the command line take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Worker threads (0 uses the global pool)
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Args)]
#[command(next_help_heading = "Logs and region of interest")]
struct LogArgs {
    /// Particle log
    #[arg(short, long, value_name = "FILE")]
    particles: Option<PathBuf>,

    /// Bond log
    #[arg(short, long, value_name = "FILE")]
    bonds: Option<PathBuf>,

    /// Sample radius, mm
    #[arg(long)]
    radius: Option<f64>,

    /// Sample half-height, mm
    #[arg(long)]
    height: Option<f64>,

    /// Bond length margin, mm
    #[arg(long)]
    bond_length: Option<f64>,
}

#[derive(Args)]
#[command(next_help_heading = "Clustering")]
struct ClusterArgs {
    /// Single-linkage distance threshold, mm
    #[arg(short, long)]
    distance: Option<f64>,

    /// Time window width, s
    #[arg(short, long)]
    step: Option<f64>,

    /// Accumulate failures from all earlier windows
    #[arg(long)]
    integral: bool,

    /// Write boundary point sets of the largest clusters
    #[arg(long)]
    show: bool,

    /// Points per clustering chunk (required unless set in the config file)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Number of largest clusters to flag per window
    #[arg(long)]
    top_clusters: Option<usize>,

    /// Wall-clock limit per window, s
    #[arg(long)]
    bucket_budget_secs: Option<f64>,
}

impl CommonArgs {
    fn load(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        Ok(config)
    }
}

impl LogArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(p) = &self.particles {
            config.particles = Some(p.clone());
        }
        if let Some(b) = &self.bonds {
            config.bonds = Some(b.clone());
        }
        if let Some(r) = self.radius {
            config.roi.sample_radius = r;
        }
        if let Some(h) = self.height {
            config.roi.sample_height = h;
        }
        if let Some(l) = self.bond_length {
            config.roi.bond_length = l;
        }
    }
}

impl ClusterArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(d) = self.distance {
            config.cluster.distance_threshold = d;
        }
        if let Some(s) = self.step {
            config.aggregation.step = s;
        }
        if let Some(c) = self.chunk_size {
            config.cluster.chunk_size = Some(c);
        }
        if let Some(n) = self.top_clusters {
            config.geometry.top_clusters = n;
        }
        if let Some(b) = self.bucket_budget_secs {
            config.bucket_time_budget_secs = Some(b);
        }
        config.aggregation.integral |= self.integral;
        config.show |= self.show;
    }
}

fn execute(command: Command) -> Result<()> {
    let mut summary = RunSummary::default();
    let output = match command {
        Command::Preprocess { common, logs } => {
            let mut config = common.load()?;
            logs.apply(&mut config);
            summary.preprocess = Some(run_preprocess(&config)?.summary);
            config.output
        }
        Command::Cluster { common, input, time_points, clustering } => {
            let mut config = common.load()?;
            clustering.apply(&mut config);
            if input.is_some() {
                config.preprocessed = input;
            }
            if time_points.is_some() {
                config.time_points = time_points;
            }
            summary.cluster = Some(run_cluster_stage(&config)?);
            config.output
        }
        Command::Run { common, logs, clustering } => {
            let mut config = common.load()?;
            logs.apply(&mut config);
            clustering.apply(&mut config);
            // fail on clustering settings before the logs are parsed
            config.validate_cluster()?;
            let preprocessed = run_preprocess(&config)?;
            let failures: Vec<BondFailure> = preprocessed.bonds.iter().map(BondFailure::from).collect();
            summary.cluster = Some(run_clustering(&failures, &preprocessed.time_points, &config)?);
            summary.preprocess = Some(preprocessed.summary);
            config.output
        }
    };
    let path = summary.write_json(&output)?;
    info!("summary written to {}", path.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
