//! `sedrisk` - query the sediment ecological risk network from the command line.
//!
//! ## Commands
//!
//! - `build`: validate the reference network and save it as JSON
//! - `query`: print posterior tables for some variables given evidence
//! - `predict`: answer a JSON request, as the prediction service would
//! - `status`: report whether a model can be served

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use sedrisk::config::{EngineConfig, DEFAULT_MAX_FACTOR_ENTRIES};
use sedrisk::model::sediment;
use sedrisk::serve::Service;
use sedrisk::{persist, DirectedModel, Evidence, VariableElimination};

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sedrisk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Exact inference on a Bayesian network for sediment ecological risk", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EngineArgs {
    /// Largest intermediate table, in entries, a query may build
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_FACTOR_ENTRIES)]
    max_factor_entries: usize,

    /// Keep variables that cannot influence the query instead of pruning them
    #[arg(long, global = true)]
    keep_barren: bool,
}

impl From<&EngineArgs> for EngineConfig {
    fn from(args: &EngineArgs) -> Self {
        EngineConfig {
            max_factor_entries: args.max_factor_entries,
            prune_barren: !args.keep_barren,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the reference network and save it as JSON
    Build {
        /// Where to write the model
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Print the posterior of some variables given evidence
    Query {
        /// Saved model to query (the built-in reference network if omitted)
        #[arg(short, long, env = "SEDRISK_MODEL")]
        model: Option<PathBuf>,

        /// Variable to compute the posterior of; repeat for several
        #[arg(long = "var", required = true)]
        vars: Vec<String>,

        /// Observation as Name=State; repeat for several
        #[arg(short, long, value_parser = parse_observation)]
        evidence: Vec<(String, String)>,

        /// Print one joint table instead of one table per variable
        #[arg(long)]
        joint: bool,
    },

    /// Answer a JSON query request and print the JSON response
    Predict {
        /// Saved model to serve (the built-in reference network if omitted)
        #[arg(short, long, env = "SEDRISK_MODEL")]
        model: Option<PathBuf>,

        /// File holding the request (stdin if omitted)
        #[arg(short, long)]
        request: Option<PathBuf>,
    },

    /// Report whether a model can be served
    Status {
        /// Saved model to check (the built-in reference network if omitted)
        #[arg(short, long, env = "SEDRISK_MODEL")]
        model: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(level);

    let config = EngineConfig::from(&cli.engine);
    debug!(?config, "engine configuration");

    match cli.command {
        Commands::Build { out } => cmd_build(&out),
        Commands::Query { model, vars, evidence, joint } => {
            cmd_query(model.as_deref(), &vars, &evidence, joint, config)
        }
        Commands::Predict { model, request } => cmd_predict(model.as_deref(), request.as_deref(), config),
        Commands::Status { model } => cmd_status(model.as_deref(), config),
    }
}

/// Logs go to stderr so stdout only carries results. `SEDRISK_LOG` overrides `level`.
fn init_tracing(level: Level) {
    let env_filter = EnvFilter::try_from_env("SEDRISK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .try_init()
        .ok();
}

fn parse_observation(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, state)) if !name.is_empty() && !state.is_empty() => {
            Ok((name.trim().to_string(), state.trim().to_string()))
        }
        _ => Err(format!("expected Name=State, got `{}`", s)),
    }
}

fn open_model(path: Option<&Path>) -> Result<DirectedModel> {
    match path {
        Some(path) => persist::load(path).with_context(|| format!("Failed to load model {}", path.display())),
        None => sediment::build().context("Failed to build the reference network"),
    }
}

fn open_service(path: Option<&Path>, config: EngineConfig) -> Result<Service> {
    match path {
        Some(path) => Ok(Service::load(path, config)),
        None => {
            let model = sediment::build().context("Failed to build the reference network")?;
            Ok(Service::new(Arc::new(model), config)?)
        }
    }
}

fn cmd_build(out: &Path) -> Result<()> {
    let model = sediment::build().context("Failed to build the reference network")?;
    persist::save(&model, out).with_context(|| format!("Failed to save model to {}", out.display()))?;

    println!(
        "Saved {} variables and {} edges to {}",
        model.num_variables(),
        model.edges().len(),
        out.display()
    );
    Ok(())
}

fn cmd_query(
    path: Option<&Path>,
    vars: &[String],
    observations: &[(String, String)],
    joint: bool,
    config: EngineConfig,
) -> Result<()> {
    let model = open_model(path)?;
    let evidence = Evidence::from_labels(&model, observations.iter().map(|(n, s)| (n, s)))?;
    let names: Vec<&str> = vars.iter().map(String::as_str).collect();
    let engine = VariableElimination::with_config(&model, config);

    if joint {
        let posterior = engine.query(&names, &evidence)?;
        print!("{}", posterior);
        let (labels, p) = posterior.argmax();
        println!("Most probable: {} ({:.4})", labels.join(", "), p);
    } else {
        for marginal in engine.query_marginals(&names, &evidence)? {
            print!("{}", marginal);
            let (state, p) = marginal.argmax_state();
            println!("Most probable {}: {} ({:.4})", marginal.variable().name(), state, p);
        }
    }
    Ok(())
}

fn cmd_predict(path: Option<&Path>, request: Option<&Path>, config: EngineConfig) -> Result<()> {
    let body = match request {
        Some(file) => fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("Failed to read the request from stdin")?;
            buf
        }
    };

    let service = open_service(path, config)?;
    let (status, response) = service.handle_json(&body);
    println!("{}", response);

    if status != 200 {
        bail!("request failed with status {}", status);
    }
    Ok(())
}

fn cmd_status(path: Option<&Path>, config: EngineConfig) -> Result<()> {
    let service = open_service(path, config)?;
    println!("{}", serde_json::to_string_pretty(&service.status())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn observations() {
        assert_eq!(
            Ok((String::from("TOC"), String::from("Low"))),
            parse_observation("TOC=Low")
        );
        assert!(parse_observation("TOC").is_err());
        assert!(parse_observation("=Low").is_err());
        assert!(parse_observation("TOC=").is_err());
    }

    #[test]
    fn query_arguments() {
        let cli = Cli::try_parse_from([
            "sedrisk", "query", "--var", "Ecological_Effect", "-e", "TOC=Low", "-e", "Contaminant_Conc=High",
        ]).unwrap();

        match cli.command {
            Commands::Query { vars, evidence, joint, .. } => {
                assert_eq!(vec!["Ecological_Effect"], vars);
                assert_eq!(2, evidence.len());
                assert!(!joint);
            }
            _ => panic!("expected the query command"),
        }

        let config = EngineConfig::from(&cli.engine);
        assert_eq!(EngineConfig::default(), config);
    }
}
