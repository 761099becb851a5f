use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use burn::backend::ndarray::{NdArray, NdArrayDevice};
use burn::backend::Autodiff;
use burn::config::Config;
use clap::{ArgAction, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

use colour_rl::rl_algorithm::base::checkpoint;
use colour_rl::rl_algorithm::base::config::TrainConfig;
use colour_rl::rl_algorithm::ppo::adam_agent;
use colour_rl::rl_env::normalize;

type MyBackend = Autodiff<NdArray>;

#[derive(Debug, Parser)]
#[command(
    name = "colour-rl",
    about = "PPO colour-scheme policy: config, checkpoints and inference",
    version
)]
struct Cli {
    /// Verbosity: -v, -vv
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write the default training config as JSON.
    Config {
        #[arg(long, default_value = "train_config.json")]
        out: PathBuf,
    },
    /// Write an untrained checkpoint for the configured network.
    Init {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Sample a colour scheme for six player stats.
    Predict {
        #[arg(long)]
        checkpoint: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Six comma separated non-negative stats.
        #[arg(long, value_delimiter = ',')]
        stats: Vec<f32>,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

#[derive(Debug, Serialize)]
struct Prediction {
    /// First colour of the scheme in 0..=255.
    color: [u8; 3],
    colours: [[u8; 3]; 3],
    scheme: [[f32; 3]; 3],
    log_prob: f32,
    value: f32,
}

fn load_config(path: Option<&PathBuf>) -> Result<TrainConfig> {
    match path {
        Some(path) => TrainConfig::load(path)
            .map_err(|err| anyhow::anyhow!("failed to load config {}: {err:?}", path.display())),
        None => Ok(TrainConfig::with_defaults()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(LevelFilter::from_level(level))
        .init();

    let device = NdArrayDevice::Cpu;
    match cli.command {
        Command::Config { out } => {
            TrainConfig::with_defaults()
                .save(&out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!("default config written to {}", out.display());
        }
        Command::Init { config, out } => {
            let config = load_config(config.as_ref())?;
            let model = config.network.init::<MyBackend>(&device);
            let agent = adam_agent(model, config.ppo_train_config, device);
            agent.save_checkpoint(&out, 0)?;
            info!("untrained checkpoint written to {}", out.display());
        }
        Command::Predict {
            checkpoint,
            config,
            stats,
            seed,
        } => {
            if stats.len() != 6 {
                bail!("expected 6 stats, got {}", stats.len());
            }
            let config = load_config(config.as_ref())?;
            let state = normalize(&stats, config.env_config.stat_exponent)?;
            let meta = checkpoint::read_meta(&checkpoint)?;
            let model = checkpoint::load_model::<MyBackend, _>(
                config.network.init::<MyBackend>(&device),
                &checkpoint,
                &device,
            )?;
            info!("loaded {} (episode {})", checkpoint.display(), meta.episode);
            let agent = adam_agent(model, config.ppo_train_config, device);

            let sample = agent.select_action(&state, &mut StdRng::seed_from_u64(seed))?;
            let colours = sample.colours.to_rgb8();
            let prediction = Prediction {
                color: colours[0],
                colours,
                scheme: *sample.colours.colours(),
                log_prob: sample.log_prob,
                value: sample.value,
            };
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
    }
    Ok(())
}
