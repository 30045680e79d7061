mod logging;
mod samples;

use clap::{Parser, Subcommand};

use canvex_canvas::TickOutcome;
use canvex_core::config::Config;

use crate::samples::fire::FireSample;
use crate::samples::gradients::GradientSample;

#[derive(Parser)]
#[command(
    name = "canvex",
    about = "Batched 2D drawing across a serialization boundary, run headless",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fire propagation sample
    Fire {
        /// Number of frames to render
        #[arg(long, default_value_t = 120)]
        frames: u64,

        /// Surface width (default: from config)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        width: Option<u32>,

        /// Surface height (default: from config)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        height: Option<u32>,
    },

    /// Run the gradient and pattern sample
    Gradients {
        /// Number of frames to render
        #[arg(long, default_value_t = 180)]
        frames: u64,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show effective settings
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a config value by dotted path (e.g. driver.frame_interval_ms)
    Get { path: String },
    /// Check the configuration for problems
    Validate,
}

fn print_tick(frame: u64, outcome: &TickOutcome) {
    match outcome {
        TickOutcome::Flushed {
            operations, report, ..
        } => println!(
            "frame {frame:>5}: {operations} ops, {} applied, {} skipped, {} created",
            report.applied,
            report.skipped.len(),
            report.created.len()
        ),
        TickOutcome::Failed { error, .. } => println!("frame {frame:>5}: dropped ({error})"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(Config::config_dir);
    let config = Config::load(&config_path)?;

    logging::init(config.logging.as_ref(), cli.verbose)?;

    let (warnings, errors) = config.validate();
    for warning in &warnings {
        tracing::warn!("Config: {warning}");
    }

    match cli.command {
        Commands::Fire {
            frames,
            width,
            height,
        } => {
            if !errors.is_empty() {
                anyhow::bail!("invalid config: {}", errors.join("; "));
            }
            let (default_w, default_h) = config.surface_size();
            let (width, height) = (width.unwrap_or(default_w), height.unwrap_or(default_h));
            let stats = samples::run(
                &config,
                width,
                height,
                frames,
                Box::new(FireSample::new(width, height)),
                print_tick,
            )
            .await?;
            samples::print_summary("fire", &stats);
        }
        Commands::Gradients { frames } => {
            if !errors.is_empty() {
                anyhow::bail!("invalid config: {}", errors.join("; "));
            }
            let (width, height) = config.surface_size();
            let stats = samples::run(
                &config,
                width,
                height,
                frames,
                Box::new(GradientSample::new()),
                print_tick,
            )
            .await?;
            samples::print_summary("gradients", &stats);
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Get { path } => match config.get_path(&path) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("no config value at '{path}'"),
            },
            ConfigAction::Validate => {
                for error in &errors {
                    println!("error: {error}");
                }
                for warning in &warnings {
                    println!("warning: {warning}");
                }
                if errors.is_empty() {
                    println!("Config OK ({} warnings)", warnings.len());
                } else {
                    anyhow::bail!("{} config errors", errors.len());
                }
            }
        },
        Commands::Status => {
            let (width, height) = config.surface_size();
            let options = config.surface_options();
            println!("Canvex v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Config: {}{}",
                config_path.display(),
                if config_path.exists() { "" } else { " (defaults)" }
            );
            println!("Frame interval: {}ms", config.frame_interval_ms());
            println!(
                "Surface: {width}x{height}, {}, alpha={}, desynchronized={}",
                options.color_space.as_str(),
                options.alpha,
                options.desynchronized
            );
            println!("Decode memo: {} batches", config.decode_cache_capacity());
            println!("Handle warning at: {}", config.handle_warn_threshold());
            println!("Config problems: {} errors, {} warnings", errors.len(), warnings.len());
        }
    }

    Ok(())
}
