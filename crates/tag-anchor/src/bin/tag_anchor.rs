//! tag-anchor CLI: replay recorded sessions and inspect configuration.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use log::info;

use tag_anchor::placement::CalibrationBundle;
use tag_anchor::{run_replay, Recording, SessionConfig};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "tag-anchor")]
#[command(about = "Anchor virtual objects to fiducial tags from recorded detection sessions")]
#[command(version)]
struct Cli {
    /// Log at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recording against a calibration bundle and print the object
    /// pose after every frame.
    Replay(ReplayArgs),

    /// Validate a calibration bundle and summarise it.
    CheckBundle {
        /// Path to the bundle (JSON).
        #[arg(long)]
        bundle: PathBuf,
    },

    /// Print the default session configuration (JSON).
    Defaults,
}

#[derive(Debug, Clone, Args)]
struct ReplayArgs {
    /// Path to the recording (JSON).
    #[arg(long)]
    input: PathBuf,

    /// Path to the calibration bundle (JSON).
    #[arg(long)]
    bundle: PathBuf,

    /// Session configuration (JSON). Missing fields take defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the replay report here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Replay(args) => run_replay_cmd(&args),
        Commands::CheckBundle { bundle } => run_check_bundle(&bundle),
        Commands::Defaults => {
            println!("{}", serde_json::to_string_pretty(&SessionConfig::default())?);
            Ok(())
        }
    }
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: bool) -> CliResult<()> {
    use log::LevelFilter;

    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    tag_anchor::core::init_with_level(level)?;
    Ok(())
}

#[cfg(feature = "tracing")]
fn init_logging(verbose: bool) -> CliResult<()> {
    use log::LevelFilter;

    // Route `log` records from the library crates into tracing.
    let _ = tracing_log::LogTracer::init();
    let default = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    tag_anchor::core::init_tracing(default, false);
    Ok(())
}

fn run_replay_cmd(args: &ReplayArgs) -> CliResult<()> {
    let recording = Recording::load_json(&args.input).map_err(|e| -> CliError {
        format!("failed to load recording {}: {}", args.input.display(), e).into()
    })?;
    let bundle = CalibrationBundle::load_json(&args.bundle).map_err(|e| -> CliError {
        format!("failed to load bundle {}: {}", args.bundle.display(), e).into()
    })?;
    let config = match &args.config {
        Some(path) => SessionConfig::load_json(path)?,
        None => SessionConfig::default(),
    };

    let steps = run_replay(&recording, &bundle, config)?;
    let anchored = steps.iter().filter(|s| s.anchored).count();
    info!("replayed {} frame(s), {} anchored", steps.len(), anchored);

    let json = serde_json::to_string_pretty(&steps)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, json)?;
            info!("wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn run_check_bundle(path: &Path) -> CliResult<()> {
    let bundle = CalibrationBundle::load_json(path)?;
    println!("bundle '{}'", bundle.name);
    println!("  models:      {}", bundle.models.len());
    for model in &bundle.models {
        println!("    {} ({})", model.name, model.uri);
    }
    println!("  placements:  {}", bundle.tag_placements.len());
    for placement in &bundle.tag_placements {
        let o = placement.position_offset;
        let r = placement.rotation_offset;
        println!(
            "    tag {:>4}  offset [{:.3}, {:.3}, {:.3}]  euler [{:.1}, {:.1}, {:.1}]",
            placement.tag_id, o.x, o.y, o.z, r.x, r.y, r.z
        );
    }
    Ok(())
}
