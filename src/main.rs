//! decaptcha CLI: solve a 3x3 grid CAPTCHA image with a vision completion server.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueEnum};
use tracing::{error, info, warn};

use decaptcha::solver::pipeline::{DEFAULT_CONCURRENCY, DEFAULT_SERVER_URL};
use decaptcha::solver::prompts::DEFAULT_PROMPT_TEMPLATE;
use decaptcha::solver::{resolve_generation_params, TileFormat};
use decaptcha::{init_tracing, preview, DecaptchaError, Solver, SolverConfig};

#[derive(Parser)]
#[command(name = "decaptcha")]
#[command(about = "Select the squares of a 3x3 image CAPTCHA that contain a target")]
#[command(version)]
struct Cli {
    /// Path to the image file.
    image_path: PathBuf,

    /// Classification target, substituted into the prompt at {target}.
    #[arg(long)]
    target: String,

    /// Show a preview of the solution. Takes an optional boolean (`--preview True`).
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    preview: bool,

    /// Write the preview PNG here instead of opening a viewer.
    #[arg(long = "preview_out", alias = "preview-out")]
    preview_out: Option<PathBuf>,

    /// Radius for Gaussian blur (0 disables it).
    #[arg(long = "blur_radius", alias = "blur-radius", default_value_t = 2)]
    blur_radius: u32,

    /// Completion server URL.
    #[arg(long = "server_url", alias = "server-url", default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// Logging level.
    #[arg(long = "log_level", alias = "log-level", value_enum, ignore_case = true, default_value = "INFO")]
    log_level: LogLevel,

    /// Classification prompt template.
    #[arg(long, default_value = DEFAULT_PROMPT_TEMPLATE)]
    prompt: String,

    /// Per-request timeout in seconds.
    #[arg(long = "timeout_secs", alias = "timeout-secs", default_value_t = 60)]
    timeout_secs: u64,

    /// Maximum concurrent tile requests (1-9).
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Image format tiles are sent in.
    #[arg(long = "tile_format", alias = "tile-format", value_enum, default_value = "jpeg")]
    tile_format: CliTileFormat,

    /// TOML file overriding the sampling parameters.
    #[arg(long = "generation_config", alias = "generation-config")]
    generation_config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "ERROR")]
    Error,
    #[value(name = "CRITICAL")]
    Critical,
}

impl LogLevel {
    fn filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliTileFormat {
    Jpeg,
    Png,
}

impl From<CliTileFormat> for TileFormat {
    fn from(format: CliTileFormat) -> Self {
        match format {
            CliTileFormat::Jpeg => TileFormat::Jpeg,
            CliTileFormat::Png => TileFormat::Png,
        }
    }
}

fn build_config(cli: &Cli) -> Result<SolverConfig, DecaptchaError> {
    let generation = resolve_generation_params(cli.generation_config.as_deref())
        .map_err(|e| DecaptchaError::Config(format!("{:#}", e)))?;

    Ok(SolverConfig {
        target: cli.target.clone(),
        prompt_template: cli.prompt.clone(),
        server_url: cli.server_url.clone(),
        blur_radius: cli.blur_radius,
        timeout: Duration::from_secs(cli.timeout_secs),
        concurrency: cli.concurrency,
        tile_format: cli.tile_format.into(),
        generation,
    })
}

async fn run(cli: Cli) -> Result<(), DecaptchaError> {
    let config = build_config(&cli)?;
    let solver = Solver::new(config)?;

    let solution = solver.solve(&cli.image_path).await?;
    info!(
        "Selected {} of 9 squares ({} request(s) failed)",
        solution.selection.len(),
        solution.failed_tiles()
    );

    if cli.preview || cli.preview_out.is_some() {
        if let Err(e) = preview::show_preview(
            &cli.image_path,
            &solution.selection,
            cli.preview_out.as_deref(),
        ) {
            warn!("Preview failed: {:#}", e);
        }
    }

    println!("{}", solution.selection);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.filter());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
