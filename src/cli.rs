use crate::{
    batch::Batch,
    config::Config,
    handler,
    report::{ReportTable, report_columns},
    util::{ensure_dir, now_rfc3339},
};
use anyhow::{Context, Result, anyhow};
use base64::{Engine, engine::general_purpose::STANDARD};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "omr-batch")]
#[command(about = "Bubble-sheet OMR scorer with batch isolation and xlsx reporting")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./omr-batch.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the bubble grid as JSON.
    Grid {},
    /// Score sheet images and write the spreadsheet report.
    Score {
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Run the HTTP handler against a proxy event stored as JSON.
    Handle {
        #[arg(long)]
        event: PathBuf,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(p) => Config::load(&p)?,
        None => Config::default(),
    };

    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    match &args.cmd {
        Command::Grid {} => grid(&cfg),
        Command::Score { input, out_dir } => score(&cfg, input, out_dir.as_deref()),
        Command::Handle { event } => handle(&cfg, event),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("omr-batch.toml");
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr.
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn grid(cfg: &Config) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&cfg.layout.grid())?);
    Ok(())
}

fn score(cfg: &Config, inputs: &[PathBuf], out_override: Option<&Path>) -> Result<()> {
    let started = now_rfc3339();

    let mut encoded = Vec::with_capacity(inputs.len());
    for path in inputs {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading image: {}", path.display()))?;
        encoded.push(STANDARD.encode(bytes));
    }

    let batch = Batch::new(cfg);
    batch.check_request(encoded.len())?;
    let results = batch.score_batch(&encoded);

    let columns = report_columns(batch.grid());
    let table = ReportTable::build(&cfg.report, &columns, &results);

    let out_dir = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.output.out_dir));
    ensure_dir(&out_dir)?;

    if cfg.output.write_excel {
        let xlsx = table
            .to_xlsx(&cfg.report.sheet_name)
            .with_context(|| "building spreadsheet")?;
        let path = out_dir.join(&cfg.output.excel_filename);
        std::fs::write(&path, xlsx).with_context(|| format!("writing {}", path.display()))?;
        info!("wrote {}", path.display());
    }

    if cfg.output.write_results_json {
        let path = out_dir.join(&cfg.output.results_filename);
        std::fs::write(&path, serde_json::to_string_pretty(&results)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    if cfg.output.print_summary {
        let failed: Vec<_> = inputs
            .iter()
            .zip(&results)
            .filter(|(_, r)| !r.is_ok())
            .map(|(p, _)| p.display().to_string())
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "started": started,
                "finished": now_rfc3339(),
                "images": results.len(),
                "failed": failed,
                "out_dir": out_dir,
            }))?
        );
    }

    Ok(())
}

fn handle(cfg: &Config, event_path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(event_path)
        .with_context(|| format!("reading event: {}", event_path.display()))?;
    let event: serde_json::Value = serde_json::from_str(&raw).with_context(|| "parsing event JSON")?;
    let response = handler::handle_event(cfg, &event);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    Some(PathBuf::from(&cfg.output.out_dir).join("omr-batch.log"))
}
