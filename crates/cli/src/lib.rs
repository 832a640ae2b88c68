use anyhow::{bail, Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use perimeter_formulas::Parameters;
use perimeter_history::HistoryConfig;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

mod menu;
mod render;
mod session;

pub use session::{CalcOutcome, Loaded, Session};

#[derive(Parser)]
#[command(name = "perimeter")]
#[command(about = "Perimeter calculator that keeps a searchable history", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// History file (overrides PERIMETER_HISTORY and the config file)
    #[arg(long, global = true)]
    history: Option<PathBuf>,

    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Freshness window of the history read cache, in seconds
    #[arg(long, global = true)]
    cache_ttl_seconds: Option<u64>,

    /// Entries kept by the statistics memo
    #[arg(long, global = true)]
    memo_capacity: Option<usize>,

    /// Print structured JSON on stdout (implies --quiet)
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive menu (default)
    Menu,

    /// Compute a perimeter and record it
    Calc(CalcArgs),

    /// Show recorded computations
    List(ListArgs),

    /// Show records of one figure (case-insensitive)
    Search(SearchArgs),

    /// Aggregate statistics over the history
    Stats,

    /// Delete the history file
    Clear,

    /// List supported figures and their parameters
    Figures,
}

#[derive(Args)]
struct CalcArgs {
    /// Figure identifier, e.g. `circulo` or `triangulo_escaleno`
    figure: String,

    /// Parameter as name=value, repeatable
    #[arg(short = 'p', long = "param", value_parser = parse_param)]
    params: Vec<(String, f64)>,
}

#[derive(Args)]
struct ListArgs {
    /// Only the most recent N records
    #[arg(long)]
    last: Option<usize>,
}

#[derive(Args)]
struct SearchArgs {
    figure: String,
}

fn parse_param(raw: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in {raw:?}"));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|err| format!("invalid number for {name}: {err}"))?;
    Ok((name.to_string(), value))
}

fn resolve_config(cli: &Cli) -> Result<HistoryConfig> {
    let base = match &cli.config {
        Some(path) => HistoryConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => HistoryConfig::default(),
    };
    let mut cfg = base
        .apply_env()
        .context("Invalid PERIMETER_* environment")?;

    if let Some(path) = &cli.history {
        cfg.history_path = path.clone();
    }
    if let Some(secs) = cli.cache_ttl_seconds {
        cfg.freshness = Duration::from_secs(secs);
    }
    if let Some(capacity) = cli.memo_capacity {
        cfg.memo_capacity = capacity;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn init_logging(cli: &Cli) {
    let quiet = cli.quiet || cli.json || matches!(cli.command, None | Some(Commands::Menu));
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    } else if quiet {
        builder.filter_level(log::LevelFilter::Warn);
    }
    builder.target(env_logger::Target::Stderr).init();
}

pub fn main_entry() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let cfg = resolve_config(&cli)?;
    log::debug!("Using history file {}", cfg.history_path.display());
    let session = Session::open(&cfg);

    match cli.command {
        None | Some(Commands::Menu) => menu::run(&session),
        Some(Commands::Calc(args)) => run_calc(&session, args, cli.json),
        Some(Commands::List(args)) => {
            let Loaded { value, warning } = session.list(args.last);
            render::print_load_warning(warning.as_ref());
            emit(cli.json, &value, || render::print_records(&value))
        }
        Some(Commands::Search(args)) => {
            let Loaded { value, warning } = session.search(&args.figure);
            render::print_load_warning(warning.as_ref());
            emit(cli.json, &value, || render::print_records(&value))
        }
        Some(Commands::Stats) => {
            let Loaded { value, warning } = session.stats();
            render::print_load_warning(warning.as_ref());
            emit(cli.json, value.as_ref(), || render::print_stats(&value))
        }
        Some(Commands::Clear) => {
            let removed = session
                .clear()
                .with_context(|| format!("Failed to clear {}", session.history_path().display()))?;
            #[derive(Serialize)]
            struct Cleared {
                removed: bool,
            }
            emit(cli.json, &Cleared { removed }, || {
                if removed {
                    println!("History cleared.");
                } else {
                    println!("There was no history to clear.");
                }
            })
        }
        Some(Commands::Figures) => {
            render::print_figures();
            Ok(())
        }
    }
}

fn run_calc(session: &Session, args: CalcArgs, json: bool) -> Result<()> {
    let mut params = Parameters::new();
    for (name, value) in args.params {
        if params.insert(name.clone(), value).is_some() {
            bail!("Parameter {name} given more than once");
        }
    }
    let outcome = session
        .calculate(&args.figure, params)
        .with_context(|| format!("Cannot compute perimeter of {}", args.figure))?;
    emit(json, &outcome, || render::print_outcome(&outcome))
}

fn emit<T, F>(json: bool, value: &T, human: F) -> Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce(),
{
    if json {
        render::print_json(value)
    } else {
        human();
        Ok(())
    }
}
