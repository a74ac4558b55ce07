use crate::{
    auth::{login, FormSsoProvider},
    config::Config,
    dashboard::Dashboard,
    pipeline::Pipeline,
    report::RunReport,
    scrape::PortalScraper,
    store::{SqliteStore, Store},
    transform::TransformRules,
    util::{ensure_dir, format_date, parse_date, today},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use time::Date;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "susenas-monitor")]
#[command(about = "Susenas progress monitoring ETL (SSO scrape + transform + SQLite load)")]
pub struct Args {
    /// Defaults to `run` for today's date and the configured region.
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// Path to config TOML. If omitted, uses ./susenas-monitor.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape every stage, transform and load into the store.
    Run {
        #[arg(long)]
        region: Option<String>,
        /// Portal history date, YYYY-MM-DD.
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<Date>,
    },
    /// List distinct scrape dates, newest first.
    Dates {},
    /// Print the dashboard view for one scrape date (latest by default).
    Dashboard {
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<Date>,
    },
}

fn parse_date_arg(raw: &str) -> Result<Date, String> {
    parse_date(raw).map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

pub fn dispatch(args: Args) -> Result<()> {
    let loaded = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path),
        None => Ok(Config::default()),
    };
    // Bring logging up before surfacing a config load error.
    let fallback = Config::default();
    let _guard = init_logging(&args, loaded.as_ref().unwrap_or(&fallback))?;
    let cfg = loaded?;

    match &args.cmd {
        None => run(&cfg, None, None),
        Some(Command::Run { region, date }) => run(&cfg, region.as_deref(), *date),
        Some(Command::Dates {}) => dates(&cfg),
        Some(Command::Dashboard { date }) => dashboard(&cfg, *date),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("susenas-monitor.toml");
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if cfg.logging.write_to_file && !cfg.logging.file_path.is_empty() {
        let path = Path::new(&cfg.logging.file_path);
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
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
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn open_store(cfg: &Config) -> Result<SqliteStore> {
    let path = cfg.database_path();
    if let Some(parent) = Path::new(&path).parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    SqliteStore::open(&path).with_context(|| format!("opening database: {path}"))
}

fn run(cfg: &Config, region: Option<&str>, date: Option<Date>) -> Result<()> {
    let region = region.unwrap_or(cfg.portal.default_region.as_str());
    let date = date.unwrap_or_else(today);

    // Credentials are checked before the store or the network is touched.
    let (username, password) = cfg.sso_credentials()?;
    let store = open_store(cfg)?;

    info!("authenticating via SSO");
    let provider = FormSsoProvider::new(&cfg.sso);
    let session = login(&provider, &cfg.portal, &username, &password)
        .with_context(|| "SSO login")?;
    info!("SSO authentication successful");

    let scraper = PortalScraper::new(&session, &cfg.portal.table_id, cfg.scrape.normalize_unicode);
    let mut pipeline = Pipeline::new(cfg, scraper, store);
    let report = pipeline
        .run(region, date)
        .with_context(|| format!("ETL run for region {region} on {}", format_date(date)))?;

    if cfg.output.write_report_json {
        write_report(cfg, &report)?;
    }

    if cfg.output.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "region": report.region,
                "date": report.date,
                "counts": report.counts(),
                "total": report.total(),
                "status": "ok"
            }))?
        );
    }

    Ok(())
}

fn write_report(cfg: &Config, report: &RunReport) -> Result<()> {
    let dir = Path::new(&cfg.output.report_dir);
    ensure_dir(dir)?;
    let path = dir.join(format!("run-{}.json", report.date));
    std::fs::write(&path, serde_json::to_string_pretty(report)?)
        .with_context(|| format!("writing report: {}", path.display()))?;
    info!("run report written to {}", path.display());
    Ok(())
}

fn dates(cfg: &Config) -> Result<()> {
    let store = open_store(cfg)?;
    let dates: Vec<String> = store.available_dates()?.into_iter().map(format_date).collect();
    println!("{}", serde_json::to_string_pretty(&dates)?);
    Ok(())
}

fn dashboard(cfg: &Config, date: Option<Date>) -> Result<()> {
    let store = open_store(cfg)?;
    let date = match date {
        Some(d) => Some(d),
        None => store.available_dates()?.into_iter().next(),
    };
    let Some(date) = date else {
        return Err(anyhow!("no data yet; run the ETL first"));
    };

    let records = store.read(Some(date))?;
    let view = Dashboard::build(Some(date), &records, &TransformRules::from(&cfg.transform));
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
