//! `figq` command line: resolve figure files against a SQLite database.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, EngineConfig};
use crate::engine::{FigureEngine, TableRequest};
use crate::error::FigureError;
use crate::figure::page::table_figure_id;
use crate::types::{FilterSpec, ParseArgs, PeriodKind};

const REQUEST_DATE_FORMATS: [&str; 2] = ["%Y/%m/%d", "%Y-%m-%d"];
const REQUEST_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Parser, Debug)]
#[command(name = "figq", version, about = "Resolve figure documents against a SQLite store")]
pub struct Cli {
    /// SQLite database holding the figure tables
    #[arg(long, global = true, env = "FIGQ_DB")]
    pub db: Option<PathBuf>,

    /// Config file (defaults to $FIGQ_CONFIG or ~/.config/figq/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Time window and filters shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct WindowArgs {
    /// Period granularity: date (or day), month, quarter, year
    #[arg(long, default_value = "date")]
    pub period: PeriodKind,

    /// Window start, e.g. 2021/1/2 or 2021-01-02
    #[arg(long, value_parser = parse_request_date)]
    pub start: Option<NaiveDateTime>,

    /// Window end, e.g. 2021/3/31
    #[arg(long, value_parser = parse_request_date)]
    pub end: Option<NaiveDateTime>,

    /// Filters as JSON: [{"key": "region", "values": ["north"]}]
    #[arg(long)]
    pub filters: Option<String>,
}

impl WindowArgs {
    pub fn to_parse_args(&self) -> Result<ParseArgs> {
        let filters: Vec<FilterSpec> = match &self.filters {
            Some(text) => serde_json::from_str(text).context("parsing --filters")?,
            None => Vec::new(),
        };
        Ok(ParseArgs {
            start: self.start,
            end: self.end,
            period: self.period,
            filters,
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve one figure file and print the result
    Resolve {
        /// Figure JSON file, or `-` for stdin
        #[arg(long)]
        figure: PathBuf,

        #[command(flatten)]
        window: WindowArgs,

        /// Page of a table figure (1-based)
        #[arg(long, default_value_t = 1)]
        page: u64,

        /// Sort key for table figures: `col`, `col desc` or `-col`
        #[arg(long)]
        sort_by: Option<String>,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },
    /// Run a table figure, optionally found through a page document
    Table {
        /// Table figure JSON file
        #[arg(long, conflicts_with = "page_doc", required_unless_present = "page_doc")]
        figure: Option<PathBuf>,

        /// Page document whose first table figure is used
        #[arg(long, requires = "figures_dir")]
        page_doc: Option<PathBuf>,

        /// Directory of `<figure id>.json` files referenced by --page-doc
        #[arg(long)]
        figures_dir: Option<PathBuf>,

        #[command(flatten)]
        window: WindowArgs,

        #[arg(long, default_value_t = 1)]
        page: u64,

        #[arg(long)]
        sort_by: Option<String>,

        /// Export every row instead of one page
        #[arg(long)]
        all: bool,

        #[arg(long)]
        pretty: bool,
    },
}

/// Accepts `2021/1/2`, `2021-01-02` and `2021-01-02 13:00:00`.
pub fn parse_request_date(text: &str) -> Result<NaiveDateTime, String> {
    let text = text.trim();
    REQUEST_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .map(|d| d.and_time(NaiveTime::MIN))
        .or_else(|| {
            REQUEST_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        })
        .ok_or_else(|| format!("unrecognized date '{text}' (expected e.g. 2021/1/2)"))
}

/// Install the stderr subscriber. `RUST_LOG` wins over the config level.
pub fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Exit code and kind for a failed command.
pub fn classify_error(err: &anyhow::Error) -> (i32, &'static str) {
    if let Some(e) = err.downcast_ref::<FigureError>() {
        return match e {
            FigureError::Db(_) | FigureError::EmptyTable { .. } => (3, "store"),
            FigureError::UnknownQueryType(_) | FigureError::MalformedQuery(_) => (2, "query"),
            FigureError::MalformedFigure(_)
            | FigureError::UnresolvedTag(_)
            | FigureError::Json(_)
            | FigureError::Template(_) => (2, "figure"),
        };
    }
    if err.downcast_ref::<ConfigError>().is_some() {
        return (4, "config");
    }
    (1, "other")
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        return std::io::read_to_string(std::io::stdin()).context("reading figure from stdin");
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(p) => EngineConfig::load_from(p)?,
        None => EngineConfig::load()?,
    };
    Ok(config)
}

fn open_engine(db: Option<&Path>, config: EngineConfig) -> Result<FigureEngine> {
    let db = db.ok_or_else(|| anyhow!("no database given (use --db or FIGQ_DB)"))?;
    if !db.exists() {
        bail!("database {} does not exist", db.display());
    }
    Ok(FigureEngine::open(db, config)?)
}

fn print_json(value: &Value, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

fn table_figure_text(
    figure: Option<&Path>,
    page_doc: Option<&Path>,
    figures_dir: Option<&Path>,
) -> Result<String> {
    if let Some(path) = figure {
        return read_input(path);
    }
    let (Some(page_doc), Some(dir)) = (page_doc, figures_dir) else {
        bail!("either --figure or --page-doc with --figures-dir is required");
    };
    let page: Value = serde_json::from_str(&read_input(page_doc)?)
        .with_context(|| format!("parsing page {}", page_doc.display()))?;
    let id = table_figure_id(&page)
        .ok_or_else(|| anyhow!("page {} has no table figure", page_doc.display()))?;
    tracing::debug!(figure = %id, "found table figure on page");
    read_input(&dir.join(format!("{id}.json")))
}

pub fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.logging.level);

    match cli.command {
        Commands::Resolve {
            figure,
            window,
            page,
            sort_by,
            pretty,
        } => {
            let raw = read_input(&figure)?;
            let args = window.to_parse_args()?;
            let engine = open_engine(cli.db.as_deref(), config)?;
            let request = TableRequest { page, sort_by };
            if pretty {
                print_json(&engine.resolve(&raw, &args, &request)?, true)
            } else {
                println!("{}", engine.resolve_text(&raw, &args, &request)?);
                Ok(())
            }
        }
        Commands::Table {
            figure,
            page_doc,
            figures_dir,
            window,
            page,
            sort_by,
            all,
            pretty,
        } => {
            let raw = table_figure_text(figure.as_deref(), page_doc.as_deref(), figures_dir.as_deref())?;
            let args = window.to_parse_args()?;
            let engine = open_engine(cli.db.as_deref(), config)?;
            if all {
                let figure: Value = serde_json::from_str(&raw).context("parsing table figure")?;
                let result = engine.export_table(&figure, &args, sort_by.as_deref())?;
                print_json(&serde_json::to_value(&result)?, pretty)
            } else {
                let request = TableRequest { page, sort_by };
                print_json(&engine.resolve(&raw, &args, &request)?, pretty)
            }
        }
    }
}
