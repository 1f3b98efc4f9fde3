//! Figure query engine.
//!
//! A *figure* is a JSON document describing a chart, table or KPI. Its
//! `#query` block names one or more query descriptors; the engine turns each
//! into SQL against a SQLite store, aligns the time window to calendar
//! periods, densifies sparse series onto the period grid and writes the
//! results back into the figure.
//!
//! ```no_run
//! use figure_query::{EngineConfig, FigureEngine, ParseArgs, PeriodKind, TableRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = FigureEngine::open("metrics.db".as_ref(), EngineConfig::default())?;
//! let figure = std::fs::read_to_string("revenue.json")?;
//! let resolved = engine.resolve(&figure, &ParseArgs::new(PeriodKind::Month), &TableRequest::default())?;
//! println!("{resolved}");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod figure;
pub mod format;
pub mod period;
pub mod query;
pub mod table;
pub mod types;

pub use config::{ConfigError, EngineConfig};
pub use engine::{FigureEngine, TableRequest};
pub use error::{FigureError, FigureResult};
pub use figure::{FigureAssembler, QueryResults};
pub use format::{NumberFormatter, NumberLocale};
pub use query::{QueryDescriptor, QueryOutput, resolve_query};
pub use types::{FilterSpec, ParseArgs, PeriodKind, QueryResult, ResolvedArgs, Scalar};
