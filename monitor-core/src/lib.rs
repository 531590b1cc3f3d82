//! Core library for the `weather-monitor` tool.
//!
//! This crate defines:
//! - Configuration handling
//! - The weather source abstraction and its OpenWeather implementation
//! - The append-only reading store, daily summaries and alert rules
//! - The scheduler that ties one poll cycle together, plus an optional chart sink
//!
//! It is used by `weather-monitor`, but can also be embedded by other binaries or services.

pub mod alert;
pub mod chart;
pub mod config;
pub mod error;
pub mod model;
pub mod report;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod summary;

pub use alert::{Alert, AlertEngine, BreachScope};
pub use chart::{ChartSink, SvgTrendChart};
pub use config::Config;
pub use error::{FetchError, FetchFailure, ReadingError};
pub use model::Reading;
pub use scheduler::{CycleReport, Scheduler};
pub use source::{OpenWeatherSource, WeatherSource};
pub use store::ReadingStore;
pub use summary::{Summary, summarize};
