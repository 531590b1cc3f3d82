use async_trait::async_trait;
use std::fmt::Debug;

use crate::{FetchFailure, Reading};

pub mod openweather;

pub use openweather::OpenWeatherSource;

/// Fetches one city's current conditions.
///
/// Implementations never panic or bubble errors past the caller: every problem
/// comes back as a [`FetchFailure`] so the remaining cities can still be polled.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn fetch(&self, city: &str) -> Result<Reading, FetchFailure>;
}
