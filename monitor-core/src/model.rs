use chrono::{DateTime, NaiveDate, Utc};

use crate::error::ReadingError;

const KELVIN_OFFSET: f64 = 273.15;

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

/// One normalized observation for one city.
///
/// Fields are private so `observed_date` can never drift from `observed_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    city: String,
    condition: String,
    temperature_c: f64,
    feels_like_c: f64,
    humidity: f64,
    wind_speed: f64,
    observed_at: i64,
    observed_date: NaiveDate,
}

impl Reading {
    /// Build a reading from Celsius values; the date is the UTC calendar day of `observed_at`.
    pub fn new(
        city: impl Into<String>,
        condition: impl Into<String>,
        temperature_c: f64,
        feels_like_c: f64,
        humidity: f64,
        wind_speed: f64,
        observed_at: i64,
    ) -> Result<Self, ReadingError> {
        let observed_date = utc_date(observed_at)?;

        Ok(Self {
            city: city.into(),
            condition: condition.into(),
            temperature_c,
            feels_like_c,
            humidity,
            wind_speed,
            observed_at,
            observed_date,
        })
    }

    /// Same as [`Reading::new`] but takes source temperatures in kelvin.
    pub fn from_kelvin(
        city: impl Into<String>,
        condition: impl Into<String>,
        temperature_k: f64,
        feels_like_k: f64,
        humidity: f64,
        wind_speed: f64,
        observed_at: i64,
    ) -> Result<Self, ReadingError> {
        Self::new(
            city,
            condition,
            kelvin_to_celsius(temperature_k),
            kelvin_to_celsius(feels_like_k),
            humidity,
            wind_speed,
            observed_at,
        )
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }

    pub fn temperature_c(&self) -> f64 {
        self.temperature_c
    }

    pub fn feels_like_c(&self) -> f64 {
        self.feels_like_c
    }

    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    pub fn wind_speed(&self) -> f64 {
        self.wind_speed
    }

    pub fn observed_at(&self) -> i64 {
        self.observed_at
    }

    pub fn observed_date(&self) -> NaiveDate {
        self.observed_date
    }
}

fn utc_date(observed_at: i64) -> Result<NaiveDate, ReadingError> {
    DateTime::<Utc>::from_timestamp(observed_at, 0)
        .map(|dt| dt.date_naive())
        .ok_or(ReadingError::TimestampOutOfRange(observed_at))
}
