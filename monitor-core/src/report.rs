//! Operator-facing text output.

use chrono::{DateTime, FixedOffset};
use std::fmt::Write;

use crate::Reading;

/// 12-hour clock label for an epoch timestamp in the display offset, e.g. `03:45 PM`.
pub fn local_time_label(observed_at: i64, offset: FixedOffset) -> String {
    match DateTime::from_timestamp(observed_at, 0) {
        Some(utc) => utc.with_timezone(&offset).format("%I:%M %p").to_string(),
        None => "--:-- --".to_string(),
    }
}

pub fn readings_table(readings: &[Reading], offset: FixedOffset) -> String {
    let city_width = readings
        .iter()
        .map(|r| r.city().chars().count())
        .chain(std::iter::once("City".len()))
        .max()
        .unwrap_or(4);
    let cond_width = readings
        .iter()
        .map(|r| r.condition().chars().count())
        .chain(std::iter::once("Condition".len()))
        .max()
        .unwrap_or(9);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<city_width$}  {:<cond_width$}  {:>8}  {:>10}  {:>8}  {:>6}  {:>8}",
        "City", "Condition", "Temp °C", "Feels °C", "Humidity", "Wind", "Time",
    );
    for r in readings {
        let _ = writeln!(
            out,
            "{:<city_width$}  {:<cond_width$}  {:>8.2}  {:>10.2}  {:>8.0}  {:>6.2}  {:>8}",
            r.city(),
            r.condition(),
            r.temperature_c(),
            r.feels_like_c(),
            r.humidity(),
            r.wind_speed(),
            local_time_label(r.observed_at(), offset),
        );
    }
    out
}
