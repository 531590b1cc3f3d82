use anyhow::Result;
use chrono::NaiveDate;
use std::fmt;

use crate::{Reading, ReadingStore};

/// Aggregates over the readings of the latest stored date.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub date: NaiveDate,
    pub average_temp_c: f64,
    pub max_temp_c: f64,
    pub min_temp_c: f64,
    pub dominant_condition: String,
    pub readings: usize,
}

impl Summary {
    /// Aggregate readings that are assumed to share one date; `None` when empty.
    ///
    /// The dominant condition is the most frequent label; on a tie the label
    /// that appears first in `readings` wins.
    pub fn from_readings(readings: &[Reading]) -> Option<Self> {
        let first = readings.first()?;

        let mut sum = 0.0;
        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;
        let mut tally: Vec<(&str, usize)> = Vec::new();

        for r in readings {
            let t = r.temperature_c();
            sum += t;
            max = max.max(t);
            min = min.min(t);

            match tally.iter_mut().find(|(label, _)| *label == r.condition()) {
                Some((_, n)) => *n += 1,
                None => tally.push((r.condition(), 1)),
            }
        }

        let mut dominant = tally[0];
        for entry in &tally[1..] {
            if entry.1 > dominant.1 {
                dominant = *entry;
            }
        }

        Some(Self {
            date: first.observed_date(),
            average_temp_c: sum / readings.len() as f64,
            max_temp_c: max,
            min_temp_c: min,
            dominant_condition: dominant.0.to_string(),
            readings: readings.len(),
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Summary for {}: avg {:.2} °C, max {:.2} °C, min {:.2} °C, dominant condition {} ({} readings)",
            self.date,
            self.average_temp_c,
            self.max_temp_c,
            self.min_temp_c,
            self.dominant_condition,
            self.readings,
        )
    }
}

/// Summarize the latest date present in the store. `Ok(None)` means no data yet.
pub fn summarize(store: &ReadingStore) -> Result<Option<Summary>> {
    let rows = store.query_latest_date()?;
    Ok(Summary::from_readings(&rows))
}
