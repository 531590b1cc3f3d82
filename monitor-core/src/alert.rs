use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    fmt,
};
use tracing::warn;

use crate::Reading;

/// How the consecutive-breach counter is keyed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreachScope {
    /// One counter per city, carried over from cycle to cycle.
    #[default]
    PerCity,
    /// A single counter shared by every reading in a batch, reset at the start of each batch.
    /// A breach in one city followed by a breach in another fires for the second city.
    Shared,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    SustainedHeat {
        city: String,
        temperature_c: f64,
        consecutive: u32,
    },
    Hazard {
        city: String,
        condition: String,
    },
}

impl Alert {
    pub fn city(&self) -> &str {
        match self {
            Alert::SustainedHeat { city, .. } | Alert::Hazard { city, .. } => city,
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::SustainedHeat { city, consecutive, .. } => write!(
                f,
                "ALERT: {city} exceeds temperature threshold for {consecutive} consecutive updates!"
            ),
            Alert::Hazard { city, condition } => {
                write!(f, "ALERT: {city} is experiencing {condition}.")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertEngine {
    temp_threshold_c: f64,
    breach_count: u32,
    hazard_conditions: HashSet<String>,
    scope: BreachScope,
    // Lives only in memory; a restart starts every city from zero.
    counters: HashMap<String, u32>,
}

impl AlertEngine {
    /// `breach_count` is clamped to at least 1.
    pub fn new<I, S>(
        temp_threshold_c: f64,
        breach_count: u32,
        hazard_conditions: I,
        scope: BreachScope,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            temp_threshold_c,
            breach_count: breach_count.max(1),
            hazard_conditions: hazard_conditions.into_iter().map(Into::into).collect(),
            scope,
            counters: HashMap::new(),
        }
    }

    pub fn scope(&self) -> BreachScope {
        self.scope
    }

    /// Run both rules over one cycle's batch, in batch order.
    pub fn evaluate(&mut self, batch: &[Reading]) -> Vec<Alert> {
        let mut alerts = self.check_thresholds(batch);
        alerts.extend(self.check_conditions(batch));

        for alert in &alerts {
            warn!(city = alert.city(), "{alert}");
        }
        alerts
    }

    /// Sustained-threshold rule: fires once every `breach_count` consecutive
    /// readings above the threshold; any reading at or below it resets the run.
    pub fn check_thresholds(&mut self, batch: &[Reading]) -> Vec<Alert> {
        if self.scope == BreachScope::Shared {
            self.counters.clear();
        }

        let mut alerts = Vec::new();
        for reading in batch {
            let key = match self.scope {
                BreachScope::PerCity => reading.city(),
                BreachScope::Shared => "",
            };
            let counter = self.counters.entry(key.to_string()).or_insert(0);

            if reading.temperature_c() > self.temp_threshold_c {
                *counter += 1;
                if *counter >= self.breach_count {
                    alerts.push(Alert::SustainedHeat {
                        city: reading.city().to_string(),
                        temperature_c: reading.temperature_c(),
                        consecutive: self.breach_count,
                    });
                    *counter = 0;
                }
            } else {
                *counter = 0;
            }
        }
        alerts
    }

    /// Hazard rule: stateless, one alert per reading whose condition is listed.
    pub fn check_conditions(&self, batch: &[Reading]) -> Vec<Alert> {
        batch
            .iter()
            .filter(|r| self.hazard_conditions.contains(r.condition()))
            .map(|r| Alert::Hazard {
                city: r.city().to_string(),
                condition: r.condition().to_string(),
            })
            .collect()
    }

    /// Current run length for `city` (per-city scope only).
    pub fn pending_breaches(&self, city: &str) -> u32 {
        self.counters.get(city).copied().unwrap_or(0)
    }
}
