use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::{FetchError, FetchFailure, Reading};

use super::WeatherSource;

const CURRENT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Clone)]
pub struct OpenWeatherSource {
    api_key: String,
    http: Client,
}

impl OpenWeatherSource {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { api_key, http })
    }

    async fn fetch_current(&self, city: &str) -> Result<Reading, FetchError> {
        // No `units` parameter: the API then reports kelvin, which we convert ourselves.
        let res = self
            .http
            .get(CURRENT_WEATHER_URL)
            .query(&[("q", city), ("appid", self.api_key.as_str())])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        debug!(city, bytes = body.len(), "OpenWeather response received");
        parse_current(city, &body)
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherSource {
    async fn fetch(&self, city: &str) -> Result<Reading, FetchFailure> {
        self.fetch_current(city)
            .await
            .map_err(|error| FetchFailure::new(city, error))
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

/// Turn a current-weather body into a [`Reading`] for `city`.
///
/// Any deviation from the expected shape is a [`FetchError::Parse`].
pub fn parse_current(city: &str, body: &str) -> Result<Reading, FetchError> {
    let parsed: OwCurrentResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let condition = parsed
        .weather
        .into_iter()
        .next()
        .map(|w| w.main)
        .ok_or_else(|| FetchError::Parse("`weather` array is empty".to_string()))?;

    Reading::from_kelvin(
        city,
        condition,
        parsed.main.temp,
        parsed.main.feels_like,
        parsed.main.humidity,
        parsed.wind.speed,
        parsed.dt,
    )
    .map_err(|e| FetchError::Parse(e.to_string()))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SAMPLE: &str = r#"{
        "coord": {"lon": 77.22, "lat": 28.67},
        "weather": [{"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"}],
        "main": {"temp": 303.15, "feels_like": 308.4, "temp_min": 302.0, "temp_max": 304.0,
                 "pressure": 1002, "humidity": 74},
        "wind": {"speed": 4.12, "deg": 90},
        "dt": 1700000000,
        "name": "Delhi"
    }"#;

    #[test]
    fn parses_expected_shape_and_converts_units() {
        let reading = parse_current("Delhi", SAMPLE).expect("sample must parse");

        assert_eq!(reading.city(), "Delhi");
        assert_eq!(reading.condition(), "Rain");
        assert!((reading.temperature_c() - (303.15 - 273.15)).abs() < 1e-9);
        assert!((reading.feels_like_c() - (308.4 - 273.15)).abs() < 1e-9);
        assert_eq!(reading.humidity(), 74.0);
        assert_eq!(reading.wind_speed(), 4.12);
        assert_eq!(reading.observed_at(), 1_700_000_000);
        assert_eq!(reading.observed_date().to_string(), "2023-11-14");
    }

    #[test]
    fn city_comes_from_the_request_not_the_body() {
        let reading = parse_current("New Delhi", SAMPLE).unwrap();
        assert_eq!(reading.city(), "New Delhi");
    }

    #[test]
    fn missing_field_is_a_parse_failure() {
        let body = r#"{"weather": [{"main": "Clear"}], "main": {"temp": 290.0, "humidity": 10}, "wind": {"speed": 1.0}, "dt": 1}"#;
        let err = parse_current("Delhi", body).unwrap_err();
        assert_matches!(err, FetchError::Parse(msg) if msg.contains("feels_like"));
    }

    #[test]
    fn empty_weather_array_is_a_parse_failure() {
        let body = r#"{"weather": [], "main": {"temp": 290.0, "feels_like": 289.0, "humidity": 10}, "wind": {"speed": 1.0}, "dt": 1}"#;
        let err = parse_current("Delhi", body).unwrap_err();
        assert_matches!(err, FetchError::Parse(_));
    }

    #[test]
    fn non_json_body_is_a_parse_failure() {
        assert_matches!(parse_current("Delhi", "<html>"), Err(FetchError::Parse(_)));
    }

    #[test]
    fn truncate_body_caps_long_bodies() {
        let long = "x".repeat(500);
        let out = truncate_body(&long);
        assert_eq!(out.len(), 203);
        assert!(out.ends_with("..."));
        assert_eq!(truncate_body("short"), "short");
    }
}
