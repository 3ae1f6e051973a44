//! Current-weather fetcher (OpenWeatherMap)

use super::WeatherFetcher;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const API_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// One observation of current conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherObservation {
    /// Temperature in degrees Celsius
    pub temp_c: f64,
    /// Main condition group (e.g. "Clear", "Rain")
    pub condition: String,
    /// Localized condition description
    pub description: String,
    /// Resolved city name
    pub city: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    main: ApiMain,
    weather: Vec<ApiWeather>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct ApiMain {
    temp: f64,
}

#[derive(Deserialize)]
struct ApiWeather {
    main: String,
    description: String,
}

/// Fetches current weather for a fixed location.
pub struct HttpWeatherFetcher {
    client: reqwest::Client,
    api_key: String,
    location: String,
}

impl HttpWeatherFetcher {
    pub fn new(api_key: impl Into<String>, location: impl Into<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.into(),
            location: location.into(),
        }
    }
}

#[async_trait]
impl WeatherFetcher for HttpWeatherFetcher {
    async fn fetch_current(&self) -> Result<WeatherObservation> {
        let response = self
            .client
            .get(API_URL)
            .query(&[
                ("q", self.location.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
                ("lang", "fr"),
            ])
            .send()
            .await
            .map_err(super::request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "weather API answered {}: {}",
                status, body
            )));
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::MalformedData(format!("invalid weather payload: {}", e)))?;

        let first = parsed
            .weather
            .first()
            .ok_or_else(|| Error::MalformedData("weather payload without conditions".to_string()))?;

        Ok(WeatherObservation {
            temp_c: parsed.main.temp,
            condition: first.main.clone(),
            description: first.description.clone(),
            city: parsed.name.unwrap_or_else(|| self.location.clone()),
        })
    }
}
