//! Current conditions from WeatherAPI.com.

use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;

use crate::backend::BackendError;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WeatherArgs {
    #[schemars(description = "City and optional region or country, e.g. 'San Francisco, US'")]
    pub location: String,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    location: Location,
    current: Current,
}

#[derive(Debug, Deserialize)]
struct Location {
    name: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct Current {
    temp_c: f64,
    feelslike_c: f64,
    humidity: f64,
    wind_kph: f64,
    #[serde(default)]
    wind_dir: String,
    condition: Condition,
}

#[derive(Debug, Deserialize)]
struct Condition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

pub struct WeatherClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl WeatherClient {
    pub fn new(config: &relayconf::WeatherConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Formatted current conditions for `location`.
    #[tracing::instrument(skip(self))]
    pub async fn current(&self, location: &str) -> Result<String, BackendError> {
        let Some(api_key) = self.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Err(BackendError::Domain(
                "WEATHER_API_KEY is not set. Add it to your environment or .env file.".to_string(),
            ));
        };

        let location = location.trim();
        if location.is_empty() {
            return Err(BackendError::Domain("A location is required.".to_string()));
        }

        let response = self
            .http
            .get(format!("{}/current.json", self.base_url))
            .query(&[("key", api_key), ("q", location), ("aqi", "no")])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("Weather request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(format!("Weather response unreadable: {}", e)))?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ErrorBody>(&body) {
                return Err(BackendError::Domain(format!(
                    "Weather API error: {}",
                    err.error.message
                )));
            }
            if status.is_server_error() {
                return Err(BackendError::Transport(format!(
                    "Weather API returned {}",
                    status
                )));
            }
            return Err(BackendError::Domain(format!("Weather API returned {}", status)));
        }

        let data: CurrentResponse = serde_json::from_str(&body)
            .map_err(|e| BackendError::Protocol(format!("Unexpected weather response: {}", e)))?;

        Ok(format_current(&data))
    }
}

fn format_current(data: &CurrentResponse) -> String {
    let loc = &data.location;
    let cur = &data.current;
    format!(
        "Weather in {}, {}, {}:\nCondition: {}\nTemperature: {}°C (feels like {}°C)\nHumidity: {}%\nWind: {} km/h {}",
        loc.name,
        loc.region,
        loc.country,
        cur.condition.text,
        cur.temp_c,
        cur.feelslike_c,
        cur.humidity,
        cur.wind_kph,
        cur.wind_dir
    )
}
