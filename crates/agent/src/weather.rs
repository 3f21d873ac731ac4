//! Current-weather lookup backed by the open-meteo geocoding and forecast
//! APIs. Failures here are expected operating conditions; callers render
//! placeholder text and keep going.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use scentpick_core::config::WeatherConfig;
use scentpick_core::weather::{code_description, code_to_emoji, wind_descriptor};

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("city `{0}` could not be geocoded")]
    UnknownCity(String),
    #[error("weather response was missing the current observation")]
    MissingObservation,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub temperature_c: f64,
    pub wind_speed_ms: f64,
    pub code: i64,
}

impl Observation {
    /// The two display lines shown above weather-based picks.
    pub fn display_lines(&self, city: &str) -> Vec<String> {
        vec![
            format!(
                "{} {} in {}, {:.1}°C",
                code_to_emoji(self.code),
                code_description(self.code),
                city,
                self.temperature_c,
            ),
            format!("wind {} ({:.1} m/s)", wind_descriptor(self.wind_speed_ms), self.wind_speed_ms),
        ]
    }
}

/// Stand-in lines used when the lookup fails; the season-based picks below
/// them still render.
pub fn placeholder_lines(city: &str) -> Vec<String> {
    vec![
        format!("Weather for {city} is unavailable right now."),
        "Here are picks for the season instead.".to_string(),
    ]
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    windspeed: f64,
    weathercode: i64,
}

pub struct WeatherFetcher {
    client: reqwest::Client,
    config: WeatherConfig,
}

impl WeatherFetcher {
    pub fn new(config: WeatherConfig) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub async fn current(&self, city: &str) -> Result<Observation, WeatherError> {
        let (latitude, longitude) = self.geocode(city).await?;
        self.current_at(latitude, longitude).await
    }

    /// Skips geocoding when the caller already has coordinates.
    pub async fn current_at(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Observation, WeatherError> {
        let forecast = self
            .client
            .get(&self.config.forecast_url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current_weather", "true".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<ForecastResponse>()
            .await?;

        let current = forecast.current_weather.ok_or(WeatherError::MissingObservation)?;
        Ok(Observation {
            temperature_c: current.temperature,
            // open-meteo reports km/h; the display buckets expect m/s.
            wind_speed_ms: current.windspeed / 3.6,
            code: current.weathercode,
        })
    }

    async fn geocode(&self, city: &str) -> Result<(f64, f64), WeatherError> {
        let response = self
            .client
            .get(&self.config.geocoding_url)
            .query(&[("name", city), ("count", "1")])
            .send()
            .await?
            .error_for_status()?
            .json::<GeocodeResponse>()
            .await?;

        response
            .results
            .first()
            .map(|result| (result.latitude, result.longitude))
            .ok_or_else(|| WeatherError::UnknownCity(city.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{placeholder_lines, Observation};

    #[test]
    fn display_lines_name_the_city_and_bucket_the_wind() {
        let observation = Observation { temperature_c: 23.14, wind_speed_ms: 1.2, code: 0 };
        let lines = observation.display_lines("Seoul");
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("clear sky in Seoul"));
        assert!(lines[0].contains("23.1°C"));
        assert_eq!(lines[1], "wind calm (1.2 m/s)");
    }

    #[test]
    fn placeholder_keeps_two_lines() {
        let lines = placeholder_lines("Seoul");
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Seoul"));
    }

    #[test]
    fn forecast_decoding_tolerates_missing_current_weather() {
        let decoded: super::ForecastResponse = serde_json::from_str("{}").expect("decode");
        assert!(decoded.current_weather.is_none());

        let decoded: super::ForecastResponse = serde_json::from_value(serde_json::json!({
            "current_weather": {"temperature": 20.5, "windspeed": 7.2, "weathercode": 61}
        }))
        .expect("decode");
        let current = decoded.current_weather.expect("present");
        assert_eq!(current.weathercode, 61);
    }
}
