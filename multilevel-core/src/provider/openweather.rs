use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::{
    WeatherConfig,
    config::WEATHER_API_KEY_ENV,
    error::{Error, Result},
    local_time::local_time_at,
    model::{WeatherQuery, WeatherRecord},
};

use super::WeatherProvider;

const PROVIDER: &str = "openweather";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: Option<String>,
    base_url: String,
    lang: String,
    timeout: Duration,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(config: &WeatherConfig) -> Self {
        Self {
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.clone(),
            lang: config.lang.clone(),
            timeout: config.timeout(),
            http: Client::new(),
        }
    }

    async fn fetch_current(&self, city: &str, api_key: &str) -> Result<OwCurrentResponse> {
        tracing::debug!(city, "requesting current weather from OpenWeather");

        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("q", city),
                ("appid", api_key),
                ("units", "metric"),
                ("lang", self.lang.as_str()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::transport(PROVIDER, e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| Error::transport(PROVIDER, e))?;

        if !status.is_success() {
            tracing::warn!(city, %status, "OpenWeather returned an error");
            return Err(Error::RemoteService {
                provider: PROVIDER,
                status: Some(status.as_u16()),
                message: body,
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::RemoteService {
            provider: PROVIDER,
            status: Some(status.as_u16()),
            message: format!("malformed current weather payload: {e}"),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    /// Shift in seconds from UTC.
    timezone: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    sys: OwSys,
}

fn to_record(parsed: OwCurrentResponse, now: DateTime<Utc>) -> Result<WeatherRecord> {
    let description = parsed
        .weather
        .into_iter()
        .next()
        .map(|w| w.description)
        .ok_or_else(|| Error::RemoteService {
            provider: PROVIDER,
            status: None,
            message: "current weather payload has no weather conditions".to_string(),
        })?;

    let local = local_time_at(parsed.timezone, now);

    Ok(WeatherRecord {
        city: parsed.name,
        country: parsed.sys.country,
        temperature_celsius: parsed.main.temp,
        description,
        humidity_percent: parsed.main.humidity,
        wind_speed: parsed.wind.speed,
        local_time: local.local_time,
        timezone_label: local.timezone_label,
    })
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn get_weather(&self, query: &WeatherQuery) -> Result<WeatherRecord> {
        let city = query.city.trim();
        if city.is_empty() {
            return Err(Error::Validation("city must not be empty".to_string()));
        }

        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Configuration(format!("{WEATHER_API_KEY_ENV} is not configured")))?;

        let parsed = self.fetch_current(city, api_key).await?;
        to_record(parsed, Utc::now())
    }
}
