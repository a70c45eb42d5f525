use crate::{
    WeatherConfig, WeatherQuery, WeatherRecord, error::Result,
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// A source of current weather for a city.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn get_weather(&self, query: &WeatherQuery) -> Result<WeatherRecord>;
}

/// Construct the weather provider from config.
///
/// A missing API key is not an error here: the server still starts and the
/// weather endpoint reports a configuration error per request.
pub fn provider_from_config(config: &WeatherConfig) -> Box<dyn WeatherProvider> {
    Box::new(OpenWeatherProvider::new(config))
}
