use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::image::ImageQuality;

/// Level 1 request: the city to look up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherQuery {
    pub city: String,
}

impl WeatherQuery {
    pub fn new(city: impl Into<String>) -> Self {
        Self { city: city.into() }
    }
}

/// Normalized current weather plus the local time of the city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherRecord {
    pub city: String,
    pub country: String,
    pub temperature_celsius: f64,
    pub description: String,
    pub humidity_percent: u8,
    pub wind_speed: f64,
    pub local_time: String,
    pub timezone_label: String,
}

/// Level 2 request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationRequest {
    pub prompt: String,
    /// `<width>x<height>`, parsed by the image client.
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default)]
    pub quality: ImageQuality,
}

pub fn default_size() -> String {
    "1024x1024".to_string()
}

/// An image downloaded from the provider and written to the images directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImageRecord {
    /// Provider URL the image was rendered from.
    pub remote_url: String,
    pub local_filename: String,
    pub local_path: PathBuf,
}
