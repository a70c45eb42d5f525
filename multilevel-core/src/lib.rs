//! Core library for the multi-level API.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The weather client (level 1) behind the `WeatherProvider` trait
//! - The image generation/"edit" clients (levels 2 and 3) and the images directory
//! - Shared domain models (requests, responses) and the error taxonomy
//!
//! It is used by `multilevel-api`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod image;
pub mod local_time;
pub mod model;
pub mod provider;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{Config, ImagesConfig, ServerConfig, WeatherConfig};
pub use error::{Error, ErrorKind, Result};
pub use image::{ImageClient, ImageFormat, ImageProvider, ImageQuality, ImageSize, ImageStore};
pub use model::{
    GeneratedImageRecord, ImageGenerationRequest, WeatherQuery, WeatherRecord,
};
pub use provider::{WeatherProvider, provider_from_config};
