use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use multilevel_core::Config;

use crate::server;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "multilevel-api", version, about = "Weather, image generation and image editing over HTTP")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve(ServeArgs),

    /// Store the OpenWeather API key in the config file.
    Configure,

    /// Report configuration problems without starting the server.
    Check,
}

#[derive(Debug, Default, Args)]
pub struct ServeArgs {
    /// Bind host; overrides config and HOST.
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port; overrides config and PORT.
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory for generated images; overrides config and IMAGES_DIR.
    #[arg(long)]
    pub images_dir: Option<PathBuf>,
}

impl ServeArgs {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = self.images_dir {
            config.images.dir = dir;
        }
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };

        match self.command.unwrap_or(Command::Serve(ServeArgs::default())) {
            Command::Serve(args) => {
                let mut config = load_config(&config_path)?;
                args.apply(&mut config);

                for problem in config.problems() {
                    tracing::warn!("{problem}");
                }

                server::run(config).await
            }
            Command::Configure => configure(&config_path),
            Command::Check => {
                let config = load_config(&config_path)?;
                let problems = config.problems();

                println!("Config file: {}", config_path.display());
                println!("Images directory: {}", config.images.dir.display());
                println!("Listening on: {}:{}", config.server.host, config.server.port);

                if problems.is_empty() {
                    println!("Configuration OK.");
                    return Ok(());
                }

                for problem in &problems {
                    println!("- {problem}");
                }
                anyhow::bail!("{} configuration problem(s) found", problems.len())
            }
        }
    }
}

fn load_config(path: &std::path::Path) -> anyhow::Result<Config> {
    let mut config = Config::load_from(path)?;
    config.apply_env()?;
    Ok(config)
}

fn configure(path: &std::path::Path) -> anyhow::Result<()> {
    // Environment overrides are not persisted, so start from the file alone.
    let mut config = Config::load_from(path)?;

    let api_key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_help_message("Get one at https://openweathermap.org/api")
        .prompt()
        .context("Failed to read API key")?;

    let api_key = api_key.trim().to_string();
    anyhow::ensure!(!api_key.is_empty(), "API key must not be empty");

    config.upsert_weather_api_key(api_key);
    config.save_to(path)?;

    println!("Saved configuration to {}", path.display());
    Ok(())
}
