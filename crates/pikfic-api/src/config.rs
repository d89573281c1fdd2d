//! Environment-driven server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use pikfic_generation::gemini::{DEFAULT_BASE_URL, DEFAULT_LIGHT_MODEL, DEFAULT_MAJOR_MODEL, GeminiConfig};
use pikfic_persistence::local_store::DEFAULT_LIBRARY_FILE;

use crate::error::AppError;

/// Everything the server reads from its environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Generative service settings.
    pub gemini: GeminiConfig,
    /// Remote library connection string. `None` disables the remote backend.
    pub database_url: Option<String>,
    /// Location of the device-local library file.
    pub local_library_path: PathBuf,
    /// Interface the server binds to.
    pub host: String,
    /// Listening port.
    pub port: u16,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = var("GEMINI_API_KEY").ok_or_else(|| {
            AppError::Config("GEMINI_API_KEY environment variable must be set".to_owned())
        })?;
        let mut gemini = GeminiConfig::new(api_key);
        gemini.base_url = var("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        gemini.major_model =
            var("GEMINI_MAJOR_MODEL").unwrap_or_else(|| DEFAULT_MAJOR_MODEL.to_owned());
        gemini.light_model =
            var("GEMINI_LIGHT_MODEL").unwrap_or_else(|| DEFAULT_LIGHT_MODEL.to_owned());

        let port = match var("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?,
            None => 3000,
        };

        Ok(Self {
            gemini,
            database_url: var("DATABASE_URL"),
            local_library_path: var("LOCAL_LIBRARY_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_LIBRARY_FILE), PathBuf::from),
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port,
        })
    }

    /// Socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for an unparsable host.
    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}
