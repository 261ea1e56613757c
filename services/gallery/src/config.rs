//! services/gallery/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which reconciliation policy the gallery runs. Chosen once per deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyKind {
    /// Fetch on view entry and after every write.
    PollOnAction,
    /// Hold a live subscription for the viewed subject.
    LiveSubscribe,
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "poll" | "poll_on_action" => Ok(Self::PollOnAction),
            "live" | "live_subscribe" => Ok(Self::LiveSubscribe),
            other => Err(format!("'{}' is not one of poll, live", other)),
        }
    }
}

/// Which records a gallery view shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GalleryScope {
    /// Only the signed-in user's photos for the subject.
    Owner,
    /// Every photo for the subject.
    Subject,
}

impl FromStr for GalleryScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "subject" => Ok(Self::Subject),
            other => Err(format!("'{}' is not one of owner, subject", other)),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: Level,
    pub database_url: Option<String>,
    pub strategy: StrategyKind,
    pub scope: GalleryScope,
    pub reconcile_on_enter: bool,
    pub capture_max_width: u32,
    pub jpeg_quality: u8,
    pub max_record_bytes: usize,
    pub camera_source: Option<PathBuf>,
    /// Capture one still from the camera at startup and submit it.
    pub capture_on_start: bool,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub user_display_name: Option<String>,
    pub subject: String,
    pub import_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            database_url: None,
            strategy: StrategyKind::PollOnAction,
            scope: GalleryScope::Owner,
            reconcile_on_enter: true,
            capture_max_width: 900,
            jpeg_quality: 80,
            max_record_bytes: 1_048_576,
            camera_source: None,
            capture_on_start: false,
            user_id: None,
            user_email: None,
            user_display_name: None,
            subject: "analyse".to_string(),
            import_path: None,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Store and Reconciliation Settings ---
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        let strategy = parse_or(&lookup, "GALLERY_STRATEGY", defaults.strategy)?;
        let scope = parse_or(&lookup, "GALLERY_SCOPE", defaults.scope)?;
        let reconcile_on_enter =
            parse_or(&lookup, "RECONCILE_ON_ENTER", defaults.reconcile_on_enter)?;
        let max_record_bytes = parse_or(&lookup, "MAX_RECORD_BYTES", defaults.max_record_bytes)?;

        // --- Capture Settings ---
        let capture_max_width = parse_or(&lookup, "CAPTURE_MAX_WIDTH", defaults.capture_max_width)?;
        if capture_max_width == 0 {
            return Err(ConfigError::InvalidValue(
                "CAPTURE_MAX_WIDTH".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let jpeg_quality = parse_or(&lookup, "CAPTURE_JPEG_QUALITY", defaults.jpeg_quality)?;
        if !(1..=100).contains(&jpeg_quality) {
            return Err(ConfigError::InvalidValue(
                "CAPTURE_JPEG_QUALITY".to_string(),
                format!("{} is outside 1..=100", jpeg_quality),
            ));
        }
        let camera_source = lookup("CAMERA_SOURCE").map(PathBuf::from);
        let capture_on_start = parse_or(&lookup, "GALLERY_CAPTURE", defaults.capture_on_start)?;

        // --- Session Settings ---
        let user_id = lookup("GALLERY_USER_ID").filter(|v| !v.trim().is_empty());
        let user_email = lookup("GALLERY_USER_EMAIL");
        let user_display_name = lookup("GALLERY_DISPLAY_NAME");
        let subject = lookup("GALLERY_SUBJECT").unwrap_or(defaults.subject);
        let import_path = lookup("GALLERY_IMPORT").map(PathBuf::from);

        Ok(Self {
            log_level,
            database_url,
            strategy,
            scope,
            reconcile_on_enter,
            capture_max_width,
            jpeg_quality,
            max_record_bytes,
            camera_source,
            capture_on_start,
            user_id,
            user_email,
            user_display_name,
            subject,
            import_path,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
