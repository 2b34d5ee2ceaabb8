//! Configuration structures for the GA4 user simulator
//!
//! This module contains the simulation configuration structure, the command
//! line surface and the validation logic that guards a run before any
//! collaborator is contacted.

use super::SimulationMode;
use crate::session::MEASUREMENT_ID_PREFIX;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Defaults applied when neither the config file nor the CLI set a value
pub mod defaults {
    /// Site whose own analytics tag is exercised by session bootstraps
    pub const TARGET_URL: &str = "https://paolobietolini.me";

    /// Configured concurrency before the per-mode ceiling is applied
    pub const MAX_CONCURRENT_USERS: usize = 50;

    /// Daily ceiling on simulated users per run
    pub const MAX_DAILY_USERS: usize = 1000;

    /// Lower engagement bound in milliseconds
    pub const MIN_SESSION_DURATION_MS: u64 = 5_000;

    /// Upper engagement bound in milliseconds
    pub const MAX_SESSION_DURATION_MS: u64 = 120_000;

    /// Minimum pages viewed per session, including the landing page
    pub const MIN_PAGES_PER_SESSION: u32 = 1;

    /// Maximum pages viewed per session, including the landing page
    pub const MAX_PAGES_PER_SESSION: u32 = 5;

    /// Users simulated when `--users` is not given
    pub const USERS: usize = 10;
}

const MP_COLLECT_URL: &str = "https://www.google-analytics.com/mp/collect";
const MP_DEBUG_COLLECT_URL: &str = "https://www.google-analytics.com/debug/mp/collect";

/// GA4 property credentials for the Measurement Protocol
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Ga4Config {
    /// Measurement ID of the web stream (`G-XXXXXXX`)
    pub measurement_id: String,
    /// Measurement Protocol API secret
    pub api_secret: String,
}

impl Ga4Config {
    /// Create credentials from a measurement ID and an API secret
    pub fn new(measurement_id: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self { measurement_id: measurement_id.into(), api_secret: api_secret.into() }
    }

    /// Collection endpoint
    pub fn endpoint(&self) -> String {
        format!(
            "{}?measurement_id={}&api_secret={}",
            MP_COLLECT_URL, self.measurement_id, self.api_secret
        )
    }

    /// Validation endpoint, which reports payload problems instead of ingesting
    pub fn debug_endpoint(&self) -> String {
        format!(
            "{}?measurement_id={}&api_secret={}",
            MP_DEBUG_COLLECT_URL, self.measurement_id, self.api_secret
        )
    }

    /// Measurement ID without the `G-` prefix, as used in the session cookie name
    pub fn container_id(&self) -> &str {
        crate::session::container_id(&self.measurement_id)
    }
}

/// Command line arguments structure
#[derive(Debug, Clone, Parser)]
#[command(
    name = "ga4-user-simulator",
    version,
    about = "GA4 User Simulator - Generates synthetic analytics users and events",
    long_about = "Simulates users for GA4 testing. Sessions are bootstrapped against the target site and/or events are sent directly through the Measurement Protocol.

MODES:
    hybrid   - Browser bootstrap + Measurement Protocol events (recommended)
    browser  - Full browser simulation (slowest, most realistic)
    mp       - Measurement Protocol only (fastest, partial reporting)

EXAMPLES:
    # Simulate 10 users (hybrid mode)
    ga4-user-simulator --users 10

    # Fast simulation against the validation endpoint
    ga4-user-simulator --users 50 --mode mp --debug

    # Full browser simulation
    ga4-user-simulator --users 5 --mode browser

    # Exercise the orchestration without touching the network
    ga4-user-simulator --users 200 --mode hybrid --offline

CONFIGURATION:
    Configuration can be provided via:
    1. Command line arguments or their environment variables (highest priority)
    2. Configuration file (--config flag, JSON)
    3. Default values (lowest priority)

    Use --print-config to generate a template configuration file."
)]
pub struct CliArgs {
    /// Configuration file path (JSON format)
    #[arg(long, help = "Configuration file path (JSON format)")]
    pub config: Option<String>,

    /// Number of users to simulate
    #[arg(short = 'n', long, default_value_t = defaults::USERS, help = "Number of users to simulate")]
    pub users: usize,

    /// Simulation mode
    #[arg(
        short,
        long,
        default_value = "hybrid",
        help = "Simulation mode (hybrid, browser or mp)"
    )]
    pub mode: SimulationMode,

    /// Use the GA4 validation endpoint
    #[arg(short, long, help = "Use GA4 debug endpoint for validation")]
    pub debug: bool,

    /// Override max concurrent users from config
    #[arg(short, long, env = "MAX_CONCURRENT_USERS", help = "Override max concurrent users")]
    pub concurrent: Option<usize>,

    /// Site visited by session bootstraps
    #[arg(long, env = "TARGET_URL", help = "Target site URL")]
    pub target_url: Option<String>,

    /// GA4 measurement ID
    #[arg(long, env = "GA4_MEASUREMENT_ID", help = "GA4 measurement ID (G-XXXXXXX)")]
    pub measurement_id: Option<String>,

    /// GA4 Measurement Protocol API secret
    #[arg(long, env = "GA4_MP_SECRET", hide_env_values = true, help = "Measurement Protocol API secret")]
    pub api_secret: Option<String>,

    /// Daily ceiling on simulated users
    #[arg(long, env = "MAX_DAILY_USERS", help = "Maximum users per run")]
    pub max_daily_users: Option<usize>,

    /// Lower engagement bound in milliseconds
    #[arg(long, env = "MIN_SESSION_DURATION_MS", help = "Minimum session duration (ms)")]
    pub min_session_duration_ms: Option<u64>,

    /// Upper engagement bound in milliseconds
    #[arg(long, env = "MAX_SESSION_DURATION_MS", help = "Maximum session duration (ms)")]
    pub max_session_duration_ms: Option<u64>,

    /// Minimum pages per session
    #[arg(long, env = "MIN_PAGES_PER_SESSION", help = "Minimum pages per session")]
    pub min_pages_per_session: Option<u32>,

    /// Maximum pages per session
    #[arg(long, env = "MAX_PAGES_PER_SESSION", help = "Maximum pages per session")]
    pub max_pages_per_session: Option<u32>,

    /// Random seed for reproducible results
    #[arg(long, help = "Random seed for reproducible results")]
    pub seed: Option<u64>,

    /// Where to write the final statistics as JSON
    #[arg(long, help = "Write final statistics to this JSON file")]
    pub stats_output: Option<String>,

    /// Run against in-process collaborators instead of the network
    #[arg(long, help = "Run without network access using in-process collaborators")]
    pub offline: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, help = "Enable debug logging")]
    pub debug_logs: bool,

    /// Console logs as JSON lines
    #[arg(long, help = "Write console logs as JSON lines")]
    pub log_json: bool,

    /// Directory for rolling JSON log files
    #[arg(long, help = "Also write JSON logs to this directory")]
    pub log_dir: Option<String>,

    /// Dry run mode - validate configuration without running simulation
    #[arg(long, help = "Validate configuration without running simulation")]
    pub dry_run: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in JSON format and exit")]
    pub print_config: bool,
}

/// Configuration file structure (allows partial configuration)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Site visited by session bootstraps
    pub target_url: Option<String>,

    /// GA4 property credentials
    pub ga4: Option<Ga4Config>,

    /// Configured concurrency before the per-mode ceiling
    pub max_concurrent_users: Option<usize>,

    /// Daily ceiling on simulated users
    pub max_daily_users: Option<usize>,

    /// Lower engagement bound in milliseconds
    pub min_session_duration_ms: Option<u64>,

    /// Upper engagement bound in milliseconds
    pub max_session_duration_ms: Option<u64>,

    /// Minimum pages per session
    pub min_pages_per_session: Option<u32>,

    /// Maximum pages per session
    pub max_pages_per_session: Option<u32>,

    /// Random seed for reproducible results
    pub seed: Option<u64>,

    /// Where to write the final statistics as JSON
    pub stats_output: Option<String>,
}

impl ConfigFile {
    /// Overwrite every field of `config` this file sets
    pub fn apply_to(self, config: &mut SimulationConfig) {
        overlay(&mut config.target_url, self.target_url);
        overlay(&mut config.ga4, self.ga4);
        overlay(&mut config.max_concurrent_users, self.max_concurrent_users);
        overlay(&mut config.max_daily_users, self.max_daily_users);
        overlay(&mut config.min_session_duration_ms, self.min_session_duration_ms);
        overlay(&mut config.max_session_duration_ms, self.max_session_duration_ms);
        overlay(&mut config.min_pages_per_session, self.min_pages_per_session);
        overlay(&mut config.max_pages_per_session, self.max_pages_per_session);
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.stats_output.is_some() {
            config.stats_output = self.stats_output;
        }
    }
}

fn overlay<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// Configuration for a simulation run
///
/// Read-only to the orchestration core once a run starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    /// Site visited by session bootstraps
    pub target_url: String,

    /// GA4 property credentials
    pub ga4: Ga4Config,

    /// Configured concurrency before the per-mode ceiling
    pub max_concurrent_users: usize,

    /// Daily ceiling on simulated users; larger requests are clamped
    pub max_daily_users: usize,

    /// Lower engagement bound in milliseconds
    pub min_session_duration_ms: u64,

    /// Upper engagement bound in milliseconds
    pub max_session_duration_ms: u64,

    /// Minimum pages per session, including the landing page
    pub min_pages_per_session: u32,

    /// Maximum pages per session, including the landing page
    pub max_pages_per_session: u32,

    /// Random seed for reproducible results
    pub seed: Option<u64>,

    /// Where to write the final statistics as JSON
    pub stats_output: Option<String>,
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Configuration file read error
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    /// JSON parsing error
    #[error("Failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Unsupported configuration file format
    #[error("Unsupported configuration file format: {0} (supported: .json)")]
    UnsupportedFormat(String),
}

/// Validation errors for simulation configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    /// Daily ceiling is zero
    #[error("Max daily users must be greater than 0, got {0}")]
    InvalidDailyLimit(usize),

    /// Concurrency is zero
    #[error("Max concurrent users must be greater than 0, got {0}")]
    InvalidConcurrency(usize),

    /// Session duration bounds are inverted
    #[error("Invalid session duration range: min ({0}ms) must be <= max ({1}ms)")]
    InvalidSessionDurationRange(u64, u64),

    /// Page bounds are inverted or below one
    #[error("Invalid pages per session range: min ({0}) must be >= 1 and <= max ({1})")]
    InvalidPagesRange(u32, u32),

    /// Target URL is not an http(s) URL
    #[error("Target URL must start with http:// or https://, got {0:?}")]
    InvalidTargetUrl(String),

    /// Measurement ID missing or malformed
    #[error("Measurement ID must look like G-XXXXXXX, got {0:?}")]
    InvalidMeasurementId(String),

    /// API secret missing
    #[error("Measurement Protocol API secret is not set (GA4_MP_SECRET)")]
    MissingApiSecret,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            target_url: defaults::TARGET_URL.to_string(),
            ga4: Ga4Config::default(),
            max_concurrent_users: defaults::MAX_CONCURRENT_USERS,
            max_daily_users: defaults::MAX_DAILY_USERS,
            min_session_duration_ms: defaults::MIN_SESSION_DURATION_MS,
            max_session_duration_ms: defaults::MAX_SESSION_DURATION_MS,
            min_pages_per_session: defaults::MIN_PAGES_PER_SESSION,
            max_pages_per_session: defaults::MAX_PAGES_PER_SESSION,
            seed: None,
            stats_output: None,
        }
    }
}

impl SimulationConfig {
    /// Resolve the run configuration: defaults, then the `--config` file, then the CLI
    pub fn from_cli_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_cli(args);
        Ok(config)
    }

    /// Defaults overlaid with a JSON config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => {}
            Some(ext) => return Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => return Err(ConfigError::UnsupportedFormat("no extension".to_string())),
        }

        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound(path.display().to_string()),
            _ => ConfigError::ReadError(e),
        })?;
        let file: ConfigFile = serde_json::from_str(&content)?;

        let mut config = Self::default();
        file.apply_to(&mut config);
        Ok(config)
    }

    fn apply_cli(&mut self, args: &CliArgs) {
        overlay(&mut self.target_url, args.target_url.clone());
        overlay(&mut self.ga4.measurement_id, args.measurement_id.clone());
        overlay(&mut self.ga4.api_secret, args.api_secret.clone());
        overlay(&mut self.max_concurrent_users, args.concurrent);
        overlay(&mut self.max_daily_users, args.max_daily_users);
        overlay(&mut self.min_session_duration_ms, args.min_session_duration_ms);
        overlay(&mut self.max_session_duration_ms, args.max_session_duration_ms);
        overlay(&mut self.min_pages_per_session, args.min_pages_per_session);
        overlay(&mut self.max_pages_per_session, args.max_pages_per_session);
        if args.seed.is_some() {
            self.seed = args.seed;
        }
        if args.stats_output.is_some() {
            self.stats_output = args.stats_output.clone();
        }
    }

    /// Print configuration as JSON
    pub fn print_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate the run parameters
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_daily_users == 0 {
            return Err(ConfigValidationError::InvalidDailyLimit(self.max_daily_users));
        }

        if self.max_concurrent_users == 0 {
            return Err(ConfigValidationError::InvalidConcurrency(self.max_concurrent_users));
        }

        if self.min_session_duration_ms > self.max_session_duration_ms {
            return Err(ConfigValidationError::InvalidSessionDurationRange(
                self.min_session_duration_ms,
                self.max_session_duration_ms,
            ));
        }

        if self.min_pages_per_session == 0 || self.min_pages_per_session > self.max_pages_per_session {
            return Err(ConfigValidationError::InvalidPagesRange(
                self.min_pages_per_session,
                self.max_pages_per_session,
            ));
        }

        if !(self.target_url.starts_with("http://") || self.target_url.starts_with("https://")) {
            return Err(ConfigValidationError::InvalidTargetUrl(self.target_url.clone()));
        }

        Ok(())
    }

    /// Validate the GA4 credentials needed by live collaborators
    pub fn validate_credentials(&self) -> Result<(), ConfigValidationError> {
        let id = &self.ga4.measurement_id;
        if id.len() <= MEASUREMENT_ID_PREFIX.len() || !id.starts_with(MEASUREMENT_ID_PREFIX) {
            return Err(ConfigValidationError::InvalidMeasurementId(id.clone()));
        }

        if self.ga4.api_secret.trim().is_empty() {
            return Err(ConfigValidationError::MissingApiSecret);
        }

        Ok(())
    }

    /// Session duration bounds as a tuple
    pub fn session_duration_range_ms(&self) -> (u64, u64) {
        (self.min_session_duration_ms, self.max_session_duration_ms)
    }

    /// Bounds on pages viewed after the landing page
    pub fn additional_pages_range(&self) -> (u32, u32) {
        (
            self.min_pages_per_session.saturating_sub(1),
            self.max_pages_per_session.saturating_sub(1),
        )
    }

    /// Admission capacity for a mode: the configured value capped by the mode ceiling
    pub fn effective_concurrency(&self, mode: SimulationMode) -> usize {
        self.max_concurrent_users.min(mode.concurrency_ceiling())
    }

    /// Requested users clamped to the daily ceiling
    pub fn clamp_users(&self, requested: u64) -> u64 {
        requested.min(self.max_daily_users as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulation_config_default() {
        let config = SimulationConfig::default();

        assert_eq!(config.target_url, "https://paolobietolini.me");
        assert_eq!(config.max_concurrent_users, 50);
        assert_eq!(config.max_daily_users, 1000);
        assert_eq!(config.min_session_duration_ms, 5000);
        assert_eq!(config.max_session_duration_ms, 120_000);
        assert_eq!(config.min_pages_per_session, 1);
        assert_eq!(config.max_pages_per_session, 5);
        assert!(config.seed.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_ga4_endpoints() {
        let ga4 = Ga4Config::new("G-ABC123", "s3cret");
        assert_eq!(
            ga4.endpoint(),
            "https://www.google-analytics.com/mp/collect?measurement_id=G-ABC123&api_secret=s3cret"
        );
        assert!(ga4.debug_endpoint().starts_with("https://www.google-analytics.com/debug/mp/collect?"));
        assert_eq!(ga4.container_id(), "ABC123");
        assert_eq!(Ga4Config::new("UA-1", "x").container_id(), "UA-1");
    }

    #[test]
    fn test_cli_parsing_defaults() {
        let args = CliArgs::try_parse_from(["test"]).unwrap();
        assert_eq!(args.users, 10);
        assert_eq!(args.mode, SimulationMode::Hybrid);
        assert!(!args.debug);
        assert!(!args.offline);
    }

    #[test]
    fn test_cli_overrides() {
        let args = CliArgs::try_parse_from([
            "test", "-n", "25", "-m", "mp", "-d", "-c", "7", "--max-daily-users", "20", "--seed", "9",
        ])
        .unwrap();
        assert_eq!(args.users, 25);
        assert_eq!(args.mode, SimulationMode::ProtocolOnly);
        assert!(args.debug);

        let config = SimulationConfig::from_cli_args(&args).unwrap();
        assert_eq!(config.max_concurrent_users, 7);
        assert_eq!(config.max_daily_users, 20);
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn test_config_file_loading() {
        use std::io::Write;
        use tempfile::Builder;

        let mut temp_file = Builder::new().suffix(".json").tempfile().unwrap();
        let config_json = r#"{
            "target_url": "https://example.org",
            "ga4": { "measurement_id": "G-FILE01", "api_secret": "abc" },
            "max_daily_users": 40,
            "max_pages_per_session": 3
        }"#;
        temp_file.write_all(config_json.as_bytes()).unwrap();

        let config = SimulationConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.target_url, "https://example.org");
        assert_eq!(config.ga4.container_id(), "FILE01");
        assert_eq!(config.max_daily_users, 40);
        assert_eq!(config.max_pages_per_session, 3);
        // Unset fields fall back to defaults
        assert_eq!(config.max_concurrent_users, 50);
        config.validate().unwrap();
        config.validate_credentials().unwrap();
    }

    #[test]
    fn test_config_file_errors() {
        assert!(matches!(
            SimulationConfig::from_file("/definitely/not/here.json"),
            Err(ConfigError::FileNotFound(_))
        ));

        let temp_file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(matches!(
            SimulationConfig::from_file(temp_file.path()),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_validation_failures() {
        let config = SimulationConfig { max_daily_users: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigValidationError::InvalidDailyLimit(0))));

        let config = SimulationConfig { max_concurrent_users: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigValidationError::InvalidConcurrency(0))));

        let config = SimulationConfig {
            min_session_duration_ms: 10,
            max_session_duration_ms: 5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidSessionDurationRange(10, 5))
        ));

        let config = SimulationConfig { min_pages_per_session: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigValidationError::InvalidPagesRange(0, 5))));

        let config = SimulationConfig { target_url: "ftp://nope".into(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigValidationError::InvalidTargetUrl(_))));
    }

    #[test]
    fn test_credential_validation() {
        let config = SimulationConfig::default();
        assert!(matches!(
            config.validate_credentials(),
            Err(ConfigValidationError::InvalidMeasurementId(_))
        ));

        let config = SimulationConfig { ga4: Ga4Config::new("G-ABC", " "), ..Default::default() };
        assert!(matches!(config.validate_credentials(), Err(ConfigValidationError::MissingApiSecret)));
    }

    #[test]
    fn test_derived_limits() {
        let config = SimulationConfig { max_concurrent_users: 50, max_daily_users: 30, ..Default::default() };
        assert_eq!(config.effective_concurrency(SimulationMode::Hybrid), 10);
        assert_eq!(config.effective_concurrency(SimulationMode::ProtocolOnly), 20);
        assert_eq!(config.clamp_users(100), 30);
        assert_eq!(config.clamp_users(12), 12);
        assert_eq!(config.additional_pages_range(), (0, 4));

        let config = SimulationConfig { max_concurrent_users: 3, ..Default::default() };
        assert_eq!(config.effective_concurrency(SimulationMode::ProtocolOnly), 3);
    }
}
