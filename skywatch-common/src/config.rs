//! Configuration loading and root folder resolution
//!
//! Startup configuration follows graceful degradation: a missing TOML file
//! or environment variable never aborts startup; compiled platform
//! defaults fill the gaps. The one exception is the JWT secret, which a
//! release build refuses to run without.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Compiled per-platform defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    /// Default root folder locations per platform
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "linux") {
            dirs::data_local_dir()
                .map(|d| d.join("skywatch"))
                .unwrap_or_else(|| PathBuf::from("/var/lib/skywatch"))
        } else if cfg!(target_os = "macos") {
            dirs::data_dir()
                .map(|d| d.join("skywatch"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/skywatch"))
        } else if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join("skywatch"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\skywatch"))
        } else {
            PathBuf::from("./skywatch_data")
        };

        Self {
            root_folder,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Logging section of the TOML config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

/// On-disk TOML configuration schema
///
/// All fields are optional; absent fields fall back to environment
/// variables or compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub allowed_origin: Option<String>,
    pub enrichment_url: Option<String>,
}

impl TomlConfig {
    /// Load the per-module TOML config file, tolerating absence
    ///
    /// Lookup order: `~/.config/skywatch/<module>.toml`, then (Linux only)
    /// `/etc/skywatch/<module>.toml`. A missing or unparsable file yields
    /// the default (empty) config with a warning, never an error.
    pub fn load(module_name: &str) -> Self {
        for path in Self::candidate_paths(module_name) {
            if !path.exists() {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<TomlConfig>(&contents) {
                    Ok(config) => {
                        info!("Loaded config file: {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Ignoring malformed config file {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Ignoring unreadable config file {}: {}", path.display(), e);
                }
            }
        }
        TomlConfig::default()
    }

    fn candidate_paths(module_name: &str) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("skywatch").join(format!("{}.toml", module_name)));
        }
        if cfg!(target_os = "linux") {
            paths.push(PathBuf::from(format!("/etc/skywatch/{}.toml", module_name)));
        }
        paths
    }
}

/// Root folder resolution following 4-tier priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable (`SKYWATCH_ROOT_FOLDER`, then `SKYWATCH_ROOT`)
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub struct RootFolderResolver {
    module_name: String,
    cli_override: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_override: None,
        }
    }

    /// Supply the command-line override, if any
    pub fn with_cli_override(mut self, path: Option<PathBuf>) -> Self {
        self.cli_override = path;
        self
    }

    /// Resolve the root folder; never fails
    pub fn resolve(&self) -> PathBuf {
        // Priority 1: command-line argument
        if let Some(path) = &self.cli_override {
            return path.clone();
        }

        // Priority 2: environment variables
        if let Ok(path) = std::env::var("SKYWATCH_ROOT_FOLDER") {
            return PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("SKYWATCH_ROOT") {
            return PathBuf::from(path);
        }

        // Priority 3: TOML config file
        if let Some(path) = TomlConfig::load(&self.module_name).root_folder {
            return path;
        }

        // Priority 4: compiled default
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Prepares the resolved root folder for use
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root folder (and parents) if missing; idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Path of the service database inside the root folder
    pub fn database_path(&self) -> PathBuf {
        self.root.join("skywatch.db")
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

/// Runtime configuration for a SkyWatch service
///
/// Constructed once at process start and injected into application state;
/// nothing reads the environment after startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_host: String,
    pub port: u16,
    /// CORS origin; `"*"` allows any origin (without credentials)
    pub allowed_origin: String,
    pub jwt_secret: String,
    /// Endpoint notified when a brand-new location enters the catalog;
    /// `None` disables the trigger
    pub enrichment_url: Option<String>,
}

impl ServiceConfig {
    /// Assemble the runtime config from environment and TOML
    ///
    /// `JWT_SECRET` must be set (minimum 32 bytes). Debug builds generate
    /// a random printable secret with a warning when it is missing;
    /// release builds fail startup.
    pub fn load(toml: &TomlConfig, port: u16) -> Result<Self> {
        let allowed_origin = std::env::var("SKYWATCH_ALLOWED_ORIGIN")
            .ok()
            .or_else(|| toml.allowed_origin.clone())
            .unwrap_or_else(|| "*".to_string());

        let enrichment_url = std::env::var("SKYWATCH_ENRICHMENT_URL")
            .ok()
            .or_else(|| toml.enrichment_url.clone());

        let jwt_secret = load_jwt_secret()?;

        Ok(Self {
            bind_host: "127.0.0.1".to_string(),
            port,
            allowed_origin,
            jwt_secret,
            enrichment_url,
        })
    }
}

/// Load the JWT secret from the environment
fn load_jwt_secret() -> Result<String> {
    match std::env::var("JWT_SECRET") {
        Ok(secret) => {
            if secret.len() < 32 {
                return Err(Error::Config(
                    "JWT_SECRET must be at least 32 characters long".to_string(),
                ));
            }
            Ok(secret)
        }
        Err(_) => {
            #[cfg(debug_assertions)]
            {
                warn!("JWT_SECRET not set; generating a temporary secret for development");
                Ok(generate_printable_secret())
            }
            #[cfg(not(debug_assertions))]
            {
                Err(Error::Config(
                    "JWT_SECRET environment variable must be set in production".to_string(),
                ))
            }
        }
    }
}

/// Generate a random printable secret (development fallback only)
#[cfg(debug_assertions)]
fn generate_printable_secret() -> String {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}
