//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a TOML file; every field has a built-in
//! default so a missing or partial file never prevents startup.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (applied by the binary on top of [`TomlConfig`])
//! 2. Environment variables (`FA_CONFIG`, `FA_ROOT_FOLDER`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "FA_CONFIG";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "FA_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "fileannotations.db";

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime. The service must restart
/// to pick up changes to the file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the SQLite database (optional)
    pub root_folder: Option<PathBuf>,

    /// Interface the HTTP server binds to
    pub bind_address: String,

    /// HTTP server port
    pub port: u16,

    /// Viewer language used when a request does not name one
    pub default_language: String,

    /// Overall deadline for enriching one batch request, in milliseconds
    pub request_deadline_ms: u64,

    pub logging: LoggingConfig,
    pub cache: CacheSettings,
    pub http: HttpSettings,
    pub endpoints: EndpointSettings,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: "127.0.0.1".to_string(),
            port: 5731,
            default_language: "en".to_string(),
            request_deadline_ms: 8_000,
            logging: LoggingConfig::default(),
            cache: CacheSettings::default(),
            http: HttpSettings::default(),
            endpoints: EndpointSettings::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    pub level: String,

    /// Output format
    pub format: LogFormat,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Which cache store backs the annotation cache
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Per-process map
    Memory,
    /// `cache_entries` table in the service database (plus optional replicas)
    Sqlite,
}

/// Cache lifetimes and backend selection
///
/// All TTL values are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: CacheBackend,

    /// Floor TTL applied when a recomputed value changed
    pub min_ttl_secs: u64,

    /// Ceiling for the elastic TTL of enrichment fragments
    pub max_ttl_secs: u64,

    /// Grace period after expiry during which a stale value may stand in
    /// for a failed recomputation
    pub stale_ttl_secs: u64,

    /// TTL of the discovered image-property list
    pub discovery_ttl_secs: u64,

    /// Capacity of the memory backend
    pub max_entries: usize,

    /// Extra SQLite databases kept in sync with the primary (sqlite backend only)
    pub replica_paths: Vec<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            min_ttl_secs: 60,
            max_ttl_secs: 86_400,
            stale_ttl_secs: 3_600,
            discovery_ttl_secs: 2_592_000,
            max_entries: 10_000,
            replica_paths: Vec::new(),
        }
    }
}

/// Outbound HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,

    /// Shared budget for all outbound API calls
    pub requests_per_second: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: get_user_agent(),
            timeout_secs: 10,
            connect_timeout_secs: 5,
            requests_per_second: 10,
        }
    }
}

/// Remote API locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointSettings {
    /// Commons action API (category members, image info)
    pub commons_api: String,

    /// Prefix for human-facing Commons page links
    pub commons_wiki: String,

    /// Wikipedia action API; `{host}` is replaced by e.g. `en.wikipedia.org`
    pub wikipedia_api: String,

    /// Wikidata action API (wbgetentities)
    pub wikidata_api: String,

    /// Wikidata Query Service endpoint
    pub wikidata_sparql: String,

    /// Class whose instances are image-valued Wikidata properties
    pub image_property_class: String,

    /// Action API used to render annotation wikitext
    pub render_api: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            commons_api: "https://commons.wikimedia.org/w/api.php".to_string(),
            commons_wiki: "https://commons.wikimedia.org/wiki/".to_string(),
            wikipedia_api: "https://{host}/w/api.php".to_string(),
            wikidata_api: "https://www.wikidata.org/w/api.php".to_string(),
            wikidata_sparql: "https://query.wikidata.org/sparql".to_string(),
            image_property_class: "Q26940804".to_string(),
            render_api: "https://commons.wikimedia.org/w/api.php".to_string(),
        }
    }
}

/// Standard User-Agent for outbound HTTP clients
///
/// Wikimedia APIs reject anonymous clients, so every request identifies the tool.
pub fn get_user_agent() -> String {
    format!(
        "FileAnnotations/{} (https://www.mediawiki.org/wiki/Extension:FileAnnotations)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Built-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/fileannotations (or /var/lib/fileannotations for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("fileannotations"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/fileannotations"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("fileannotations"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/fileannotations"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("fileannotations"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\fileannotations"))
    } else {
        PathBuf::from("./fileannotations_data")
    }
}

/// Default per-user config file location (`<config_dir>/fileannotations/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fileannotations").join("config.toml"))
}

/// Pick the config file to load
///
/// Priority: explicit path (CLI) → `FA_CONFIG` → default location if it exists.
/// Returns `None` when no file applies; callers then use built-in defaults.
pub fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|p| p.exists())
}

/// Load a TOML config file
///
/// Unknown keys are ignored and missing keys take their defaults.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load configuration, degrading to defaults
///
/// An explicitly requested file that cannot be read is an error. A default
/// location that fails to parse only produces a warning.
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    match locate_config_file(explicit) {
        Some(path) if explicit.is_some() => load_toml_config(&path),
        Some(path) => match load_toml_config(&path) {
            Ok(config) => {
                debug!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("{}; using built-in defaults", e);
                Ok(TomlConfig::default())
            }
        },
        None => {
            debug!("No configuration file found; using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Write a config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    std::fs::write(&tmp_path, content)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(Error::Io(e));
    }

    Ok(())
}

/// Root folder resolution
///
/// Priority: CLI argument → `FA_ROOT_FOLDER` → TOML `root_folder` → compiled default.
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, toml_value: Option<PathBuf>) -> Self {
        Self { cli_arg, toml_value }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and locates the database inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder (and parents) if missing; idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}
