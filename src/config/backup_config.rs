use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::env_vars::{expand_env_vars, expand_optional};
use crate::constants::{
    DATABASE_MAX_ATTEMPTS, DEFAULT_BASE_NAME, DEFAULT_COMPRESSION_LEVEL, DEFAULT_CONFIG_NAME,
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_EXPORT_TIMEOUT_SECS, DEFAULT_NOTIFY_TIMEOUT_SECS,
    DEFAULT_OUTPUT_DIR_NAME, DEFAULT_STORAGE_PREFIX, DEFAULT_SUBJECT_PREFIX,
    DEFAULT_UPLOAD_TIMEOUT_SECS, MAX_COMPRESSION_LEVEL, NOTIFICATION_MAX_ATTEMPTS,
    STORAGE_MAX_ATTEMPTS,
};
use crate::models::ExportFormat;
use crate::retry::RetryProfiles;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// Connection URL, usually `${DATABASE_URL}` so the secret stays out of the file
    pub url: String,
    /// Overrides the name reported by the database itself
    #[serde(default)]
    pub name: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "${DATABASE_URL}".to_string(),
            name: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,
    /// gzip level, 0 (store) to 9 (smallest)
    pub level: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl CompressionConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct NamingConfig {
    pub base_name: String,
    pub include_timestamp: bool,
    pub include_format: bool,
    pub include_compression_tag: bool,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            base_name: DEFAULT_BASE_NAME.to_string(),
            include_timestamp: true,
            include_format: true,
            include_compression_tag: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StorageConfig {
    pub bucket: String,
    #[serde(default = "default_storage_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    /// Request AES256 server-side encryption
    #[serde(default = "default_encrypt")]
    pub encrypt: bool,
}

fn default_encrypt() -> bool {
    true
}

fn default_storage_prefix() -> String {
    DEFAULT_STORAGE_PREFIX.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "${BACKUP_BUCKET}".to_string(),
            prefix: default_storage_prefix(),
            region: None,
            profile: None,
            encrypt: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct NotificationConfig {
    pub on_success: bool,
    pub on_partial: bool,
    pub on_failure: bool,
    pub recipients: Vec<String>,
    pub subject_prefix: String,
    /// Spool notifications here instead of only logging them
    pub outbox_dir: Option<PathBuf>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            on_success: true,
            on_partial: true,
            on_failure: true,
            recipients: Vec::new(),
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
            outbox_dir: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RetryAttempts {
    pub database_attempts: u32,
    pub storage_attempts: u32,
    pub notification_attempts: u32,
}

impl Default for RetryAttempts {
    fn default() -> Self {
        Self {
            database_attempts: DATABASE_MAX_ATTEMPTS,
            storage_attempts: STORAGE_MAX_ATTEMPTS,
            notification_attempts: NOTIFICATION_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect_secs: u64,
    pub export_secs: u64,
    pub upload_secs: u64,
    pub notify_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            export_secs: DEFAULT_EXPORT_TIMEOUT_SECS,
            upload_secs: DEFAULT_UPLOAD_TIMEOUT_SECS,
            notify_secs: DEFAULT_NOTIFY_TIMEOUT_SECS,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn export(&self) -> Duration {
        Duration::from_secs(self.export_secs)
    }

    pub fn upload(&self) -> Duration {
        Duration::from_secs(self.upload_secs)
    }

    pub fn notify(&self) -> Duration {
        Duration::from_secs(self.notify_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BackupConfig {
    pub database: DatabaseConfig,
    #[serde(default = "default_formats")]
    pub formats: Vec<ExportFormat>,
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub naming: NamingConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub retry: RetryAttempts,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_formats() -> Vec<ExportFormat> {
    ExportFormat::ALL.to_vec()
}

fn default_output_dir() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_OUTPUT_DIR_NAME)
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            formats: default_formats(),
            compression: CompressionConfig::default(),
            naming: NamingConfig::default(),
            storage: StorageConfig::default(),
            notifications: NotificationConfig::default(),
            retry: RetryAttempts::default(),
            timeouts: TimeoutConfig::default(),
            output_dir: default_output_dir(),
        }
    }
}

impl BackupConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: BackupConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create directory {}", parent.display()))?;
            }
        }

        fs::write(path, yaml).context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Expand `${VAR}` and `$VAR` references in every string field that
    /// may carry a secret or a deployment-specific value.
    pub fn process_environment_variables(&mut self) -> Result<()> {
        self.database.url = expand_env_vars(&self.database.url);
        expand_optional(&mut self.database.name);

        self.storage.bucket = expand_env_vars(&self.storage.bucket);
        self.storage.prefix = expand_env_vars(&self.storage.prefix);
        expand_optional(&mut self.storage.region);
        expand_optional(&mut self.storage.profile);

        self.naming.base_name = expand_env_vars(&self.naming.base_name);

        for recipient in &mut self.notifications.recipients {
            if recipient.contains('$') {
                *recipient = expand_env_vars(recipient);
            }
        }
        // an unset variable leaves an empty recipient behind
        self.notifications.recipients.retain(|r| !r.trim().is_empty());

        if let Some(dir) = self.notifications.outbox_dir.take() {
            let expanded = expand_env_vars(&dir.to_string_lossy());
            self.notifications.outbox_dir = Some(PathBuf::from(expanded));
        }

        let output = expand_env_vars(&self.output_dir.to_string_lossy());
        self.output_dir = PathBuf::from(output);

        Ok(())
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.formats.is_empty() {
            bail!("Configuration must enable at least one export format");
        }

        let mut seen = HashSet::new();
        for format in &self.formats {
            if !seen.insert(*format) {
                bail!("Export format '{}' is listed more than once", format);
            }
        }

        if self.compression.level > MAX_COMPRESSION_LEVEL {
            bail!(
                "Compression level {} is out of range (0-{})",
                self.compression.level,
                MAX_COMPRESSION_LEVEL
            );
        }

        let attempts = [
            ("database_attempts", self.retry.database_attempts),
            ("storage_attempts", self.retry.storage_attempts),
            ("notification_attempts", self.retry.notification_attempts),
        ];
        if let Some((field, _)) = attempts.iter().find(|(_, n)| *n == 0) {
            bail!("retry.{} must be at least 1", field);
        }

        if self.naming.base_name.trim().is_empty() {
            bail!("naming.base_name must not be empty");
        }

        if self.storage.bucket.trim().is_empty() {
            bail!("storage.bucket must not be empty");
        }

        Ok(())
    }

    /// Standard retry profiles with the configured attempt counts.
    pub fn retry_profiles(&self) -> RetryProfiles {
        RetryProfiles::with_attempts(
            self.retry.database_attempts,
            self.retry.storage_attempts,
            self.retry.notification_attempts,
        )
    }

    /// Replace the format list from a comma-separated string such as `sql,json`.
    pub fn set_formats_from_list(&mut self, list: &str) -> Result<()> {
        let formats = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<ExportFormat>())
            .collect::<Result<Vec<_>>>()?;

        if formats.is_empty() {
            return Err(anyhow!("No export formats given in '{}'", list));
        }

        self.formats = formats;
        Ok(())
    }

    /// Create a default configuration YAML file
    pub fn create_default_config_file(path: &Path) -> Result<()> {
        let default_config = BackupConfig::default();
        default_config.save_to_yaml_file(path)
    }
}

/// Load a configuration file or create a default one.
///
/// With a path that exists, the file is loaded. With a path that does not
/// exist, a default configuration is written there and returned. Without
/// a path, `backup_config.yaml` in the working directory is used when
/// present, otherwise the built-in defaults.
pub fn load_or_create_config(config_path: Option<&Path>) -> Result<BackupConfig> {
    match config_path {
        Some(path) => {
            if path.exists() {
                BackupConfig::from_yaml_file(path)
            } else {
                info!("Config {} not found, creating a default one", path.display());
                let default_config = BackupConfig::default();
                default_config.save_to_yaml_file(path)?;
                Ok(default_config)
            }
        }
        None => {
            let local = Path::new(DEFAULT_CONFIG_NAME);
            if local.exists() {
                info!("Using configuration from {}", local.display());
                BackupConfig::from_yaml_file(local)
            } else {
                info!("No config path provided, using default configuration");
                Ok(BackupConfig::default())
            }
        }
    }
}
