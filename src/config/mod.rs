// Re-export all items from the submodules
mod backup_config;
mod env_vars;

// Re-export backup config
pub use backup_config::{
    BackupConfig,
    CompressionConfig,
    DatabaseConfig,
    NamingConfig,
    NotificationConfig,
    RetryAttempts,
    StorageConfig,
    TimeoutConfig,
    load_or_create_config,
};

// Re-export environment variable functions
pub use env_vars::{expand_env_vars, expand_optional};
