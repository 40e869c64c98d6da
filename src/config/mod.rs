pub mod loader;
pub mod schema;

pub use loader::{load_from_path, load_from_project, load_from_str, ConfigError, CONFIG_FILE};
pub use schema::{
    DatabaseSettings, InstallerConfig, RedisSettings, StubSettings, ToolSettings,
    ValidationError, ValidationIssue,
};
