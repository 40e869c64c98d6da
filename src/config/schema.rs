use serde::Deserialize;
use std::fmt;

/// Optional `deploykit.toml` settings. Every section has defaults, so an
/// absent file and an empty file behave the same.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InstallerConfig {
    #[serde(default)]
    pub tools: ToolSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub redis: RedisSettings,
    #[serde(default)]
    pub stubs: StubSettings,
}

impl InstallerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        let required = [
            ("tools.composer", &self.tools.composer),
            ("tools.php", &self.tools.php),
            ("database.connection", &self.database.connection),
            ("database.host", &self.database.host),
            ("database.port", &self.database.port),
            ("database.username", &self.database.username),
            ("redis.client", &self.redis.client),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                issues.push(ValidationIssue::MissingField { field });
            }
        }

        if !self.database.port.trim().is_empty()
            && self.database.port.trim().parse::<u16>().is_err()
        {
            issues.push(ValidationIssue::InvalidValue {
                field: "database.port",
                message: format!("'{}' is not a port number", self.database.port),
            });
        }

        if self.database.connection.trim() == "sqlite" {
            issues.push(ValidationIssue::InvalidValue {
                field: "database.connection",
                message: "deployment target cannot be sqlite".to_string(),
            });
        }

        // Every value that lands in an env file
        let single_line = [
            ("database.connection", &self.database.connection),
            ("database.host", &self.database.host),
            ("database.port", &self.database.port),
            ("database.username", &self.database.username),
            ("database.password", &self.database.password),
            ("redis.client", &self.redis.client),
        ];
        for (field, value) in single_line {
            if value.contains(['\n', '\r']) {
                issues.push(ValidationIssue::InvalidValue {
                    field,
                    message: "must be a single line".to_string(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSettings {
    pub composer: String,
    pub php: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            composer: "composer".to_string(),
            php: "php".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSettings {
    pub connection: String,
    pub host: String,
    pub port: String,
    pub username: String,
    pub password: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            connection: "pgsql".to_string(),
            host: "127.0.0.1".to_string(),
            port: "5432".to_string(),
            username: "root".to_string(),
            password: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RedisSettings {
    pub client: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            client: "phpredis".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct StubSettings {
    /// Stub directory, relative to the project root.
    pub dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingField {
        field: &'static str,
    },
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "missing required field '{field}'")
            }
            ValidationIssue::InvalidValue { field, message } => {
                write!(f, "invalid value for '{field}': {message}")
            }
        }
    }
}
