use std::env;

use chrono::Duration;
use secrecy::SecretString;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Mongo,
    Memory,
}

impl StorageBackend {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "memory" | "in-memory" | "in_memory" => StorageBackend::Memory,
            _ => StorageBackend::Mongo,
        }
    }
}

/// School-wide CBT timing rules. Configured once for the whole school.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CutoffPolicy {
    pub first_cutoff_minutes: i64,
    pub last_cutoff_minutes: i64,
    pub grace_period_minutes: i64,
}

impl CutoffPolicy {
    pub fn cutoff_before(&self) -> Duration {
        Duration::minutes(self.first_cutoff_minutes)
    }

    pub fn cutoff_after(&self) -> Duration {
        Duration::minutes(self.last_cutoff_minutes)
    }

    /// Gap required between the end of one subject and the start of the next on the same day.
    pub fn buffer(&self) -> Duration {
        Duration::minutes(self.first_cutoff_minutes + self.last_cutoff_minutes)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::minutes(self.grace_period_minutes)
    }
}

impl Default for CutoffPolicy {
    fn default() -> Self {
        Self {
            first_cutoff_minutes: 10,
            last_cutoff_minutes: 5,
            grace_period_minutes: 5,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub mongo_conn_string: String,
    pub mongo_db_name: String,
    pub storage_backend: StorageBackend,
    pub web_server_host: String,
    pub web_server_port: u16,
    pub jwt_secret: SecretString,
    pub jwt_expiration_hours: i64,
    pub cutoffs: CutoffPolicy,
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = CutoffPolicy::default();

        Self {
            mongo_conn_string: env::var("MONGO_CONN_STRING")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            mongo_db_name: env::var("MONGO_DB_NAME").unwrap_or_else(|_| "cbt-local".to_string()),
            storage_backend: StorageBackend::parse(
                &env::var("STORAGE_BACKEND").unwrap_or_else(|_| "mongo".to_string()),
            ),
            web_server_host: env::var("WEB_SERVER_HOST")
                .unwrap_or_else(|_| "localhost".to_string()),
            web_server_port: env::var("WEB_SERVER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            jwt_secret: SecretString::from(env::var("JWT_SECRET")
                .unwrap_or_else(|_| "dev_secret_key_change_in_production".to_string())),
            jwt_expiration_hours: env_i64("JWT_EXPIRATION_HOURS", 24),
            cutoffs: CutoffPolicy {
                first_cutoff_minutes: env_i64(
                    "CBT_FIRST_CUTOFF_MINUTES",
                    defaults.first_cutoff_minutes,
                ),
                last_cutoff_minutes: env_i64(
                    "CBT_LAST_CUTOFF_MINUTES",
                    defaults.last_cutoff_minutes,
                ),
                grace_period_minutes: env_i64(
                    "CBT_SUBMISSION_GRACE_MINUTES",
                    defaults.grace_period_minutes,
                ),
            },
        }
    }

    /// Validate that production-critical configuration is set
    /// Panics if required secrets are using default values
    pub fn validate_for_production(&self) {
        use secrecy::ExposeSecret;

        let jwt_secret = self.jwt_secret.expose_secret();

        if jwt_secret == "dev_secret_key_change_in_production" {
            panic!(
                "FATAL: JWT_SECRET is using default value! Set JWT_SECRET environment variable to a secure random string."
            );
        }

        if jwt_secret.len() < 32 {
            panic!(
                "FATAL: JWT_SECRET is too short ({}). Must be at least 32 characters for security.",
                jwt_secret.len()
            );
        }

        if self.storage_backend == StorageBackend::Memory {
            panic!("FATAL: STORAGE_BACKEND=memory is not durable and cannot be used in production.");
        }

        if self.cutoffs.first_cutoff_minutes < 0
            || self.cutoffs.last_cutoff_minutes < 0
            || self.cutoffs.grace_period_minutes < 0
        {
            panic!("FATAL: CBT cutoff and grace minutes must not be negative.");
        }
    }

    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            mongo_conn_string: "mongodb://localhost:27017".to_string(),
            mongo_db_name: "cbt-test".to_string(),
            storage_backend: StorageBackend::Memory,
            web_server_host: "127.0.0.1".to_string(),
            web_server_port: 8080,
            jwt_secret: SecretString::from("test_jwt_secret_key".to_string()),
            jwt_expiration_hours: 1,
            cutoffs: CutoffPolicy::default(),
        }
    }
}
