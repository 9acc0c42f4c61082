//! Configuration loading.
//!
//! Recognized keys use dotted names (`server.port`, `postgres.host`, ...)
//! and are overridable via environment variables with `.` replaced by
//! `__` (`server.port` -> `SERVER__PORT`,
//! `postgres.max_open_connections` -> `POSTGRES__MAX_OPEN_CONNECTIONS`),
//! per the spec's environment contract. The double underscore separates
//! sections without colliding with the single underscores already inside
//! multi-word field names. `.env` files are loaded first via `dotenvy` so
//! local development doesn't need to export every variable by hand.

use crate::error::AppError;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub context_path: String,
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    #[serde(default = "default_max_open")]
    pub max_open_connections: u32,
    #[serde(default = "default_max_idle")]
    pub max_idle_connections: u32,
    #[serde(default = "default_conn_lifetime")]
    pub conn_max_lifetime_minutes: u64,
}

fn default_pg_port() -> u16 {
    5432
}
fn default_max_open() -> u32 {
    10
}
fn default_max_idle() -> u32 {
    5
}
fn default_conn_lifetime() -> u64 {
    30
}

impl PostgresConfig {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.dbname
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OidcConfig {
    pub issuer: String,
    pub audience: String,
    pub jwks_url: String,
    #[serde(default = "default_required_scopes")]
    pub required_scopes: Vec<String>,
}

fn default_required_scopes() -> Vec<String> {
    vec!["profile".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbacConfig {
    #[serde(default)]
    pub enabled: bool,
    pub model_path: Option<String>,
    pub schema_path: Option<String>,
    #[serde(default)]
    pub client_roles_audience: Vec<String>,
    #[serde(default)]
    pub validate: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub postgres: PostgresConfig,
    pub oidc: OidcConfig,
    pub abac: AbacConfig,
}

impl AppConfig {
    /// Loads configuration from `.env` (if present) plus the process
    /// environment, honoring the dotted-key -> `SECTION_KEY` convention.
    pub fn load() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let cfg = config::Config::builder()
            .set_default("server.port", 8080)?
            .set_default("server.context_path", "")?
            .set_default("postgres.port", 5432)?
            .set_default("postgres.max_open_connections", 10)?
            .set_default("postgres.max_idle_connections", 5)?
            .set_default("postgres.conn_max_lifetime_minutes", 30)?
            .set_default("oidc.required_scopes", vec!["profile"])?
            .set_default("abac.enabled", false)?
            .set_default("abac.validate", false)?
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(","),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }

    pub fn fail_fast_if_abac_unloadable(&self) -> Result<(), AppError> {
        if self.abac.enabled && self.abac.model_path.is_none() {
            return Err(AppError::internal(
                "config",
                "load",
                "DISC-ABAC-NOMODEL",
                "abac.enabled is true but abac.modelPath is unset",
            ));
        }
        Ok(())
    }
}
