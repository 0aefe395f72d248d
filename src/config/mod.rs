use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::{env, fs};
use thiserror::Error;

use crate::auth::Authorization;
use crate::resource::UpdateMissing;

/// Config file read when `-c` is not given and the file exists.
pub const DEFAULT_CONFIG_PATH: &str = "api.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{0} not set")]
    Missing(&'static str),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub net: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.net, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Path the resource routes are mounted under.
    pub prefix: String,
    pub default_limit: i64,
    pub max_limit: i64,
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default, skip_serializing)]
    pub url: String,
    /// Table holding resources, optionally schema-qualified (`api.resources`).
    pub table: String,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection.
    pub connection_timeout: u64,
    /// Deadline applied to every store operation.
    pub operation_timeout_ms: u64,
    pub update_missing: UpdateMissing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default, skip_serializing)]
    pub secret: String,
    pub algorithm: Algorithm,
    pub require_expiry: bool,
    pub auths: Vec<Authorization>,
}

impl AppConfig {
    /// Build the effective configuration: environment defaults, then the
    /// optional YAML file, then environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let environment = Environment::from_name(env::var("APP_ENV").ok().as_deref());
        let mut config = Self::for_environment(environment);

        if let Some(path) = path {
            let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            config = config.merge_yaml(&raw)?;
        }

        config.apply_overrides(|key| env::var(key).ok().filter(|v| !v.is_empty()));
        config.validate()?;
        Ok(config)
    }

    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    /// Overlay a YAML document on top of `self`. Keys missing from the
    /// document keep their current values.
    pub fn merge_yaml(self, raw: &str) -> Result<Self, ConfigError> {
        let overlay: serde_yaml::Value = serde_yaml::from_str(raw)?;
        let mut base = serde_yaml::to_value(&self)?;
        merge_values(&mut base, overlay);

        let mut merged: AppConfig = serde_yaml::from_value(base)?;
        // Skipped on serialization, so they must be carried over by hand
        // unless the document set them.
        if merged.database.url.is_empty() {
            merged.database.url = self.database.url;
        }
        if merged.security.secret.is_empty() {
            merged.security.secret = self.security.secret;
        }
        Ok(merged)
    }

    /// Apply overrides looked up by variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("API_SECRET") {
            self.security.secret = v;
        }
        if let Some(v) = lookup("API_DB").or_else(|| lookup("DATABASE_URL")) {
            self.database.url = v;
        }
        if let Some(v) = lookup("API_TABLE") {
            self.database.table = v;
        }
        if let Some(v) = lookup("API_PREFIX") {
            self.api.prefix = v;
        }
        if let Some(v) = lookup("API_NET") {
            self.server.net = v;
        }
        if let Some(v) = lookup("API_PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Some(v) = lookup("DATABASE_OPERATION_TIMEOUT_MS") {
            self.database.operation_timeout_ms =
                v.parse().unwrap_or(self.database.operation_timeout_ms);
        }

        if let Some(v) = lookup("SECURITY_REQUIRE_EXPIRY") {
            self.security.require_expiry = v.parse().unwrap_or(self.security.require_expiry);
        }
        if let Some(v) = lookup("SECURITY_ENABLE_CORS") {
            self.api.enable_cors = v.parse().unwrap_or(self.api.enable_cors);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.secret.is_empty() {
            return Err(ConfigError::Missing("API_SECRET"));
        }
        if self.database.url.is_empty() {
            return Err(ConfigError::Missing("API_DB"));
        }
        if !matches!(
            self.security.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(ConfigError::Invalid(format!(
                "signing algorithm {:?} is not an HMAC algorithm",
                self.security.algorithm
            )));
        }
        if !self.api.prefix.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "api prefix {:?} must start with '/'",
                self.api.prefix
            )));
        }
        if self.api.max_limit < 1 || self.api.default_limit < 1 {
            return Err(ConfigError::Invalid("page limits must be positive".to_string()));
        }

        let mut seen = HashSet::new();
        for auth in &self.security.auths {
            if auth.id.trim().is_empty() {
                return Err(ConfigError::Invalid("authorization with empty id".to_string()));
            }
            if !seen.insert(auth.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate authorization for {}",
                    auth.id
                )));
            }
        }
        Ok(())
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                net: "127.0.0.1".to_string(),
                port: 8080,
            },
            api: ApiConfig {
                prefix: "/resources".to_string(),
                default_limit: 50,
                max_limit: 1000,
                enable_cors: true,
            },
            database: DatabaseConfig {
                url: "postgres://localhost".to_string(),
                table: "api.resources".to_string(),
                max_connections: 10,
                connection_timeout: 30,
                operation_timeout_ms: 5_000,
                update_missing: UpdateMissing::NotFound,
            },
            security: SecurityConfig {
                secret: String::new(),
                algorithm: Algorithm::HS256,
                require_expiry: false,
                auths: Vec::new(),
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.api.max_limit = 500;
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.security.require_expiry = true;
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.server.net = "0.0.0.0".to_string();
        config.api.max_limit = 100;
        config.api.enable_cors = false;
        config.database.url = String::new();
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.database.operation_timeout_ms = 2_000;
        config.security.require_expiry = true;
        config
    }
}

fn merge_values(base: &mut serde_yaml::Value, overlay: serde_yaml::Value) {
    match (base, overlay) {
        (_, serde_yaml::Value::Null) => {}
        (serde_yaml::Value::Mapping(base), serde_yaml::Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
