use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageBackend,
    pub mongodb: MongoConfig,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub admin: AdminCredentials,
    pub host: IpAddr,
    pub port: u16,
    pub environment: Environment,
    pub max_body_size: usize,
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StorageBackend {
    MongoDb,
    File,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::MongoDb => "mongodb",
            StorageBackend::File => "file",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        *self == Environment::Production
    }
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    /// Checked lazily by the connection manager, not at startup.
    pub uri: Option<String>,
    pub database: Option<String>,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Default)]
pub struct AdminCredentials {
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_hash: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let storage = match get_or("STORAGE_BACKEND", "mongodb").to_lowercase().as_str() {
            "mongodb" | "mongo" => StorageBackend::MongoDb,
            "file" | "json" => StorageBackend::File,
            other => return Err(format!("Invalid STORAGE_BACKEND: {other}")),
        };

        let max_retries: u32 = get_or("MONGODB_MAX_RETRIES", "3")
            .parse()
            .map_err(|e| format!("Invalid MONGODB_MAX_RETRIES: {e}"))?;

        let mongodb = MongoConfig {
            uri: get("MONGODB_URI"),
            database: get("MONGODB_DATABASE"),
            max_retries,
        };

        let jwt_secret = get("JWT_SECRET")
            .ok_or_else(|| "Missing required environment variable: JWT_SECRET".to_string())?;

        let admin = AdminCredentials {
            email: get("CMS_EMAIL"),
            password: get("CMS_PASSWORD"),
            password_hash: get("CMS_PASSWORD_HASH"),
        };

        let host: IpAddr = get_or("HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid HOST: {e}"))?;

        let port: u16 = get_or("PORT", "3001")
            .parse()
            .map_err(|e| format!("Invalid PORT: {e}"))?;

        let environment = match get_or("APP_ENV", "development").to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        let max_body_size: usize = get_or("MAX_BODY_SIZE", "1048576")
            .parse()
            .map_err(|e| format!("Invalid MAX_BODY_SIZE: {e}"))?;

        Ok(Config {
            storage,
            mongodb,
            data_dir: PathBuf::from(get_or("DATA_DIR", "data")),
            jwt_secret,
            admin,
            host,
            port,
            environment,
            max_body_size,
            log_level: get_or("LOG_LEVEL", "info"),
        })
    }
}
