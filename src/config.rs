//! Configuration management for the Marginalia server

use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub upload: UploadConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
    /// Base directory for the local provider
    pub local_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Local,
    Minio,
    R2,
    S3,
    B2,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Maximum accepted file size in bytes
    pub max_file_size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime in hours
    pub session_ttl_hours: i64,
}

/// Default upload cap: 50 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Default session lifetime: 30 days
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 30 * 24;

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            storage: StorageConfig {
                provider: StorageProvider::Local,
                endpoint: "http://localhost:9000".to_string(),
                bucket: "marginalia".to_string(),
                access_key: "admin".to_string(),
                secret_key: "password123".to_string(),
                region: Some("us-east-1".to_string()),
                local_path: "./data/blobs".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite:./marginalia.db".to_string(),
            },
            upload: UploadConfig {
                max_file_size: DEFAULT_MAX_FILE_SIZE,
            },
            auth: AuthConfig {
                session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let provider = match env::var("STORAGE_PROVIDER")
            .unwrap_or_else(|_| "local".to_string())
            .as_str()
        {
            "minio" => StorageProvider::Minio,
            "r2" => StorageProvider::R2,
            "s3" => StorageProvider::S3,
            "b2" => StorageProvider::B2,
            _ => StorageProvider::Local,
        };

        // S3 credentials are only required when an S3-compatible provider
        // is selected; the local provider needs none of them.
        let (endpoint, bucket, access_key, secret_key) = match provider {
            StorageProvider::Local => (
                env::var("S3_ENDPOINT").unwrap_or_default(),
                env::var("S3_BUCKET").unwrap_or_default(),
                env::var("S3_ACCESS_KEY").unwrap_or_default(),
                env::var("S3_SECRET_KEY").unwrap_or_default(),
            ),
            _ => (
                env::var("S3_ENDPOINT")?,
                env::var("S3_BUCKET")?,
                env::var("S3_ACCESS_KEY")?,
                env::var("S3_SECRET_KEY")?,
            ),
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
            },
            storage: StorageConfig {
                provider,
                endpoint,
                bucket,
                access_key,
                secret_key,
                region: env::var("S3_REGION").ok(),
                local_path: env::var("STORAGE_LOCAL_PATH")
                    .unwrap_or_else(|_| "./data/blobs".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:./marginalia.db".to_string()),
            },
            upload: UploadConfig {
                max_file_size: env::var("MAX_UPLOAD_SIZE_MB")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(|mb| mb * 1024 * 1024)
                    .unwrap_or(DEFAULT_MAX_FILE_SIZE),
            },
            auth: AuthConfig {
                session_ttl_hours: env::var("SESSION_TTL_HOURS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SESSION_TTL_HOURS),
            },
        })
    }
}
