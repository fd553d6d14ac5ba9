use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub points: PointsConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub backend: StoreBackend,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub enable_cors: bool,
}

/// Constants feeding the points policy engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsConfig {
    pub points_per_bag: i64,
    pub joining_bonus: i64,
    pub slab_size: i64,
    pub slab_bonus: i64,
    pub slab_campaign_start: Option<NaiveDate>,
    pub slab_campaign_end: Option<NaiveDate>,
    pub referral_threshold: i64,
    pub referral_bonus: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub max_batch_size: usize,
    pub accept_move_ops: bool,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            points_per_bag: 10,
            joining_bonus: 250,
            slab_size: 200,
            slab_bonus: 500,
            slab_campaign_start: None,
            slab_campaign_end: None,
            referral_threshold: 200,
            referral_bonus: 1000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("STORE_BACKEND") {
            self.database.backend = match v.as_str() {
                "memory" => StoreBackend::Memory,
                _ => StoreBackend::Postgres,
            };
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Some(v) = env::var("FIELDOPS_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }

        // Points policy overrides
        if let Ok(v) = env::var("POINTS_PER_BAG") {
            self.points.points_per_bag = v.parse().unwrap_or(self.points.points_per_bag);
        }
        if let Ok(v) = env::var("POINTS_JOINING_BONUS") {
            self.points.joining_bonus = v.parse().unwrap_or(self.points.joining_bonus);
        }
        if let Ok(v) = env::var("POINTS_SLAB_SIZE") {
            self.points.slab_size = v.parse().unwrap_or(self.points.slab_size);
        }
        if let Ok(v) = env::var("POINTS_SLAB_BONUS") {
            self.points.slab_bonus = v.parse().unwrap_or(self.points.slab_bonus);
        }
        if let Ok(v) = env::var("POINTS_SLAB_CAMPAIGN_START") {
            self.points.slab_campaign_start = NaiveDate::parse_from_str(&v, "%Y-%m-%d").ok();
        }
        if let Ok(v) = env::var("POINTS_SLAB_CAMPAIGN_END") {
            self.points.slab_campaign_end = NaiveDate::parse_from_str(&v, "%Y-%m-%d").ok();
        }
        if let Ok(v) = env::var("POINTS_REFERRAL_THRESHOLD") {
            self.points.referral_threshold = v.parse().unwrap_or(self.points.referral_threshold);
        }
        if let Ok(v) = env::var("POINTS_REFERRAL_BONUS") {
            self.points.referral_bonus = v.parse().unwrap_or(self.points.referral_bonus);
        }

        // Sync overrides
        if let Ok(v) = env::var("SYNC_MAX_BATCH_SIZE") {
            self.sync.max_batch_size = v.parse().unwrap_or(self.sync.max_batch_size);
        }
        if let Ok(v) = env::var("SYNC_ACCEPT_MOVE_OPS") {
            self.sync.accept_move_ops = v.parse().unwrap_or(self.sync.accept_move_ops);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                backend: StoreBackend::Postgres,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                jwt_secret: "development-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                enable_cors: true,
            },
            points: PointsConfig::default(),
            sync: SyncConfig {
                max_batch_size: 500,
                accept_move_ops: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                backend: StoreBackend::Postgres,
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                enable_cors: true,
            },
            points: PointsConfig::default(),
            sync: SyncConfig {
                max_batch_size: 200,
                accept_move_ops: true,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                backend: StoreBackend::Postgres,
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 12,
                enable_cors: false,
            },
            points: PointsConfig::default(),
            sync: SyncConfig {
                max_batch_size: 200,
                accept_move_ops: true,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
