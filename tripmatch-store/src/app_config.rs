use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub travel: TravelRules,
}

/// Paging and caching knobs for the travel endpoints
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TravelRules {
    #[serde(default = "default_browse_horizon")]
    pub browse_horizon_days: u32,
    #[serde(default = "default_browse_max_limit")]
    pub browse_max_limit: u32,
    #[serde(default = "default_search_limit")]
    pub search_default_limit: u32,
    #[serde(default = "default_max_limit")]
    pub search_max_limit: u32,
    #[serde(default = "default_max_limit")]
    pub admin_max_limit: u32,
    #[serde(default = "default_ttl")]
    pub received_cache_ttl_seconds: u64,
    #[serde(default = "default_ttl")]
    pub public_cache_ttl_seconds: u64,
}

fn default_browse_horizon() -> u32 { 30 }
fn default_browse_max_limit() -> u32 { 10 }
fn default_search_limit() -> u32 { 10 }
fn default_max_limit() -> u32 { 50 }
fn default_ttl() -> u64 { 60 }

impl Default for TravelRules {
    fn default() -> Self {
        Self {
            browse_horizon_days: default_browse_horizon(),
            browse_max_limit: default_browse_max_limit(),
            search_default_limit: default_search_limit(),
            search_max_limit: default_max_limit(),
            admin_max_limit: default_max_limit(),
            received_cache_ttl_seconds: default_ttl(),
            public_cache_ttl_seconds: default_ttl(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_analytics_topic")]
    pub analytics_topic: String,
    #[serde(default = "default_audit_topic")]
    pub audit_topic: String,
}

fn default_analytics_topic() -> String { "travel.analytics".into() }
fn default_audit_topic() -> String { "travel.audit".into() }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // untracked developer overrides
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `TRIPMATCH_DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("TRIPMATCH").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_travel_rules_fill_defaults() {
        let rules: TravelRules = serde_json::from_str(r#"{ "browse_horizon_days": 14 }"#).unwrap();
        assert_eq!(rules.browse_horizon_days, 14);
        assert_eq!(rules.browse_max_limit, 10);
        assert_eq!(rules.received_cache_ttl_seconds, 60);
    }

    #[test]
    fn test_database_pool_size_defaults() {
        let db: DatabaseConfig = serde_json::from_str(r#"{ "url": "postgres://localhost/trips" }"#).unwrap();
        assert_eq!(db.max_connections, 5);
    }

    #[test]
    fn test_shipped_defaults_target_postgres_and_redis() {
        // cargo runs unit tests from the crate directory
        let config: Config = config::Config::builder()
            .add_source(config::File::with_name("../config/default"))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(config.database.url.starts_with("postgres://"));
        assert!(config.redis.url.starts_with("redis://"));
        assert_eq!(config.travel, TravelRules::default());
    }
}
