//! Service configuration, loaded from environment variables with typed
//! defaults (see SPEC_FULL.md §10.1). Values can additionally be
//! overridden by a `config.toml` next to the binary, the same
//! load-then-fall-back-to-defaults shape the teacher's `AppConfig::load`
//! uses for its own TOML config file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sse: SseConfig,
    pub enrichment: EnrichmentConfig,
    pub rag: RagBudgetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./caes.db"),
        }
    }
}

/// Progress streamer tuning (C7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SseConfig {
    pub tick_ms: u64,
    pub timeout_secs: u64,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            tick_ms: 2_000,
            timeout_secs: 300,
        }
    }
}

/// Enrichment pipeline (C6) background-task tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub timeout_secs: u64,
    pub max_concurrent_per_campaign: u32,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            max_concurrent_per_campaign: 1,
        }
    }
}

/// Context builder (C5) token budgeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagBudgetConfig {
    pub token_budget: usize,
    pub campaign_share: f32,
    pub rulebook_share: f32,
}

impl Default for RagBudgetConfig {
    fn default() -> Self {
        Self {
            token_budget: 4_000,
            campaign_share: 0.7,
            rulebook_share: 0.3,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            sse: SseConfig::default(),
            enrichment: EnrichmentConfig::default(),
            rag: RagBudgetConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration, preferring environment variables, falling back
    /// to `./config.toml`, falling back to defaults. Never fails — a
    /// missing or unparseable file is logged and ignored.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("config.toml") {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("loaded config.toml");
                    config
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse config.toml — using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CAES_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Ok(v) = std::env::var("CAES_DATABASE_PATH") {
            self.database.path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("CAES_SSE_TICK_MS") {
            if let Ok(v) = v.parse() {
                self.sse.tick_ms = v;
            }
        }
        if let Ok(v) = std::env::var("CAES_SSE_TIMEOUT_SECS") {
            if let Ok(v) = v.parse() {
                self.sse.timeout_secs = v;
            }
        }
        if let Ok(v) = std::env::var("CAES_ENRICHMENT_TIMEOUT_SECS") {
            if let Ok(v) = v.parse() {
                self.enrichment.timeout_secs = v;
            }
        }
        if let Ok(v) = std::env::var("CAES_RAG_TOKEN_BUDGET") {
            if let Ok(v) = v.parse() {
                self.rag.token_budget = v;
            }
        }
        if let Ok(v) = std::env::var("CAES_MAX_CONCURRENT_ENRICHMENTS_PER_CAMPAIGN") {
            if let Ok(v) = v.parse() {
                self.enrichment.max_concurrent_per_campaign = v;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.sse.tick_ms, 2_000);
        assert_eq!(config.sse.timeout_secs, 300);
        assert_eq!(config.enrichment.timeout_secs, 600);
        assert_eq!(config.rag.token_budget, 4_000);
    }

    #[test]
    fn toml_roundtrip() {
        let config = AppConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.server.bind_addr, config.server.bind_addr);
    }
}
