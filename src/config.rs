use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::voting::derived::NetworkParams;
use crate::voting::machine::DraftDefaults;

/// Main configuration structure for the voting draft service
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VotingDraftConfig {
    /// Constants behind the derived reward, balance and stake floors
    pub network: NetworkParams,
    /// Initial values of a fresh draft
    pub draft: DraftDefaults,
    /// Preload behaviour
    pub preload: PreloadConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PreloadConfig {
    /// Time spent in preload.idle before switching to preload.late
    pub late_after_ms: u64,
    /// Fee per gas used when the node cannot be asked during preload
    pub fallback_fee_per_gas: f64,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            late_after_ms: 300,
            fallback_fee_per_gas: 0.01,
        }
    }
}

impl PreloadConfig {
    pub fn late_after(&self) -> Duration {
        Duration::from_millis(self.late_after_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or `EnvFilter` directive
    pub log_level: String,
    /// Emit JSON lines instead of human readable logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl VotingDraftConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (voting-draft.toml, .voting-draft-rc)
    /// 3. Environment variables (prefixed with VOTING_DRAFT__)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("voting-draft.toml").exists() {
            builder = builder.add_source(File::with_name("voting-draft"));
        }

        if Path::new(".voting-draft-rc").exists() {
            builder = builder.add_source(
                File::with_name(".voting-draft-rc").format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("VOTING_DRAFT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load from an explicit file, still honouring environment overrides
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("VOTING_DRAFT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<VotingDraftConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = VotingDraftConfig::load_env_file();
        VotingDraftConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static VotingDraftConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
