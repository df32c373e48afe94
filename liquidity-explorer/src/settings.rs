//! Explorer configuration: defaults, optional TOML file, `EXPLORER_*` env vars

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File as ConfigFile};
use dlmm_liquidity_core::price_feed::COINGECKO_API_URL;
use dlmm_liquidity_core::{DistributionConfig, LiquidityShape, NoiseConfig, Radius};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Pool selection
    pub pool: PoolSettings,
    /// Liquidity shape and window
    pub distribution: DistributionSettings,
    /// Spot-price polling
    pub feed: FeedSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    pub default_pool: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionSettings {
    pub shape: String,
    pub radius: u32,
    pub window_width: u32,
    pub unit: String,
    pub noise_amplitude: Option<String>,
    pub noise_seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    pub api_url: String,
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
    pub symbols: Vec<String>,
    /// Extra symbol -> CoinGecko id mappings
    #[serde(default)]
    pub coingecko_ids: BTreeMap<String, String>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            pool: PoolSettings {
                default_pool: "ETH-USDC".to_string(),
            },
            distribution: DistributionSettings {
                shape: "Spot".to_string(),
                radius: 15,
                window_width: 60,
                unit: "100".to_string(),
                noise_amplitude: None,
                noise_seed: None,
            },
            feed: FeedSettings {
                api_url: COINGECKO_API_URL.to_string(),
                poll_interval_secs: 60,
                timeout_secs: 10,
                symbols: vec![
                    "ETH".to_string(),
                    "USDC".to_string(),
                    "BRETT".to_string(),
                    "DEGEN".to_string(),
                ],
                coingecko_ids: BTreeMap::new(),
            },
        }
    }
}

impl DistributionSettings {
    /// Validated generator parameters
    pub fn to_config(&self) -> Result<DistributionConfig> {
        let shape = LiquidityShape::from_str(&self.shape)?;
        let radius = Radius::new(self.radius)?;
        let unit = Decimal::from_str(&self.unit)
            .with_context(|| format!("invalid distribution unit: {}", self.unit))?;
        if unit <= Decimal::ZERO {
            return Err(anyhow!("Distribution unit must be positive"));
        }
        if self.window_width == 0 {
            return Err(anyhow!("Window width must be at least one bin"));
        }

        let noise = match &self.noise_amplitude {
            Some(raw) => {
                let amplitude = Decimal::from_str(raw)
                    .with_context(|| format!("invalid noise amplitude: {}", raw))?;
                if amplitude.is_sign_negative() {
                    return Err(anyhow!("Noise amplitude must not be negative"));
                }
                Some(NoiseConfig::new(amplitude, self.noise_seed.unwrap_or_default())?)
            }
            None => None,
        };

        Ok(DistributionConfig {
            shape,
            radius,
            unit,
            window_width: self.window_width,
            noise,
        })
    }
}

impl FeedSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Load configuration: defaults, then the file if present, then environment
pub fn load_config(config_path: &Path) -> Result<ExplorerConfig> {
    let config = Config::builder()
        .add_source(Config::try_from(&ExplorerConfig::default())?)
        .add_source(ConfigFile::from(config_path).required(false))
        .add_source(Environment::with_prefix("EXPLORER").separator("__"))
        .build()?;

    let explorer_config: ExplorerConfig = config.try_deserialize()?;
    explorer_config.distribution.to_config()?;
    Ok(explorer_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExplorerConfig::default().distribution.to_config().unwrap();
        assert_eq!(config, DistributionConfig::default());
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let mut settings = ExplorerConfig::default().distribution;
        settings.radius = 40;
        assert!(settings.to_config().is_err());

        let mut settings = ExplorerConfig::default().distribution;
        settings.shape = "pyramid".to_string();
        assert!(settings.to_config().is_err());

        let mut settings = ExplorerConfig::default().distribution;
        settings.unit = "-5".to_string();
        assert!(settings.to_config().is_err());
    }

    #[test]
    fn test_noise_settings() {
        let mut settings = ExplorerConfig::default().distribution;
        settings.noise_amplitude = Some("10".to_string());
        settings.noise_seed = Some(42);

        let noise = settings.to_config().unwrap().noise.unwrap();
        assert_eq!(noise.amplitude, Decimal::from(10));
        assert_eq!(noise.seed, 42);
    }

    #[test]
    fn test_negative_noise_amplitude_is_rejected() {
        let mut settings = ExplorerConfig::default().distribution;
        settings.noise_amplitude = Some("-10".to_string());
        settings.noise_seed = Some(1);
        assert!(settings.to_config().is_err());

        settings.noise_amplitude = Some("0".to_string());
        assert!(settings.to_config().unwrap().noise.is_some());
    }

    #[test]
    fn test_coingecko_ids_from_toml() {
        let base = r#"
            [pool]
            default_pool = "ETH-USDC"

            [distribution]
            shape = "Curve"
            radius = 10
            window_width = 40
            unit = "100"

            [feed]
            api_url = "https://api.coingecko.com/api/v3"
            poll_interval_secs = 30
            timeout_secs = 5
            symbols = ["ETH", "SOL"]
        "#;

        let parsed: ExplorerConfig = toml::from_str(base).unwrap();
        assert!(parsed.feed.coingecko_ids.is_empty());
        assert_eq!(parsed.distribution.noise_amplitude, None);

        let with_ids = format!("{}\n[feed.coingecko_ids]\nSOL = \"solana\"\n", base);
        let parsed: ExplorerConfig = toml::from_str(&with_ids).unwrap();
        assert_eq!(
            parsed.feed.coingecko_ids.get("SOL").map(String::as_str),
            Some("solana")
        );
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config(Path::new("does-not-exist.toml")).unwrap();
        assert_eq!(config.pool.default_pool, "ETH-USDC");
        assert_eq!(config.feed.poll_interval_secs, 60);
    }

    #[test]
    fn test_toml_round_trip() {
        let rendered = toml::to_string_pretty(&ExplorerConfig::default()).unwrap();
        let parsed: ExplorerConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.distribution.radius, 15);
        assert_eq!(parsed.feed.symbols.len(), 4);
    }
}
