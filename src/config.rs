use eyre::{Context, Result};
use std::fs;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// address width used to derive the tag bits when the config does not set one
pub const DEFAULT_ADDRESS_WIDTH: u32 = 32;

/// how a set picks its victim and whether a hit refreshes the block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplacementPolicy {
    /// - a hit moves the block to the head of the recency list
    /// - the tail is evicted
    #[serde(alias = "LRU")]
    Lru,
    /// - hits leave the order alone, so the tail is the oldest insertion
    #[serde(alias = "FIFO")]
    Fifo,
    /// - any position of the set, uniformly
    #[serde(alias = "Random")]
    Random,
}

fn default_address_width() -> u32 {
    DEFAULT_ADDRESS_WIDTH
}

/// the config for one cache level
///
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheConfig {
    pub name: String,
    pub num_sets: usize,
    pub block_size: usize,
    pub associativity: usize,
    pub policy: ReplacementPolicy,
    pub hit_latency: u64,
    pub miss_latency: u64,
    /// fixed seed for the random policy, OS entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_address_width")]
    pub address_width: u32,
}

impl CacheConfig {
    pub fn new(
        name: &str,
        num_sets: usize,
        block_size: usize,
        associativity: usize,
        policy: ReplacementPolicy,
        hit_latency: u64,
        miss_latency: u64,
    ) -> Self {
        CacheConfig {
            name: name.to_string(),
            num_sets,
            block_size,
            associativity,
            policy,
            hit_latency,
            miss_latency,
            seed: None,
            address_width: DEFAULT_ADDRESS_WIDTH,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn from_config_file(config_file: &str) -> Result<CacheConfig> {
        let config_file = fs::read_to_string(config_file).wrap_err("cannot read config file")?;
        let config: CacheConfig =
            toml::from_str(&config_file).wrap_err("cannot deserialize to CacheConfig")?;
        config.validate()?;
        Ok(config)
    }

    /// check that the geometry gives a usable bit split
    pub fn validate(&self) -> CacheResult<()> {
        if !self.num_sets.is_power_of_two() {
            return Err(CacheError::InvalidConfig(format!(
                "cache {}: num_sets {} is not a power of two",
                self.name, self.num_sets
            )));
        }
        if !self.block_size.is_power_of_two() {
            return Err(CacheError::InvalidConfig(format!(
                "cache {}: block_size {} is not a power of two",
                self.name, self.block_size
            )));
        }
        if self.associativity == 0 {
            return Err(CacheError::InvalidConfig(format!(
                "cache {}: associativity must be at least 1",
                self.name
            )));
        }
        if self.address_width > u64::BITS {
            return Err(CacheError::InvalidConfig(format!(
                "cache {}: address_width {} is wider than 64 bits",
                self.name, self.address_width
            )));
        }
        let used_bits = self.block_size.trailing_zeros() + self.num_sets.trailing_zeros();
        if used_bits > self.address_width {
            return Err(CacheError::InvalidConfig(format!(
                "cache {}: offset and index need {} bits but addresses are {} bits wide",
                self.name, used_bits, self.address_width
            )));
        }
        Ok(())
    }

    /// total bytes held by the cache
    pub fn capacity(&self) -> usize {
        self.num_sets * self.associativity * self.block_size
    }

    pub fn show_config(&self) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("cannot serialize config: {e}"),
        }
    }
}

/// the two chained levels driven by the trace driver
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HierarchyConfig {
    pub l1: CacheConfig,
    pub l2: CacheConfig,
}

impl HierarchyConfig {
    pub fn from_config_file(config_file: &str) -> Result<HierarchyConfig> {
        let config_file = fs::read_to_string(config_file).wrap_err("cannot read config file")?;
        let config: HierarchyConfig =
            toml::from_str(&config_file).wrap_err("cannot deserialize to HierarchyConfig")?;
        config.l1.validate().wrap_err("invalid l1 config")?;
        config.l2.validate().wrap_err("invalid l2 config")?;
        Ok(config)
    }
}
