// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict validation.
//!
//! Every field has a default, so a run without a file uses the stock
//! parameters. Any invalid field results in a `UsageError` before any
//! benchmark runs.

use std::path::Path;

use serde::Deserialize;

use crate::error::{BenchError, BenchResult, UsageError};
use crate::pattern::PatternAlgorithm;
use crate::types::{LoopCount, MIB};

// =============================================================================
// Raw configuration (as parsed, before validation)
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSwitchingConfig {
    #[serde(default = "default_loop_count")]
    loop_count: u64,
    #[serde(default = "default_buffer_len")]
    buffer_len: usize,
}

fn default_loop_count() -> u64 {
    1_000_000
}

fn default_buffer_len() -> usize {
    128
}

impl Default for RawSwitchingConfig {
    fn default() -> Self {
        Self {
            loop_count: default_loop_count(),
            buffer_len: default_buffer_len(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMemoryManagementConfig {
    #[serde(default = "default_heap_preload")]
    heap_preload_bytes: usize,
}

fn default_heap_preload() -> usize {
    0x100000
}

impl Default for RawMemoryManagementConfig {
    fn default() -> Self {
        Self {
            heap_preload_bytes: default_heap_preload(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMemoryAccessConfig {
    #[serde(default = "default_region_sizes_mb")]
    region_sizes_mb: Vec<u64>,
    #[serde(default = "default_access_volume_mb")]
    access_volume_mb: u64,
    #[serde(default = "default_block_sizes")]
    block_sizes: Vec<usize>,
    #[serde(default)]
    seed: u64,
    #[serde(default)]
    algorithm: PatternAlgorithm,
    #[serde(default = "default_true")]
    include_shared_memory: bool,
}

fn default_region_sizes_mb() -> Vec<u64> {
    vec![4, 16, 64, 256, 1024, 4096]
}

fn default_access_volume_mb() -> u64 {
    4096
}

fn default_block_sizes() -> Vec<usize> {
    vec![4]
}

fn default_true() -> bool {
    true
}

impl Default for RawMemoryAccessConfig {
    fn default() -> Self {
        Self {
            region_sizes_mb: default_region_sizes_mb(),
            access_volume_mb: default_access_volume_mb(),
            block_sizes: default_block_sizes(),
            seed: 0,
            algorithm: PatternAlgorithm::default(),
            include_shared_memory: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCreateDomainConfig {
    #[serde(default = "default_create_iterations")]
    iterations: u64,
}

fn default_create_iterations() -> u64 {
    10
}

impl Default for RawCreateDomainConfig {
    fn default() -> Self {
        Self {
            iterations: default_create_iterations(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDomainConfig {
    #[serde(default = "default_heap_capacity_mb")]
    heap_capacity_mb: u64,
    #[serde(default = "default_reserved_capacity_mb")]
    reserved_capacity_mb: u64,
    #[serde(default = "default_heap_min_kb")]
    heap_min_kb: u64,
}

fn default_heap_capacity_mb() -> u64 {
    1024
}

fn default_reserved_capacity_mb() -> u64 {
    8192
}

fn default_heap_min_kb() -> u64 {
    64
}

impl Default for RawDomainConfig {
    fn default() -> Self {
        Self {
            heap_capacity_mb: default_heap_capacity_mb(),
            reserved_capacity_mb: default_reserved_capacity_mb(),
            heap_min_kb: default_heap_min_kb(),
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    switching: RawSwitchingConfig,
    #[serde(default)]
    memory_management: RawMemoryManagementConfig,
    #[serde(default)]
    memory_access: RawMemoryAccessConfig,
    #[serde(default)]
    create_domain: RawCreateDomainConfig,
    #[serde(default)]
    domain: RawDomainConfig,
}

// =============================================================================
// Validated configuration
// =============================================================================

/// Boundary-call harness parameters.
#[derive(Debug, Clone)]
pub struct SwitchingConfig {
    pub loop_count: LoopCount,
    /// Elements (`i64`) per in/out/inout buffer; zero is allowed.
    pub buffer_len: usize,
}

/// Isolated-memory-region harness parameters.
#[derive(Debug, Clone)]
pub struct MemoryManagementConfig {
    /// Heap growth applied before the timed heap phases and reverted after.
    pub heap_preload_bytes: usize,
}

/// Memory-access harness parameters.
#[derive(Debug, Clone)]
pub struct MemoryAccessConfig {
    /// Region sizes to test, in bytes.
    pub region_sizes: Vec<usize>,
    /// Bytes touched per pass, independent of region size.
    pub access_volume: usize,
    /// Raw block sizes; unsupported ones are skipped at run time.
    pub block_sizes: Vec<usize>,
    pub seed: u64,
    pub algorithm: PatternAlgorithm,
    /// Also measure the isolated domain accessing ordinary memory.
    pub include_shared_memory: bool,
}

/// Domain-creation harness parameters.
#[derive(Debug, Clone)]
pub struct CreateDomainConfig {
    pub iterations: LoopCount,
}

/// Resource limits of the emulated isolated domain.
#[derive(Debug, Clone)]
pub struct DomainConfig {
    pub heap_capacity: usize,
    pub reserved_capacity: usize,
    pub heap_min: usize,
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub switching: SwitchingConfig,
    pub memory_management: MemoryManagementConfig,
    pub memory_access: MemoryAccessConfig,
    pub create_domain: CreateDomainConfig,
    pub domain: DomainConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        ConfigLoader::validate(RawConfig::default())
            .unwrap_or_else(|e| unreachable!("built-in defaults are valid: {e}"))
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> BenchResult<BenchConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BenchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| BenchError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> BenchResult<BenchConfig> {
        let raw: RawConfig = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| BenchError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?
        };

        Ok(Self::validate(raw)?)
    }

    fn validate(raw: RawConfig) -> Result<BenchConfig, UsageError> {
        Ok(BenchConfig {
            switching: Self::validate_switching(raw.switching)?,
            memory_management: MemoryManagementConfig {
                heap_preload_bytes: raw.memory_management.heap_preload_bytes,
            },
            memory_access: Self::validate_memory_access(raw.memory_access)?,
            create_domain: CreateDomainConfig {
                iterations: LoopCount::new(raw.create_domain.iterations).map_err(|_| {
                    UsageError::InvalidValue {
                        field: "create_domain.iterations",
                        value: "0".to_string(),
                        reason: "Must be greater than 0".to_string(),
                    }
                })?,
            },
            domain: Self::validate_domain(raw.domain)?,
        })
    }

    fn validate_switching(raw: RawSwitchingConfig) -> Result<SwitchingConfig, UsageError> {
        Ok(SwitchingConfig {
            loop_count: LoopCount::new(raw.loop_count)?,
            buffer_len: raw.buffer_len,
        })
    }

    fn validate_memory_access(raw: RawMemoryAccessConfig) -> Result<MemoryAccessConfig, UsageError> {
        if raw.region_sizes_mb.is_empty() {
            return Err(UsageError::InvalidValue {
                field: "memory_access.region_sizes_mb",
                value: "[]".to_string(),
                reason: "At least one region size must be given".to_string(),
            });
        }

        let region_sizes = raw
            .region_sizes_mb
            .iter()
            .map(|&mb| mebibytes("memory_access.region_sizes_mb", mb))
            .collect::<Result<Vec<_>, _>>()?;

        if raw.block_sizes.is_empty() {
            return Err(UsageError::InvalidValue {
                field: "memory_access.block_sizes",
                value: "[]".to_string(),
                reason: "At least one block size must be given".to_string(),
            });
        }

        Ok(MemoryAccessConfig {
            region_sizes,
            access_volume: mebibytes("memory_access.access_volume_mb", raw.access_volume_mb)?,
            block_sizes: raw.block_sizes,
            seed: raw.seed,
            algorithm: raw.algorithm,
            include_shared_memory: raw.include_shared_memory,
        })
    }

    fn validate_domain(raw: RawDomainConfig) -> Result<DomainConfig, UsageError> {
        Ok(DomainConfig {
            heap_capacity: mebibytes("domain.heap_capacity_mb", raw.heap_capacity_mb)?,
            reserved_capacity: mebibytes("domain.reserved_capacity_mb", raw.reserved_capacity_mb)?,
            heap_min: usize::try_from(raw.heap_min_kb)
                .ok()
                .and_then(|kb| kb.checked_mul(1024))
                .ok_or_else(|| UsageError::InvalidValue {
                    field: "domain.heap_min_kb",
                    value: raw.heap_min_kb.to_string(),
                    reason: "Too large".to_string(),
                })?,
        })
    }
}

/// Convert a positive MiB count to bytes.
fn mebibytes(field: &'static str, mb: u64) -> Result<usize, UsageError> {
    if mb == 0 {
        return Err(UsageError::InvalidValue {
            field,
            value: "0".to_string(),
            reason: "Must be greater than 0".to_string(),
        });
    }

    usize::try_from(mb)
        .ok()
        .and_then(|mb| mb.checked_mul(MIB))
        .ok_or_else(|| UsageError::InvalidValue {
            field,
            value: mb.to_string(),
            reason: "Exceeds the address space".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL_CONFIG: &str = r#"
switching:
  loop_count: 5000
  buffer_len: 0

memory_management:
  heap_preload_bytes: 65536

memory_access:
  region_sizes_mb: [4, 16]
  access_volume_mb: 64
  block_sizes: [1, 4, 64]
  seed: 42
  algorithm: park_miller
  include_shared_memory: false

create_domain:
  iterations: 3

domain:
  heap_capacity_mb: 256
  reserved_capacity_mb: 512
  heap_min_kb: 128
"#;

    #[test]
    fn test_full_config() {
        let config = ConfigLoader::load_string(FULL_CONFIG).unwrap();
        assert_eq!(config.switching.loop_count.value(), 5000);
        assert_eq!(config.switching.buffer_len, 0);
        assert_eq!(config.memory_access.region_sizes, vec![4 * MIB, 16 * MIB]);
        assert_eq!(config.memory_access.access_volume, 64 * MIB);
        assert_eq!(config.memory_access.algorithm, PatternAlgorithm::ParkMiller);
        assert!(!config.memory_access.include_shared_memory);
        assert_eq!(config.create_domain.iterations.value(), 3);
        assert_eq!(config.domain.heap_min, 128 * 1024);
    }

    #[test]
    fn test_defaults_applied() {
        let config = ConfigLoader::load_string("").unwrap();
        assert_eq!(config.switching.loop_count.value(), 1_000_000);
        assert_eq!(config.switching.buffer_len, 128);
        assert_eq!(config.memory_management.heap_preload_bytes, 0x100000);
        assert_eq!(config.memory_access.region_sizes.len(), 6);
        assert_eq!(config.memory_access.block_sizes, vec![4]);
        assert_eq!(config.memory_access.algorithm, PatternAlgorithm::Lcg32);
        assert_eq!(config.create_domain.iterations.value(), 10);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = ConfigLoader::load_string("switching:\n  buffer_len: 16\n").unwrap();
        assert_eq!(config.switching.buffer_len, 16);
        assert_eq!(config.switching.loop_count.value(), 1_000_000);
    }

    #[test]
    fn test_zero_loop_count_rejected() {
        let result = ConfigLoader::load_string("switching:\n  loop_count: 0\n");
        assert!(matches!(
            result,
            Err(BenchError::Usage(UsageError::ZeroLoopCount))
        ));
    }

    #[test]
    fn test_zero_region_size_rejected() {
        let result = ConfigLoader::load_string("memory_access:\n  region_sizes_mb: [4, 0]\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_region_sizes_rejected() {
        let result = ConfigLoader::load_string("memory_access:\n  region_sizes_mb: []\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_unsupported_block_size_is_deferred() {
        let config = ConfigLoader::load_string("memory_access:\n  block_sizes: [3]\n").unwrap();
        assert_eq!(config.memory_access.block_sizes, vec![3]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = ConfigLoader::load_string("switching:\n  loops: 10\n");
        assert!(matches!(result, Err(BenchError::ConfigParse { .. })));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL_CONFIG.as_bytes()).unwrap();
        let config = ConfigLoader::load_file(file.path()).unwrap();
        assert_eq!(config.switching.loop_count.value(), 5000);
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::load_file("/nonexistent/boundary-bench.yaml");
        assert!(matches!(result, Err(BenchError::ConfigNotFound { .. })));
    }
}
