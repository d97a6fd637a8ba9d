//! Configuration resolution.
//!
//! Precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (`SYMTOOL_*`)
//! 3. `symtool.toml` in the analysed root
//! 4. Defaults

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use symtool_core::error::SymtoolError;
use thiserror::Error;
use tracing::debug;

use crate::context::ContextLimits;

/// Project config file name, looked up in the root.
pub const CONFIG_FILE: &str = "symtool.toml";

pub const ENV_CACHE_TTL: &str = "SYMTOOL_CACHE_TTL_SECS";
pub const ENV_SWEEP_INTERVAL: &str = "SYMTOOL_SWEEP_INTERVAL_SECS";
pub const ENV_MODE: &str = "SYMTOOL_MODE";
pub const ENV_DEFAULT_LIMIT: &str = "SYMTOOL_DEFAULT_LIMIT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("invalid {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl From<ConfigError> for SymtoolError {
    fn from(err: ConfigError) -> Self {
        SymtoolError::invalid_input(err.to_string())
    }
}

// ============================================================================
// Configuration Sources
// ============================================================================

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    Default = 0,
    /// From `symtool.toml`.
    ProjectConfig = 1,
    EnvVar = 2,
    /// From a CLI flag (highest precedence).
    CliFlag = 3,
}

/// A configuration value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        ConfigValue { value, source }
    }

    /// Keep whichever value has the higher precedence; ties go to `other`.
    pub fn merge(self, other: Self) -> Self {
        if other.source >= self.source {
            other
        } else {
            self
        }
    }

    fn set(&mut self, value: T, source: ConfigSource) {
        let current = std::mem::replace(self, ConfigValue::new(value, source));
        if current.source > self.source {
            *self = current;
        }
    }
}

// ============================================================================
// Project File
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ProjectFile {
    mode: Option<String>,
    default_limit: Option<usize>,
    max_dead_results: Option<usize>,
    cache: CacheSection,
    context: ContextSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CacheSection {
    ttl_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ContextSection {
    usages: Option<usize>,
    test_usages: Option<usize>,
    dependencies: Option<usize>,
}

// ============================================================================
// Configuration Resolution
// ============================================================================

/// CLI configuration overrides.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// --mode
    pub mode: Option<String>,
    /// --limit, used as the default page size.
    pub default_limit: Option<usize>,
    /// --cache-ttl
    pub cache_ttl_secs: Option<u64>,
}

/// Resolved configuration with precedence information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub cache_ttl: ConfigValue<Duration>,
    pub sweep_interval: ConfigValue<Duration>,
    pub mode: ConfigValue<String>,
    pub default_limit: ConfigValue<usize>,
    pub context_limits: ConfigValue<ContextLimits>,
    pub max_dead_results: ConfigValue<usize>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        let default = ConfigSource::Default;
        ResolvedConfig {
            cache_ttl: ConfigValue::new(Duration::from_secs(300), default),
            sweep_interval: ConfigValue::new(Duration::from_secs(60), default),
            mode: ConfigValue::new("default".to_string(), default),
            default_limit: ConfigValue::new(50, default),
            context_limits: ConfigValue::new(ContextLimits::default(), default),
            max_dead_results: ConfigValue::new(100, default),
        }
    }
}

impl ResolvedConfig {
    /// Resolve configuration for `root` from all sources, reading the process
    /// environment.
    pub fn resolve(root: &Path, overrides: &CliOverrides) -> ConfigResult<Self> {
        Self::resolve_with_env(root, overrides, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve_with_env(
        root: &Path,
        overrides: &CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<Self> {
        let mut config = ResolvedConfig::default();

        let project_path = root.join(CONFIG_FILE);
        if project_path.is_file() {
            config.apply_project_config(&project_path)?;
        }
        config.apply_env_vars(env)?;
        config.apply_cli_overrides(overrides)?;

        debug!(
            mode = %config.mode.value,
            ttl_secs = config.cache_ttl.value.as_secs(),
            default_limit = config.default_limit.value,
            "resolved configuration"
        );
        Ok(config)
    }

    fn apply_project_config(&mut self, path: &Path) -> ConfigResult<()> {
        let display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: display.clone(),
            message: e.to_string(),
        })?;
        let file: ProjectFile = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: display,
            message: e.to_string(),
        })?;

        let source = ConfigSource::ProjectConfig;
        if let Some(mode) = file.mode {
            self.mode.set(check_mode("mode", mode)?, source);
        }
        if let Some(limit) = file.default_limit {
            self.default_limit
                .set(check_positive("default_limit", limit)?, source);
        }
        if let Some(max) = file.max_dead_results {
            self.max_dead_results
                .set(check_positive("max_dead_results", max)?, source);
        }
        if let Some(secs) = file.cache.ttl_secs {
            self.cache_ttl.set(Duration::from_secs(secs), source);
        }
        if let Some(secs) = file.cache.sweep_interval_secs {
            let secs = check_positive("cache.sweep_interval_secs", secs)?;
            self.sweep_interval.set(Duration::from_secs(secs), source);
        }
        let context = file.context;
        if context.usages.is_some() || context.test_usages.is_some() || context.dependencies.is_some() {
            let base = self.context_limits.value;
            let limits = ContextLimits {
                usages: context.usages.unwrap_or(base.usages),
                test_usages: context.test_usages.unwrap_or(base.test_usages),
                dependencies: context.dependencies.unwrap_or(base.dependencies),
            };
            self.context_limits.set(limits, source);
        }
        Ok(())
    }

    fn apply_env_vars(&mut self, env: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        let source = ConfigSource::EnvVar;
        if let Some(raw) = env(ENV_CACHE_TTL) {
            let secs = parse_number::<u64>(ENV_CACHE_TTL, &raw)?;
            self.cache_ttl.set(Duration::from_secs(secs), source);
        }
        if let Some(raw) = env(ENV_SWEEP_INTERVAL) {
            let secs = check_positive(ENV_SWEEP_INTERVAL, parse_number::<u64>(ENV_SWEEP_INTERVAL, &raw)?)?;
            self.sweep_interval.set(Duration::from_secs(secs), source);
        }
        if let Some(mode) = env(ENV_MODE) {
            self.mode.set(check_mode(ENV_MODE, mode)?, source);
        }
        if let Some(raw) = env(ENV_DEFAULT_LIMIT) {
            let limit = check_positive(ENV_DEFAULT_LIMIT, parse_number::<usize>(ENV_DEFAULT_LIMIT, &raw)?)?;
            self.default_limit.set(limit, source);
        }
        Ok(())
    }

    fn apply_cli_overrides(&mut self, overrides: &CliOverrides) -> ConfigResult<()> {
        let source = ConfigSource::CliFlag;
        if let Some(ref mode) = overrides.mode {
            self.mode.set(check_mode("--mode", mode.clone())?, source);
        }
        if let Some(limit) = overrides.default_limit {
            self.default_limit.set(check_positive("--limit", limit)?, source);
        }
        if let Some(secs) = overrides.cache_ttl_secs {
            self.cache_ttl.set(Duration::from_secs(secs), source);
        }
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> ConfigResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(key, raw, "expected a non-negative integer"))
}

fn check_positive<T: PartialEq + Default + ToString>(key: &str, value: T) -> ConfigResult<T> {
    if value == T::default() {
        Err(invalid(key, value, "must be greater than zero"))
    } else {
        Ok(value)
    }
}

fn check_mode(key: &str, mode: String) -> ConfigResult<String> {
    let trimmed = mode.trim();
    if trimmed.is_empty() || trimmed.contains(['/', '\\']) {
        Err(invalid(key, &mode, "expected a mode name"))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn no_env() -> impl Fn(&str) -> Option<String> {
        |_: &str| None
    }

    mod precedence {
        use super::*;

        #[test]
        fn defaults_without_sources() {
            let dir = TempDir::new().unwrap();
            let config =
                ResolvedConfig::resolve_with_env(dir.path(), &CliOverrides::default(), no_env()).unwrap();
            assert_eq!(config, ResolvedConfig::default());
            assert_eq!(config.cache_ttl.value, Duration::from_secs(300));
            assert_eq!(config.sweep_interval.value, Duration::from_secs(60));
            assert_eq!(config.mode.value, "default");
            assert_eq!(config.default_limit.value, 50);
            assert_eq!(config.max_dead_results.value, 100);
            assert_eq!(config.context_limits.value, ContextLimits::default());
        }

        #[test]
        fn project_then_env_then_cli() {
            let dir = TempDir::new().unwrap();
            fs::write(
                dir.path().join(CONFIG_FILE),
                "mode = \"production\"\ndefault_limit = 20\n\n[cache]\nttl_secs = 600\n\n[context]\nusages = 7\n",
            )
            .unwrap();

            let config =
                ResolvedConfig::resolve_with_env(dir.path(), &CliOverrides::default(), no_env()).unwrap();
            assert_eq!(config.mode, ConfigValue::new("production".to_string(), ConfigSource::ProjectConfig));
            assert_eq!(config.default_limit.value, 20);
            assert_eq!(config.cache_ttl.value, Duration::from_secs(600));
            assert_eq!(config.context_limits.value.usages, 7);
            assert_eq!(config.context_limits.value.test_usages, 2);
            assert_eq!(config.sweep_interval.source, ConfigSource::Default);

            let env = env_of(&[(ENV_DEFAULT_LIMIT, "30"), (ENV_CACHE_TTL, "5")]);
            let config = ResolvedConfig::resolve_with_env(dir.path(), &CliOverrides::default(), env).unwrap();
            assert_eq!(config.default_limit, ConfigValue::new(30, ConfigSource::EnvVar));
            assert_eq!(config.cache_ttl.value, Duration::from_secs(5));
            assert_eq!(config.mode.source, ConfigSource::ProjectConfig);

            let overrides = CliOverrides {
                mode: Some("default".to_string()),
                default_limit: Some(10),
                cache_ttl_secs: None,
            };
            let env = env_of(&[(ENV_DEFAULT_LIMIT, "30"), (ENV_MODE, "production")]);
            let config = ResolvedConfig::resolve_with_env(dir.path(), &overrides, env).unwrap();
            assert_eq!(config.mode, ConfigValue::new("default".to_string(), ConfigSource::CliFlag));
            assert_eq!(config.default_limit.value, 10);
        }

        #[test]
        fn merge_prefers_higher_source() {
            let low = ConfigValue::new(1, ConfigSource::ProjectConfig);
            let high = ConfigValue::new(2, ConfigSource::EnvVar);
            assert_eq!(low.clone().merge(high.clone()).value, 2);
            assert_eq!(high.merge(low).value, 2);
        }
    }

    mod invalid_values {
        use super::*;

        #[test]
        fn bad_env_values_are_rejected() {
            let dir = TempDir::new().unwrap();
            for (key, value) in [
                (ENV_CACHE_TTL, "soon"),
                (ENV_DEFAULT_LIMIT, "0"),
                (ENV_SWEEP_INTERVAL, "-1"),
                (ENV_MODE, " "),
            ] {
                let result =
                    ResolvedConfig::resolve_with_env(dir.path(), &CliOverrides::default(), env_of(&[(key, value)]));
                assert!(result.is_err(), "{key}={value:?}");
            }
        }

        #[test]
        fn unknown_project_keys_are_rejected() {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join(CONFIG_FILE), "colour = \"blue\"\n").unwrap();
            let err = ResolvedConfig::resolve_with_env(dir.path(), &CliOverrides::default(), no_env())
                .unwrap_err();
            assert!(matches!(err, ConfigError::Parse { .. }));
            let err: SymtoolError = err.into();
            assert!(matches!(err, SymtoolError::InvalidInput { .. }));
        }

        #[test]
        fn zero_limit_flag_is_rejected() {
            let dir = TempDir::new().unwrap();
            let overrides = CliOverrides {
                default_limit: Some(0),
                ..CliOverrides::default()
            };
            assert!(ResolvedConfig::resolve_with_env(dir.path(), &overrides, no_env()).is_err());
        }
    }
}
