//! # Configuration Management
//!
//! Loads configuration for the transcription subsystem from multiple sources:
//! - TOML configuration files (stt.toml)
//! - Environment variables (with STT_ prefix)
//! - Default values (built into the code)
//!
//! A handful of legacy flag variables used by the test harness (`TEST_MODE`,
//! `REAL_WHISPER_TEST`, `FORCE_CPU_TRANSCRIPTION`) are special-cased on top
//! of the prefixed scheme.
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Legacy flag environment variables
//! 2. Environment variables (STT_MODEL__INIT_TIMEOUT_MS, STT_FLAGS__TEST_MODE, ...)
//! 3. Configuration file (stt.toml)
//! 4. Default values (defined in the Default impl)
//!
//! The environment separator is a double underscore so that keys which
//! themselves contain underscores (`init_timeout_ms`, `test_mode`) stay
//! addressable.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Top-level configuration for the transcription subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub audio: AudioSettings,
    pub flags: TestFlags,
}

/// Model selection and initialization settings.
///
/// ## Fields:
/// - `accelerated_repo`: HuggingFace repository for the hardware-accelerated path
/// - `cpu_repo`: HuggingFace repository for the portable CPU path
/// - `init_timeout_ms`: deadline for accelerated initialization before fallback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub accelerated_repo: String,
    pub cpu_repo: String,
    pub init_timeout_ms: u64,
}

/// Audio pipeline settings.
///
/// ## Fields:
/// - `target_sample_rate`: inference sample rate (16kHz for Whisper)
/// - `buffer_min_samples`: accumulation threshold before a block is released
///   (800 samples = 50ms at 16kHz)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    pub target_sample_rate: u32,
    pub buffer_min_samples: usize,
}

/// Test and diagnostics flags with a clear hierarchy.
///
/// ## Hierarchy:
/// - `test_mode` (master): the application operates in test mode and defaults
///   to the deterministic mock engine.
///   - `use_real_transcription`: override to use real engines even in test mode.
///     - `force_cpu`: force CPU inference even if an accelerator is available.
/// - `debug`: lower the default log filter to debug for diagnostics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestFlags {
    pub test_mode: bool,
    pub use_real_transcription: bool,
    pub force_cpu: bool,
    pub debug: bool,
}

impl TestFlags {
    /// Whether engine selection should pick the deterministic mock engine.
    pub fn use_mock_engine(&self) -> bool {
        self.test_mode && !self.use_real_transcription
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig {
                accelerated_repo: "openai/whisper-tiny".to_string(),
                cpu_repo: "openai/whisper-tiny.en".to_string(),
                init_timeout_ms: 5000,
            },
            audio: AudioSettings {
                target_sample_rate: 16000,
                buffer_min_samples: 800, // 50ms at 16kHz
            },
            flags: TestFlags::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from stt.toml (if it exists)
    /// 3. Override with environment variables prefixed with STT_
    /// 4. Handle the legacy flag variables used by the test harness
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("stt").required(false))
            // Example: STT_MODEL__INIT_TIMEOUT_MS becomes model.init_timeout_ms.
            // A single underscore cannot be the separator here: it would
            // split init_timeout_ms itself into nested keys.
            .add_source(
                config::Environment::with_prefix("STT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        // Legacy flag variables predate the STT_ prefix convention but are
        // still what the test harness exports.
        if let Ok(value) = env::var("TEST_MODE") {
            settings = settings.set_override("flags.test_mode", value == "true")?;
        }
        if let Ok(value) = env::var("REAL_WHISPER_TEST") {
            settings = settings.set_override("flags.use_real_transcription", value == "true")?;
        }
        if let Ok(value) = env::var("FORCE_CPU_TRANSCRIPTION") {
            settings = settings.set_override("flags.force_cpu", value == "true")?;
        }

        let config: AppConfig = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.model.init_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Init timeout cannot be 0"));
        }

        if self.audio.target_sample_rate == 0 {
            return Err(anyhow::anyhow!("Target sample rate cannot be 0"));
        }

        if self.audio.buffer_min_samples == 0 {
            return Err(anyhow::anyhow!(
                "Buffer threshold must be greater than 0"
            ));
        }

        if self.model.accelerated_repo.is_empty() || self.model.cpu_repo.is_empty() {
            return Err(anyhow::anyhow!("Model repositories cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.audio.target_sample_rate, 16000);
        assert_eq!(config.audio.buffer_min_samples, 800);
        assert_eq!(config.model.init_timeout_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.model.init_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.audio.buffer_min_samples = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides_apply() {
        // One test mutates the process environment; keeping both the
        // prefixed and the legacy variable here avoids races between
        // parallel tests.
        env::set_var("STT_MODEL__INIT_TIMEOUT_MS", "1234");
        env::set_var("TEST_MODE", "true");
        let config = AppConfig::load();
        env::remove_var("STT_MODEL__INIT_TIMEOUT_MS");
        env::remove_var("TEST_MODE");

        let config = config.unwrap();
        assert_eq!(config.model.init_timeout_ms, 1234);
        assert!(config.flags.test_mode);
    }

    #[test]
    fn test_flag_hierarchy() {
        let mut flags = TestFlags::default();
        assert!(!flags.use_mock_engine());

        flags.test_mode = true;
        assert!(flags.use_mock_engine());

        // The escape hatch wins over the master switch
        flags.use_real_transcription = true;
        assert!(!flags.use_mock_engine());
    }
}
