//! Pipeline configuration.
//!
//! Read once when a [`DecodePipeline`](crate::DecodePipeline) is built. The
//! environment overrides mirror the switches a platform integration usually
//! exposes as system properties.

use crate::error::{PipelineError, Result};
use esframe_core::error::Error as CoreError;
use esframe_core::MAX_HEADER_LEN;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default RemainderBuffer cap: four maximum-size IEC 61937 payloads.
pub const DEFAULT_REASSEMBLY_CAP: usize = 6144 * 4;

/// Default timeout for engines running on a worker thread.
pub const DEFAULT_ENGINE_TIMEOUT_MS: u64 = 200;

/// Enables per-frame debug events.
pub const ENV_DEBUG: &str = "ESFRAME_DEBUG";
/// Enables the input/output dump.
pub const ENV_DUMP: &str = "ESFRAME_DUMP";
/// Directory for dump files.
pub const ENV_DUMP_DIR: &str = "ESFRAME_DUMP_DIR";
/// Output mode selector, `0..=3`.
pub const ENV_OUTPUT_MODE: &str = "ESFRAME_OUTPUT_MODE";
/// RemainderBuffer cap in bytes.
pub const ENV_REASSEMBLY_CAP: &str = "ESFRAME_REASSEMBLY_CAP";

/// What the pipeline produces from each delimited frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Decoded PCM.
    #[default]
    Decode,
    /// IEC 61937 bursts for an S/PDIF link.
    Spdif,
    /// IEC 61937 bursts for an HDMI link.
    Hdmi,
    /// Raw elementary stream copied into zero-padded buffers.
    EsBypass,
}

impl OutputMode {
    /// Map the numeric selector (`0` decode, `1` S/PDIF, `2` HDMI, `3` bypass).
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            0 => Some(OutputMode::Decode),
            1 => Some(OutputMode::Spdif),
            2 => Some(OutputMode::Hdmi),
            3 => Some(OutputMode::EsBypass),
            _ => None,
        }
    }

    /// Check if frames are forwarded compressed rather than decoded.
    pub fn is_passthrough(&self) -> bool {
        matches!(self, OutputMode::Spdif | OutputMode::Hdmi)
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Decode => write!(f, "decode"),
            OutputMode::Spdif => write!(f, "spdif"),
            OutputMode::Hdmi => write!(f, "hdmi"),
            OutputMode::EsBypass => write!(f, "es-bypass"),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// RemainderBuffer cap in bytes.
    pub reassembly_cap: usize,
    /// Output mode.
    pub output_mode: OutputMode,
    /// Raise per-frame events from `trace` to `debug`.
    pub verbose_logging: bool,
    /// Append inputs and outputs to dump files.
    pub debug_dump: bool,
    /// Directory for dump files; the system temp dir when unset.
    pub dump_dir: Option<PathBuf>,
    /// Timeout for threaded engines, in milliseconds.
    pub engine_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reassembly_cap: DEFAULT_REASSEMBLY_CAP,
            output_mode: OutputMode::Decode,
            verbose_logging: false,
            debug_dump: false,
            dump_dir: None,
            engine_timeout_ms: DEFAULT_ENGINE_TIMEOUT_MS,
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through an arbitrary variable lookup.
    ///
    /// Empty values are ignored. Malformed values are rejected rather than
    /// silently replaced by defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(value) = get(ENV_DEBUG) {
            config.verbose_logging = parse_flag(ENV_DEBUG, &value)?;
        }
        if let Some(value) = get(ENV_DUMP) {
            config.debug_dump = parse_flag(ENV_DUMP, &value)?;
        }
        if let Some(value) = get(ENV_DUMP_DIR) {
            config.dump_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = get(ENV_OUTPUT_MODE) {
            config.output_mode = value
                .trim()
                .parse::<u32>()
                .ok()
                .and_then(OutputMode::from_value)
                .ok_or_else(|| config_error(ENV_OUTPUT_MODE, &value))?;
        }
        if let Some(value) = get(ENV_REASSEMBLY_CAP) {
            config.reassembly_cap = value
                .trim()
                .parse()
                .map_err(|_| config_error(ENV_REASSEMBLY_CAP, &value))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.reassembly_cap < MAX_HEADER_LEN {
            return Err(PipelineError::InvalidConfig(format!(
                "reassembly cap {} is smaller than the largest header ({MAX_HEADER_LEN} bytes)",
                self.reassembly_cap
            )));
        }
        if self.engine_timeout_ms == 0 {
            return Err(PipelineError::InvalidConfig(
                "engine timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Engine timeout as a [`Duration`].
    pub fn engine_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_timeout_ms)
    }

    /// Directory dump files are written to.
    pub fn dump_directory(&self) -> PathBuf {
        self.dump_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Set the RemainderBuffer cap.
    #[must_use]
    pub fn with_reassembly_cap(mut self, cap: usize) -> Self {
        self.reassembly_cap = cap;
        self
    }

    /// Set the output mode.
    #[must_use]
    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    /// Enable or disable per-frame debug events.
    #[must_use]
    pub fn with_verbose_logging(mut self, verbose: bool) -> Self {
        self.verbose_logging = verbose;
        self
    }

    /// Enable dumping into `dir`.
    #[must_use]
    pub fn with_debug_dump(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dump = true;
        self.dump_dir = Some(dir.into());
        self
    }

    /// Set the threaded engine timeout.
    #[must_use]
    pub fn with_engine_timeout(mut self, timeout: Duration) -> Self {
        self.engine_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(config_error(key, value)),
    }
}

fn config_error(key: &str, value: &str) -> PipelineError {
    PipelineError::Core(CoreError::Config(format!("{key}: invalid value {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.reassembly_cap, 24576);
        assert_eq!(config.output_mode, OutputMode::Decode);
        assert!(!config.verbose_logging);
        assert!(!config.debug_dump);
        assert_eq!(config.engine_timeout(), Duration::from_millis(200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = PipelineConfig::from_lookup(lookup(&[
            (ENV_DEBUG, "1"),
            (ENV_DUMP, "true"),
            (ENV_DUMP_DIR, "/var/tmp/esframe"),
            (ENV_OUTPUT_MODE, "2"),
            (ENV_REASSEMBLY_CAP, "8192"),
        ]))
        .unwrap();

        assert!(config.verbose_logging);
        assert!(config.debug_dump);
        assert_eq!(config.dump_directory(), PathBuf::from("/var/tmp/esframe"));
        assert_eq!(config.output_mode, OutputMode::Hdmi);
        assert_eq!(config.reassembly_cap, 8192);
    }

    #[test]
    fn test_from_lookup_empty_values_ignored() {
        let config = PipelineConfig::from_lookup(lookup(&[(ENV_OUTPUT_MODE, "")])).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_from_lookup_rejects_malformed() {
        let err = PipelineConfig::from_lookup(lookup(&[(ENV_OUTPUT_MODE, "7")])).unwrap_err();
        assert!(matches!(err, PipelineError::Core(CoreError::Config(_))));

        let err = PipelineConfig::from_lookup(lookup(&[(ENV_DEBUG, "maybe")])).unwrap_err();
        assert!(matches!(err, PipelineError::Core(CoreError::Config(_))));

        let err = PipelineConfig::from_lookup(lookup(&[(ENV_REASSEMBLY_CAP, "4")])).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_output_mode_values() {
        assert_eq!(OutputMode::from_value(0), Some(OutputMode::Decode));
        assert_eq!(OutputMode::from_value(3), Some(OutputMode::EsBypass));
        assert_eq!(OutputMode::from_value(4), None);
        assert!(OutputMode::Spdif.is_passthrough());
        assert!(!OutputMode::EsBypass.is_passthrough());
        assert_eq!(OutputMode::EsBypass.to_string(), "es-bypass");
    }

    #[test]
    fn test_validate() {
        assert!(PipelineConfig::new().with_reassembly_cap(0).validate().is_err());
        assert!(PipelineConfig::new()
            .with_engine_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(PipelineConfig::new()
            .with_reassembly_cap(MAX_HEADER_LEN)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_serde_roundtrip_with_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"output_mode":"spdif","verbose_logging":true}"#).unwrap();
        assert_eq!(config.output_mode, OutputMode::Spdif);
        assert!(config.verbose_logging);
        assert_eq!(config.reassembly_cap, DEFAULT_REASSEMBLY_CAP);
    }
}
