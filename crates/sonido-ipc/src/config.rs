//! Runtime configuration for the IPC context.
//!
//! [`IpcConfig`] sizes the message pool and bounds allocations made on behalf
//! of the host. Firmware builds construct it in code; host simulations can load
//! it from TOML (`toml` feature):
//!
//! ```toml
//! core_count = 2
//! max_messages = 16
//! max_message_size = 384
//! max_buffer_size = 65536
//! pipeline_free_policy = "cascade"
//! ```

#[cfg(feature = "std")]
use std::path::PathBuf;

use thiserror::Error;

/// What [`free_pipeline`](crate::IpcContext::free_pipeline) does when the
/// pipeline still has components or buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PipelineFreePolicy {
    /// Fail with [`IpcError::PipelineNotEmpty`](crate::IpcError::PipelineNotEmpty).
    #[default]
    Reject,
    /// Free member buffers, then member components, then the pipeline.
    Cascade,
}

/// IPC context configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct IpcConfig {
    /// Number of DSP cores objects may be placed on.
    pub core_count: u16,
    /// Capacity of the message pool.
    pub max_messages: usize,
    /// Largest payload a single message may carry, in bytes.
    pub max_message_size: usize,
    /// Largest audio buffer the host may request, in bytes.
    pub max_buffer_size: usize,
    /// Pipeline teardown policy.
    pub pipeline_free_policy: PipelineFreePolicy,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            core_count: 4,
            max_messages: 32,
            max_message_size: 384,
            max_buffer_size: 64 * 1024,
            pipeline_free_policy: PipelineFreePolicy::Reject,
        }
    }
}

impl IpcConfig {
    /// Sets the number of cores.
    pub fn with_core_count(mut self, core_count: u16) -> Self {
        self.core_count = core_count;
        self
    }

    /// Sets the message pool capacity.
    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    /// Sets the maximum message payload size.
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Sets the maximum audio buffer size.
    pub fn with_max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.max_buffer_size = max_buffer_size;
        self
    }

    /// Sets the pipeline teardown policy.
    pub fn with_pipeline_free_policy(mut self, policy: PipelineFreePolicy) -> Self {
        self.pipeline_free_policy = policy;
        self
    }

    /// Checks that every limit is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_count == 0 || self.core_count > 32 {
            return Err(ConfigError::InvalidValue {
                field: "core_count",
                reason: "must be between 1 and 32",
            });
        }
        if self.max_messages == 0 || self.max_messages > usize::from(u16::MAX) {
            return Err(ConfigError::InvalidValue {
                field: "max_messages",
                reason: "must be between 1 and 65535",
            });
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_message_size",
                reason: "must be non-zero",
            });
        }
        if self.max_buffer_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_buffer_size",
                reason: "must be non-zero",
            });
        }
        Ok(())
    }

    /// Parses and validates a TOML document. Missing keys take defaults.
    #[cfg(feature = "toml")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    #[cfg(feature = "toml")]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

/// Errors produced while building an [`IpcConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field is out of range.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Constraint that was violated.
        reason: &'static str,
    },

    /// Storage sized by the configuration could not be reserved.
    #[error("cannot reserve storage for {0} messages")]
    Allocation(usize),

    /// Failed to read a configuration file.
    #[cfg(feature = "std")]
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[cfg(feature = "toml")]
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        IpcConfig::default().validate().unwrap();
    }

    #[test]
    fn builder_sets_fields() {
        let config = IpcConfig::default()
            .with_core_count(2)
            .with_max_messages(8)
            .with_max_message_size(64)
            .with_max_buffer_size(4096)
            .with_pipeline_free_policy(PipelineFreePolicy::Cascade);
        assert_eq!(config.core_count, 2);
        assert_eq!(config.max_messages, 8);
        assert_eq!(config.max_message_size, 64);
        assert_eq!(config.max_buffer_size, 4096);
        assert_eq!(config.pipeline_free_policy, PipelineFreePolicy::Cascade);
    }

    #[test]
    fn zero_cores_rejected() {
        let err = IpcConfig::default().with_core_count(0).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for 'core_count': must be between 1 and 32"
        );
    }

    #[test]
    fn zero_pool_rejected() {
        assert!(IpcConfig::default().with_max_messages(0).validate().is_err());
        assert!(IpcConfig::default().with_max_message_size(0).validate().is_err());
        assert!(IpcConfig::default().with_max_buffer_size(0).validate().is_err());
    }

    #[cfg(feature = "toml")]
    #[test]
    fn toml_partial_document_uses_defaults() {
        let config = IpcConfig::from_toml_str(
            "core_count = 2\npipeline_free_policy = \"cascade\"\n",
        )
        .unwrap();
        assert_eq!(config.core_count, 2);
        assert_eq!(config.pipeline_free_policy, PipelineFreePolicy::Cascade);
        assert_eq!(config.max_messages, IpcConfig::default().max_messages);
    }

    #[cfg(feature = "toml")]
    #[test]
    fn toml_unknown_key_rejected() {
        let err = IpcConfig::from_toml_str("cores = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "got: {err}");
    }

    #[cfg(feature = "toml")]
    #[test]
    fn toml_invalid_value_rejected() {
        let err = IpcConfig::from_toml_str("max_messages = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "max_messages", .. }));
    }

    #[cfg(feature = "toml")]
    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ipc.toml");
        std::fs::write(&path, "max_message_size = 128\n").unwrap();
        let config = IpcConfig::load(&path).unwrap();
        assert_eq!(config.max_message_size, 128);
    }

    #[cfg(feature = "toml")]
    #[test]
    fn load_missing_file_reports_path() {
        let err = IpcConfig::load("/nonexistent/ipc.toml").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("failed to read file"), "got: {msg}");
        assert!(msg.contains("/nonexistent/ipc.toml"), "got: {msg}");
    }
}
