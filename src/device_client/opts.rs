// SPDX-License-Identifier: MPL-2.0

use std::time::Duration;

use super::error::{DeviceClientError, DeviceClientResult};

/// Configuration for the completion dispatchers.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Timeout applied to registrations that do not carry their own.
    /// `None` means such operations never expire.
    pub default_timeout: Option<Duration>,
    /// How often the worker sweeps for expired deadlines when no
    /// earlier deadline is known.
    pub sweep_interval: Duration,
    /// Maximum number of outstanding operations.
    pub max_pending: usize,
    /// Queue size for pending commands.
    pub command_queue_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            default_timeout: None,
            sweep_interval: Duration::from_millis(100),
            max_pending: 1024,
            command_queue_size: 100,
        }
    }
}

impl DispatcherConfig {
    /// Create a builder starting from the default configuration.
    pub fn builder() -> DispatcherConfigBuilder {
        DispatcherConfigBuilder::new()
    }

    /// Validate field values.
    ///
    /// Called by the dispatchers before spawning their worker, so a bad
    /// configuration is rejected up front rather than producing a worker
    /// that spins or can never register anything.
    pub fn validate(&self) -> DeviceClientResult<()> {
        if self.sweep_interval.is_zero() {
            return Err(DeviceClientError::InvalidConfiguration {
                field: "sweep_interval".to_string(),
                reason: "must be non-zero".to_string(),
            });
        }
        if self.max_pending == 0 {
            return Err(DeviceClientError::InvalidConfiguration {
                field: "max_pending".to_string(),
                reason: "must allow at least one pending operation".to_string(),
            });
        }
        if self.command_queue_size == 0 {
            return Err(DeviceClientError::InvalidConfiguration {
                field: "command_queue_size".to_string(),
                reason: "must hold at least one command".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for [`DispatcherConfig`].
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfigBuilder {
    config: DispatcherConfig,
}

impl DispatcherConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: DispatcherConfig::default(),
        }
    }

    /// Timeout for registrations without an explicit one.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = Some(timeout);
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn max_pending(mut self, max_pending: usize) -> Self {
        self.config.max_pending = max_pending;
        self
    }

    pub fn command_queue_size(mut self, size: usize) -> Self {
        self.config.command_queue_size = size;
        self
    }

    /// Build the configuration, validating field values.
    pub fn build(self) -> DeviceClientResult<DispatcherConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = DispatcherConfig::default();
        assert_eq!(config.default_timeout, None);
        assert_eq!(config.sweep_interval, Duration::from_millis(100));
        assert_eq!(config.max_pending, 1024);
        assert_eq!(config.command_queue_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = DispatcherConfig::builder()
            .default_timeout(Duration::from_secs(5))
            .sweep_interval(Duration::from_millis(10))
            .max_pending(64)
            .command_queue_size(8)
            .build()
            .unwrap();
        assert_eq!(config.default_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.sweep_interval, Duration::from_millis(10));
        assert_eq!(config.max_pending, 64);
        assert_eq!(config.command_queue_size, 8);
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let result = DispatcherConfig::builder()
            .sweep_interval(Duration::ZERO)
            .build();
        match result {
            Err(DeviceClientError::InvalidConfiguration { field, .. }) => {
                assert_eq!(field, "sweep_interval");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_zero_max_pending_rejected() {
        let result = DispatcherConfig::builder().max_pending(0).build();
        match result {
            Err(DeviceClientError::InvalidConfiguration { field, .. }) => {
                assert_eq!(field, "max_pending");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
