use crate::error::{Error, Result};
use std::time::Duration;

/// Upper bound on worker threads per pool.
pub const MAX_THREADS: usize = 32_767;

/// Timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1000);

#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: usize,
    pub timeout: Duration,
    pub stack_size: Option<usize>,
    pub thread_name_prefix: String,
    /// How long a successful execution waits for idle workers to exit.
    pub shutdown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get().clamp(1, MAX_THREADS),
            timeout: DEFAULT_TIMEOUT,
            stack_size: Some(2 * 1024 * 1024),
            thread_name_prefix: "batchrun-worker".to_string(),
            shutdown_grace: Duration::from_secs(1),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_threads == 0 {
            return Err(Error::config("num_threads must be > 0"));
        }
        if self.num_threads > MAX_THREADS {
            return Err(Error::config(format!(
                "num_threads too large (max {})",
                MAX_THREADS
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::config("timeout must be > 0"));
        }
        if self.stack_size == Some(0) {
            return Err(Error::config("stack_size must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = n;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn timeout_secs(self, secs: u64) -> Self {
        self.timeout(Duration::from_secs(secs))
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_thread_bounds() {
        assert!(Config::builder().num_threads(0).build().is_err());
        assert!(Config::builder().num_threads(MAX_THREADS + 1).build().is_err());
        assert!(Config::builder().num_threads(1).build().is_ok());
        assert!(Config::builder().num_threads(MAX_THREADS).build().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = Config::builder()
            .num_threads(1)
            .timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_builder_fields() {
        let config = Config::builder()
            .num_threads(4)
            .timeout_secs(3)
            .thread_name_prefix("batch")
            .shutdown_grace(Duration::from_millis(50))
            .build()
            .unwrap();

        assert_eq!(config.num_threads, 4);
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.thread_name_prefix, "batch");
        assert_eq!(config.shutdown_grace, Duration::from_millis(50));
    }
}
