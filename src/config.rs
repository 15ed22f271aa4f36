use crate::error::{Error, Result};
use std::time::Duration;

/// Longest bounded read we accept, since it may stall the interactive thread.
pub const MAX_BOUNDED_READ: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: Option<usize>,
    pub stack_size: Option<usize>,
    pub thread_name_prefix: String,
    pub queue_capacity: usize,
    pub bounded_read_timeout: Duration,
    pub idle_park: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: None,
            stack_size: Some(2 * 1024 * 1024),
            thread_name_prefix: "deckhand-worker".to_string(),
            queue_capacity: 10_000,
            bounded_read_timeout: Duration::from_millis(1000),
            idle_park: Duration::from_micros(100),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > 1024 {
                return Err(Error::config("num_threads too large (max 1024)"));
            }
        }

        if self.queue_capacity == 0 {
            return Err(Error::config("queue_capacity must be > 0"));
        }

        if self.bounded_read_timeout.is_zero() {
            return Err(Error::config("bounded_read_timeout must be > 0"));
        }
        if self.bounded_read_timeout > MAX_BOUNDED_READ {
            return Err(Error::config(format!(
                "bounded_read_timeout too large (max {:?})",
                MAX_BOUNDED_READ
            )));
        }

        if self.idle_park.is_zero() {
            return Err(Error::config("idle_park must be > 0"));
        }

        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
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
        self.config.num_threads = Some(n);
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn bounded_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.bounded_read_timeout = timeout;
        self
    }

    pub fn idle_park(mut self, park: Duration) -> Self {
        self.config.idle_park = park;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
