//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Capacity of the in-process job queue
    pub queue_capacity: usize,
    /// Width of the generated still image
    pub image_width: u32,
    /// Height of the generated still image
    pub image_height: u32,
    /// Attempts for the debit-and-create transaction under contention
    pub tx_max_attempts: u32,
    /// Base delay between transaction attempts (grows linearly)
    pub tx_backoff_base: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 8,
            shutdown_timeout: Duration::from_secs(60),
            queue_capacity: 256,
            image_width: 768,
            image_height: 1344,
            tx_max_attempts: 5,
            tx_backoff_base: Duration::from_millis(50),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: env_or("WORKER_MAX_JOBS", defaults.max_concurrent_jobs).max(1),
            shutdown_timeout: Duration::from_secs(env_or(
                "WORKER_SHUTDOWN_TIMEOUT",
                defaults.shutdown_timeout.as_secs(),
            )),
            queue_capacity: env_or("WORKER_QUEUE_CAPACITY", defaults.queue_capacity).max(1),
            image_width: env_or("IMAGE_WIDTH", defaults.image_width),
            image_height: env_or("IMAGE_HEIGHT", defaults.image_height),
            tx_max_attempts: env_or("WORKER_TX_MAX_ATTEMPTS", defaults.tx_max_attempts).max(1),
            tx_backoff_base: Duration::from_millis(env_or(
                "WORKER_TX_BACKOFF_MS",
                defaults.tx_backoff_base.as_millis() as u64,
            )),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        for key in [
            "WORKER_MAX_JOBS",
            "WORKER_SHUTDOWN_TIMEOUT",
            "IMAGE_WIDTH",
            "IMAGE_HEIGHT",
            "WORKER_TX_MAX_ATTEMPTS",
        ] {
            std::env::remove_var(key);
        }
        let config = WorkerConfig::from_env();
        assert_eq!(config.max_concurrent_jobs, 8);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(60));
        assert_eq!((config.image_width, config.image_height), (768, 1344));
        assert_eq!(config.tx_max_attempts, 5);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides_and_clamps() {
        std::env::set_var("WORKER_MAX_JOBS", "0");
        std::env::set_var("WORKER_TX_MAX_ATTEMPTS", "9");
        let config = WorkerConfig::from_env();
        assert_eq!(config.max_concurrent_jobs, 1);
        assert_eq!(config.tx_max_attempts, 9);
        std::env::remove_var("WORKER_MAX_JOBS");
        std::env::remove_var("WORKER_TX_MAX_ATTEMPTS");
    }
}
