//! Configuration for floodcastd

use clap::Parser;
use std::time::Duration;

/// floodcastd - floodcast broadcast node
#[derive(Parser, Debug, Clone)]
#[command(name = "floodcastd")]
#[command(about = "Best-effort broadcast node speaking the floodcast wire protocol")]
pub struct Config {
    /// Timeout for a single relay RPC, in milliseconds
    #[arg(long, default_value = "1000", env = "FLOODCAST_RPC_TIMEOUT_MS")]
    pub rpc_timeout_ms: u64,

    /// Delay scale for the first relay retry, in milliseconds
    #[arg(long, default_value = "100")]
    pub retry_base_ms: u64,

    /// Upper bound on any relay retry delay, in milliseconds
    #[arg(long, default_value = "2000")]
    pub retry_cap_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log format (json or pretty)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.retry_base_ms == 0 {
            anyhow::bail!("retry base delay must be nonzero");
        }
        if self.retry_cap_ms < self.retry_base_ms {
            anyhow::bail!("retry cap must be at least the base delay");
        }
        Ok(())
    }

    /// RPC timeout as a duration
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Retry base delay as a duration
    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }

    /// Retry cap as a duration
    pub fn retry_cap(&self) -> Duration {
        Duration::from_millis(self.retry_cap_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            rpc_timeout_ms: 1000,
            retry_base_ms: 100,
            retry_cap_ms: 2000,
            verbose: false,
            log_format: "pretty".to_string(),
        }
    }

    #[test]
    fn test_defaults_validate() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_zero_retry_base_rejected() {
        let mut config = base_config();
        config.retry_base_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cap_below_base_rejected() {
        let mut config = base_config();
        config.retry_cap_ms = 50;
        assert!(config.validate().is_err());
    }
}
