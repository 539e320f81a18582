use clap::Parser;
use std::time::Duration;

use crate::governor::GovernorConfig;
use crate::rate_limit::RateLimitConfig;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "euk-gateway")]
#[command(about = "API proxy in front of the EUK backend")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 3000)]
    pub port: u16,

    // EUK backend base url
    #[arg(short, long, default_value = "http://localhost:8080")]
    pub backend_url: String,

    // Max requests per window per client address
    #[arg(long, default_value_t = 30)]
    pub rate_limit_max: u32,

    // Rate limit window in milliseconds
    #[arg(long, default_value_t = 60_000)]
    pub rate_limit_window_ms: u64,

    // Outbound calls started together in one batch
    #[arg(long, default_value_t = 3)]
    pub max_concurrent: usize,

    // Pause between outbound batches in milliseconds
    #[arg(long, default_value_t = 100)]
    pub batch_delay_ms: u64,

    // Timeout for a single backend call
    #[arg(long, default_value_t = 10)]
    pub backend_timeout_secs: u64,

    // Serve mock data when the backend is unreachable
    #[arg(long, default_value_t = false)]
    pub mock_fallback: bool,
}

impl Args {
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.rate_limit_max,
            window: Duration::from_millis(self.rate_limit_window_ms),
        }
    }

    pub fn governor_config(&self) -> GovernorConfig {
        GovernorConfig {
            max_concurrent: self.max_concurrent.max(1),
            batch_delay: Duration::from_millis(self.batch_delay_ms),
        }
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_component_defaults() {
        let args = Args::parse_from(["euk-gateway"]);

        assert_eq!(args.port, 3000);
        assert!(!args.mock_fallback);

        let rl = args.rate_limit_config();
        assert_eq!(rl.max_requests, RateLimitConfig::default().max_requests);
        assert_eq!(rl.window, RateLimitConfig::default().window);

        let gov = args.governor_config();
        assert_eq!(gov.max_concurrent, 3);
        assert_eq!(gov.batch_delay, Duration::from_millis(100));
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let args = Args::parse_from(["euk-gateway", "--max-concurrent", "0", "--mock-fallback"]);

        assert_eq!(args.governor_config().max_concurrent, 1);
        assert!(args.mock_fallback);
    }
}
