//! Configuration Module
//!
//! Command-line flags with environment-variable fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// How long a single upstream fetch may take.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// How long shutdown waits for the snapshot to be written.
pub const SHUTDOWN_SAVE_BUDGET: Duration = Duration::from_secs(5);

/// Well-known snapshot location, relative to the working directory.
pub const DEFAULT_SNAPSHOT_PATH: &str = "./cache.snapshot";

/// Proxy configuration.
///
/// Every flag can also be set through the environment variable shown in
/// `--help`.
#[derive(Debug, Clone, Parser)]
#[command(name = "cache_proxy", version, about = "Caching reverse proxy for GET requests")]
pub struct Config {
    /// Base URL of the origin; the request target is appended to it
    #[arg(long = "url", env = "PROXY_UPSTREAM_URL", default_value = "http://localhost:8080")]
    pub upstream_url: String,

    /// How long fetched responses are served from cache (e.g. 90s, 1.5h, 24h); must be above zero
    #[arg(long, env = "PROXY_TTL", default_value = "24h", value_parser = parse_ttl)]
    pub ttl: Duration,

    /// Address the proxy listens on
    #[arg(long, env = "PROXY_ADDR", default_value = "0.0.0.0:8000")]
    pub addr: String,

    /// Where the cache is saved at shutdown and loaded at startup
    #[arg(long = "snapshot", env = "PROXY_SNAPSHOT", default_value = DEFAULT_SNAPSHOT_PATH)]
    pub snapshot_path: PathBuf,

    /// How often expired entries are purged; defaults to the TTL, 0s disables
    #[arg(long, env = "PROXY_SWEEP_INTERVAL", value_parser = parse_duration)]
    pub sweep_interval: Option<Duration>,

    /// Let concurrent misses for the same key share one upstream fetch
    #[arg(long, env = "PROXY_SINGLE_FLIGHT")]
    pub single_flight: bool,
}

impl Config {
    /// Effective sweep interval, `None` when sweeping is disabled.
    pub fn sweep_every(&self) -> Option<Duration> {
        let interval = self.sweep_interval.unwrap_or(self.ttl);
        (!interval.is_zero()).then_some(interval)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_url: "http://localhost:8080".to_string(),
            ttl: Duration::from_secs(24 * 60 * 60),
            addr: "0.0.0.0:8000".to_string(),
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            sweep_interval: None,
            single_flight: false,
        }
    }
}

// == Duration Parsing ==
/// Parses Go-style durations: a sequence of decimal numbers, each with an
/// optional fraction and a unit (`ns`, `us`/`µs`, `ms`, `s`, `m`, `h`, `d`),
/// such as `250ms`, `1.5h` or `1h30m`. A bare integer is a number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let invalid = || format!("invalid duration {:?}", input);
    let mut total_nanos: u128 = 0;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {:?}", input))?;
        let (whole, fraction) = rest[..number_len]
            .split_once('.')
            .unwrap_or((&rest[..number_len], ""));
        if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return Err(invalid());
        }
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit_nanos: u128 = match &rest[..unit_len] {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            "d" => 86_400_000_000_000,
            unit => return Err(format!("unknown unit {:?} in duration {:?}", unit, input)),
        };
        rest = &rest[unit_len..];

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut nanos = whole.saturating_mul(unit_nanos);
        // Digits past nanosecond precision cannot contribute.
        let fraction = &fraction[..fraction.len().min(18)];
        if !fraction.is_empty() {
            let digits: u128 = fraction.parse().map_err(|_| invalid())?;
            nanos = nanos.saturating_add(digits * unit_nanos / 10u128.pow(fraction.len() as u32));
        }
        total_nanos = total_nanos.saturating_add(nanos);
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000).unwrap_or(u64::MAX);
    Ok(Duration::new(secs, (total_nanos % 1_000_000_000) as u32))
}

/// Parses a cache TTL; same grammar as [`parse_duration`], zero rejected.
pub fn parse_ttl(input: &str) -> Result<Duration, String> {
    let ttl = parse_duration(input)?;
    if ttl.is_zero() {
        return Err("ttl must be greater than zero".to_string());
    }
    Ok(ttl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.upstream_url, "http://localhost:8080");
        assert_eq!(config.ttl, Duration::from_secs(86_400));
        assert_eq!(config.addr, "0.0.0.0:8000");
        assert_eq!(config.snapshot_path, PathBuf::from("./cache.snapshot"));
        assert!(!config.single_flight);
    }

    #[test]
    fn test_parse_defaults_match_default_impl() {
        let parsed = Config::try_parse_from(["cache_proxy"]).unwrap();
        let default = Config::default();
        assert_eq!(parsed.ttl, default.ttl);
        assert_eq!(parsed.snapshot_path, default.snapshot_path);
        assert_eq!(parsed.sweep_interval, None);
    }

    #[test]
    fn test_parse_flags() {
        let config = Config::try_parse_from([
            "cache_proxy",
            "--url",
            "http://api.internal:9000",
            "--ttl",
            "1h30m",
            "--addr",
            "127.0.0.1:9999",
            "--sweep-interval",
            "0s",
            "--single-flight",
        ])
        .unwrap();

        assert_eq!(config.upstream_url, "http://api.internal:9000");
        assert_eq!(config.ttl, Duration::from_secs(5400));
        assert_eq!(config.addr, "127.0.0.1:9999");
        assert_eq!(config.sweep_every(), None);
        assert!(config.single_flight);
    }

    #[test]
    fn test_sweep_defaults_to_ttl() {
        let config = Config {
            ttl: Duration::from_secs(30),
            ..Config::default()
        };
        assert_eq!(config.sweep_every(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration("1h1m1s").unwrap(), Duration::from_secs(3661));
        assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(172_800));
    }

    #[test]
    fn test_parse_duration_fractions_and_small_units() {
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration(".5s").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2.25m").unwrap(), Duration::from_secs(135));
        assert_eq!(parse_duration("1.5s250ms").unwrap(), Duration::from_millis(1750));
        assert_eq!(parse_duration("100ns").unwrap(), Duration::from_nanos(100));
        assert_eq!(parse_duration("50us").unwrap(), Duration::from_micros(50));
        assert_eq!(parse_duration("50µs").unwrap(), Duration::from_micros(50));
        assert_eq!(parse_duration("1ms500us").unwrap(), Duration::from_micros(1500));
    }

    #[test]
    fn test_parse_ttl_rejects_zero() {
        assert!(parse_ttl("0").is_err());
        assert!(parse_ttl("0s").is_err());
        assert!(parse_ttl("0.0h").is_err());
        assert_eq!(parse_ttl("1ns").unwrap(), Duration::from_nanos(1));
        assert!(Config::try_parse_from(["cache_proxy", "--ttl", "0s"]).is_err());
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("10").is_ok());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("1h30").is_err());
        assert!(parse_duration(".h").is_err());
        assert!(parse_duration("1.2.3s").is_err());
        assert!(parse_duration("1.5").is_err());
    }
}
