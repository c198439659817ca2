//! Server Configuration
//!
//! Command-line options for the `gache` binary. `Config` also implements
//! `Default`, so library users and tests can build one without parsing argv.

use clap::Parser;
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;

use crate::DEFAULT_ADDR;

/// gache server
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "gache")]
#[command(about = "In-memory key-value cache with lists, dictionaries and per-key TTL")]
#[command(version)]
pub struct Config {
    /// Address to listen on
    #[arg(long, default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// Enable logging
    #[arg(long)]
    pub log: bool,

    /// Log level: 1 debug, 2 info, 3 warn, 4 error, 5 fatal
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=5))]
    pub log_level: u8,

    /// Serve many requests per connection instead of one
    #[arg(long)]
    pub keep_alive: bool,

    /// Close a connection that sends no complete line for this many seconds (0 = never)
    #[arg(long, default_value_t = 0)]
    pub read_timeout: u64,

    /// Stop the server after this many seconds (0 = run until interrupted)
    #[arg(long, default_value_t = 0)]
    pub exit_after: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            log: false,
            log_level: 1,
            keep_alive: false,
            read_timeout: 0,
            exit_after: 0,
        }
    }
}

impl Config {
    /// Per-read timeout, if one is configured.
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout > 0).then(|| Duration::from_secs(self.read_timeout))
    }

    /// Self-exit delay, if one is configured.
    pub fn exit_after(&self) -> Option<Duration> {
        (self.exit_after > 0).then(|| Duration::from_secs(self.exit_after))
    }

    /// Maximum log level. There is no fatal level, so 4 and 5 both map to ERROR.
    pub fn level_filter(&self) -> LevelFilter {
        if !self.log {
            return LevelFilter::OFF;
        }
        match self.log_level {
            0 | 1 => LevelFilter::DEBUG,
            2 => LevelFilter::INFO,
            3 => LevelFilter::WARN,
            _ => LevelFilter::ERROR,
        }
    }
}
