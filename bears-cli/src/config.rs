//! Configuration file support for BEARS-TP CLI tools
//!
//! Both tools read an optional TOML file with `[sender]` and `[receiver]`
//! tables. Every field has a default, so a table may list only what it
//! changes. Command-line flags override file values.

use bears::protocol::packet::MAX_PAYLOAD_SIZE;
use bears::{ReceiverOptions, SenderOptions, SeqNumber};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Default destination port
pub const DEFAULT_PORT: u16 = 33122;

/// Sender configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Input source (file path or "-" for stdin)
    pub input: String,
    /// Destination host name or address
    pub address: String,
    pub port: u16,
    pub initial_seq: u32,
    /// Maximum outstanding packets
    pub window_size: usize,
    /// Payload bytes per packet
    pub payload_size: usize,
    /// Retransmission timeout in milliseconds
    pub timeout_ms: u64,
    pub fast_retransmit_threshold: u32,
    /// Selective acknowledgement mode
    pub sack: bool,
    /// Statistics interval in seconds, 0 disables periodic output
    pub stats_interval_secs: u64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        let options = SenderOptions::default();
        SenderConfig {
            input: "-".to_string(),
            address: "localhost".to_string(),
            port: DEFAULT_PORT,
            initial_seq: options.initial_seq.as_raw(),
            window_size: options.window_size,
            payload_size: options.payload_size,
            timeout_ms: options.retransmission_timeout.as_millis() as u64,
            fast_retransmit_threshold: options.fast_retransmit_threshold,
            sack: options.sack_mode,
            stats_interval_secs: 0,
        }
    }
}

impl SenderConfig {
    /// Session options described by this configuration
    pub fn to_options(&self) -> Result<SenderOptions, ConfigError> {
        let options = SenderOptions {
            initial_seq: SeqNumber::new(self.initial_seq),
            window_size: self.window_size,
            payload_size: self.payload_size,
            retransmission_timeout: Duration::from_millis(self.timeout_ms),
            fast_retransmit_threshold: self.fast_retransmit_threshold,
            sack_mode: self.sack,
        };
        options
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(options)
    }

    /// Get statistics interval as Duration
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}

/// Receiver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Output destination (file path or "-" for stdout)
    pub output: String,
    /// Local address to bind
    pub bind: String,
    pub port: u16,
    /// Quiet period after the FIN before exiting, in milliseconds
    pub linger_ms: u64,
    /// Give up after this many seconds without a datagram
    pub idle_timeout_secs: Option<u64>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        ReceiverConfig {
            output: "-".to_string(),
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            linger_ms: ReceiverOptions::default().linger.as_millis() as u64,
            idle_timeout_secs: None,
        }
    }
}

impl ReceiverConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("bad bind address {}", self.bind)))
    }

    pub fn to_options(&self) -> ReceiverOptions {
        ReceiverOptions {
            linger: Duration::from_millis(self.linger_ms),
            idle_timeout: self.idle_timeout_secs.map(Duration::from_secs),
            ..ReceiverOptions::default()
        }
    }
}

/// Combined configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Sender configuration
    pub sender: Option<SenderConfig>,
    /// Receiver configuration
    pub receiver: Option<ReceiverConfig>,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        if let Some(sender) = &config.sender {
            if sender.payload_size > MAX_PAYLOAD_SIZE {
                return Err(ConfigError::Invalid(format!(
                    "payload_size {} exceeds {}",
                    sender.payload_size, MAX_PAYLOAD_SIZE
                )));
            }
        }
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Create example sender configuration
    pub fn example_sender() -> Self {
        Config {
            sender: Some(SenderConfig {
                input: "payload.bin".to_string(),
                stats_interval_secs: 1,
                ..SenderConfig::default()
            }),
            receiver: None,
        }
    }

    /// Create example receiver configuration
    pub fn example_receiver() -> Self {
        Config {
            sender: None,
            receiver: Some(ReceiverConfig {
                output: "received.bin".to_string(),
                idle_timeout_secs: Some(30),
                ..ReceiverConfig::default()
            }),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
