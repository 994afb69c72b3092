//! Server configuration.
//!
//! Every setting has a default, so a bare `respkv` listens on
//! `0.0.0.0:6379` and sweeps every 100 ms. Command-line flags override the
//! defaults.

use crate::storage::DEFAULT_SWEEP_INTERVAL;
use std::time::Duration;
use thiserror::Error;

/// The default port (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default bind host: all interfaces
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Runtime settings for the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Interval between background expiry sweeps
    pub sweep_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Run(Config),
    Help,
    Version,
}

/// Invalid command-line input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid value for {flag}: '{value}'")]
    InvalidValue { flag: String, value: String },

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

impl Config {
    /// Parses command-line arguments, not including the program name.
    pub fn parse_args<I, S>(args: I) -> Result<Invocation, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = Config::default();
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => {
                    config.host = required(&arg, args.next())?;
                }
                "--port" | "-p" => {
                    let value = required(&arg, args.next())?;
                    config.port = parse_number(&arg, &value)?;
                }
                "--sweep-interval-ms" => {
                    let value = required(&arg, args.next())?;
                    let millis: u64 = parse_number(&arg, &value)?;
                    if millis == 0 {
                        return Err(ConfigError::InvalidValue { flag: arg, value });
                    }
                    config.sweep_interval = Duration::from_millis(millis);
                }
                "--help" => return Ok(Invocation::Help),
                "--version" | "-v" => return Ok(Invocation::Version),
                _ => return Err(ConfigError::UnknownArgument(arg)),
            }
        }

        Ok(Invocation::Run(config))
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required(flag: &str, value: Option<String>) -> Result<String, ConfigError> {
    value.ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
    })
}

/// Usage text printed for `--help` and after argument errors.
pub fn usage() -> &'static str {
    r#"
respkv - in-memory key-value server (RESP subset)

USAGE:
    respkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>            Host to bind to (default: 0.0.0.0)
    -p, --port <PORT>            Port to listen on (default: 6379)
        --sweep-interval-ms <MS> Expiry sweep interval (default: 100)
    -v, --version                Print version information
        --help                   Print this help message

COMMANDS:
    PING
    ECHO message
    SET key value [PX milliseconds]
    GET key

Log verbosity is controlled with RUST_LOG (default: info).
"#
}
