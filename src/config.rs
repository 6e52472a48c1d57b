//! Runtime configuration.
//!
//! Every setting is a command-line flag with an environment-variable
//! fallback, so the same binary runs unchanged locally and in a container.

use std::fmt;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Parser)]
#[command(name = "greenlight", version, about = "Greenlight JSON API server")]
pub struct Config {
    /// API server port
    #[arg(long, env = "GREENLIGHT_PORT", default_value_t = 4000)]
    pub port: u16,

    /// Environment the server runs in
    #[arg(long, env = "GREENLIGHT_ENV", value_enum, default_value_t = Environment::Development)]
    pub env: Environment,

    /// Largest request body accepted, in bytes; larger bodies get 413
    #[arg(long, env = "GREENLIGHT_MAX_BODY_BYTES", default_value_t = crate::server::DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Log output format
    #[arg(long, env = "GREENLIGHT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    /// Address the server binds to: all interfaces on [`Config::port`].
    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging     => "staging",
            Self::Production  => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Json => "json",
        })
    }
}
