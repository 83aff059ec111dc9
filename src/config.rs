//! Command-line and environment configuration

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::error::{GatewayError, Result};
use crate::integrations::{PurelymailConfig, DEFAULT_BASE_URL};

/// Which front end serves MCP traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    Stdio,
    Http,
}

/// Log output format on stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "purelymail-mcp")]
#[command(version, about = "MCP server exposing the Purelymail API as tools")]
pub struct Cli {
    /// Purelymail API token
    #[arg(long, env = "PURELYMAIL_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Purelymail API base URL
    #[arg(long, env = "PURELYMAIL_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub api_base_url: String,

    /// Transport (stdio or http)
    #[arg(long, env = "MCP_TRANSPORT", value_enum, default_value = "stdio")]
    pub transport: Transport,

    /// HTTP listen port
    #[arg(long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// HTTP bind host
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Seconds an HTTP caller waits for its reply
    #[arg(long, env = "MCP_REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    /// Seconds before an upstream API call is abandoned
    #[arg(long, env = "PURELYMAIL_HTTP_TIMEOUT_SECS", default_value = "20")]
    pub upstream_timeout_secs: u64,

    /// Log format (text or json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

/// Validated server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub upstream: PurelymailConfig,
    pub transport: Transport,
    pub listen_addr: SocketAddr,
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

impl Cli {
    /// Validate arguments. The API key is required and must not be blank.
    pub fn into_config(self) -> Result<ServerConfig> {
        let api_key = self
            .api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                GatewayError::Config(
                    "PURELYMAIL_API_KEY is required (set the environment variable or pass --api-key)"
                        .to_string(),
                )
            })?;

        if self.request_timeout_secs == 0 {
            return Err(GatewayError::Config(
                "request timeout must be at least one second".to_string(),
            ));
        }

        let mut upstream = PurelymailConfig::new(api_key).with_base_url(self.api_base_url);
        upstream.timeout = Duration::from_secs(self.upstream_timeout_secs.max(1));

        Ok(ServerConfig {
            upstream,
            transport: self.transport,
            listen_addr: SocketAddr::new(self.host, self.port),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            log_format: self.log_format,
        })
    }
}
