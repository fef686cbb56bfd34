use secrecy::SecretString;
use std::net::IpAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
///
/// The agent credentials are deliberately optional: the relay still starts
/// without them and rejects every inbound telephony connection instead.
#[derive(Debug)]
pub struct Config {
    pub host: IpAddr,
    /// First port the binder tries; see [`crate::net::bind_available_port`].
    pub port: u16,
    pub port_retry_limit: u16,
    pub agent_id: Option<String>,
    pub api_key: Option<SecretString>,
    pub convai_url: String,
    /// Whether a peer socket *error* (as opposed to a close) tears down the
    /// other peer. Off by default.
    pub propagate_peer_errors: bool,
    pub log_level: Level,
}

/// Borrowed view of the credential pair, present only when both are set.
#[derive(Debug, Clone, Copy)]
pub struct AgentCredentials<'a> {
    pub agent_id: &'a str,
    pub api_key: &'a SecretString,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let host_str = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let host = host_str
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidValue("HOST".to_string(), e.to_string()))?;

        let port = parse_var("PORT", 3020)?;
        let port_retry_limit: u16 = parse_var("PORT_RETRY_LIMIT", 16)?;
        if port_retry_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "PORT_RETRY_LIMIT".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let agent_id = std::env::var("ELEVENLABS_AGENT_ID").ok();
        let api_key = std::env::var("ELEVENLABS_API_KEY").ok().map(SecretString::from);

        let convai_url = std::env::var("CONVAI_URL")
            .unwrap_or_else(|_| convai_realtime::client::DEFAULT_ENDPOINT.to_string());

        let propagate_peer_errors = match std::env::var("PROPAGATE_PEER_ERRORS") {
            Ok(raw) => match raw.to_lowercase().as_str() {
                "1" | "true" => true,
                "0" | "false" => false,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "PROPAGATE_PEER_ERRORS".to_string(),
                        format!("'{}' is not a boolean", raw),
                    ));
                }
            },
            Err(_) => false,
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            host,
            port,
            port_retry_limit,
            agent_id,
            api_key,
            convai_url,
            propagate_peer_errors,
            log_level,
        })
    }

    /// Returns the credential pair, or `None` when either half is missing
    /// and every inbound connection must be rejected.
    pub fn agent_credentials(&self) -> Option<AgentCredentials<'_>> {
        match (self.agent_id.as_deref(), self.api_key.as_ref()) {
            (Some(agent_id), Some(api_key)) => Some(AgentCredentials { agent_id, api_key }),
            _ => None,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
