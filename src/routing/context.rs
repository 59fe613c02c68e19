//! Per-call routing inputs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A candidate backend instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

impl Server {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Error returned when a `host:port` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid server address '{0}', expected host:port")]
pub struct ServerParseError(pub String);

impl FromStr for Server {
    type Err = ServerParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s.rsplit_once(':').ok_or_else(|| ServerParseError(s.to_string()))?;
        let port = port.parse().map_err(|_| ServerParseError(s.to_string()))?;
        if host.is_empty() {
            return Err(ServerParseError(s.to_string()));
        }
        Ok(Server::new(host, port))
    }
}

/// Everything one routing decision looks at.
///
/// Built by the calling layer for each outbound call; the debug override
/// travels here explicitly instead of through ambient per-request state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Target service identifier.
    pub service_id: String,
    /// Per-call debug host override.
    pub debug_server_ip: Option<String>,
    /// Requesting host asked for local-debug routing.
    pub local_debug: bool,
    pub client_ip: Option<String>,
    pub client_user_id: Option<String>,
    /// Instances currently known to the fallback balancer.
    pub candidates: Vec<Server>,
}

impl RequestContext {
    pub fn new(service_id: impl Into<String>, candidates: Vec<Server>) -> Self {
        Self {
            service_id: service_id.into(),
            candidates,
            ..Default::default()
        }
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.client_user_id = Some(user_id.into());
        self
    }

    pub fn with_debug_server(mut self, ip: impl Into<String>) -> Self {
        self.debug_server_ip = Some(ip.into());
        self
    }

    pub fn with_local_debug(mut self, enabled: bool) -> Self {
        self.local_debug = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_parse() {
        let s: Server = "10.0.0.1:8080".parse().unwrap();
        assert_eq!(s, Server::new("10.0.0.1", 8080));
        assert_eq!(s.to_string(), "10.0.0.1:8080");

        assert!("10.0.0.1".parse::<Server>().is_err());
        assert!(":80".parse::<Server>().is_err());
        assert!("host:99999".parse::<Server>().is_err());
    }
}
