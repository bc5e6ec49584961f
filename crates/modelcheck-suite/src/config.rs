use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Result};
use modelcheck_client::PollPolicy;

/// Deployment layout the suite runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Services on `HOSTNAME` with their default ports, or behind the gateway
    /// when one is configured.
    #[default]
    Localhost,
    /// Everything through `API_GATEWAY_URL`, which must be set.
    ApiGateway,
    /// Direct service ports on `HOSTNAME` even if a gateway is configured.
    Internal,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "localhost" => Ok(Mode::Localhost),
            "api-gateway" => Ok(Mode::ApiGateway),
            "internal" => Ok(Mode::Internal),
            other => bail!("unknown mode '{other}', expected localhost, api-gateway or internal"),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Localhost => "localhost",
            Mode::ApiGateway => "api-gateway",
            Mode::Internal => "internal",
        })
    }
}

pub const PUBLIC_PORT: u16 = 8083;
pub const PRIVATE_PORT: u16 = 3083;
pub const MGMT_PORT: u16 = 8084;

/// Base URLs of the three services the suite talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hosts {
    pub public: String,
    pub private: String,
    pub mgmt: String,
}

impl Hosts {
    pub fn resolve(
        mode: Mode,
        protocol: &str,
        gateway: Option<&str>,
        hostname: &str,
    ) -> Result<Self> {
        let gateway = gateway.filter(|g| !g.is_empty());
        match (mode, gateway) {
            (Mode::ApiGateway, None) => bail!("mode api-gateway requires API_GATEWAY_URL"),
            (Mode::ApiGateway | Mode::Localhost, Some(gw)) => {
                let base = format!("{protocol}://{gw}");
                Ok(Self {
                    public: base.clone(),
                    private: base.clone(),
                    mgmt: base,
                })
            }
            _ => Ok(Self {
                public: format!("http://{hostname}:{PUBLIC_PORT}"),
                private: format!("http://{hostname}:{PRIVATE_PORT}"),
                mgmt: format!("http://{hostname}:{MGMT_PORT}"),
            }),
        }
    }
}

/// Everything a suite run needs besides the backend itself.
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    /// Root holding `integration-test/data`.
    pub fixtures_root: PathBuf,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub remote_timeout: Duration,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            fixtures_root: PathBuf::from("."),
            poll_interval: PollPolicy::DEFAULT_INTERVAL,
            poll_timeout: PollPolicy::LOCAL_TIMEOUT,
            remote_timeout: PollPolicy::REMOTE_TIMEOUT,
        }
    }
}

impl SuiteConfig {
    pub fn local_policy(&self) -> PollPolicy {
        PollPolicy::new(self.poll_interval, self.poll_timeout)
    }

    pub fn remote_policy(&self) -> PollPolicy {
        PollPolicy::new(self.poll_interval, self.remote_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hosts_without_gateway() {
        let hosts = Hosts::resolve(Mode::Localhost, "http", None, "localhost").unwrap();
        assert_eq!(hosts.public, "http://localhost:8083");
        assert_eq!(hosts.private, "http://localhost:3083");
        assert_eq!(hosts.mgmt, "http://localhost:8084");
    }

    #[test]
    fn test_hosts_with_gateway() {
        let hosts =
            Hosts::resolve(Mode::Localhost, "https", Some("api.example.com"), "localhost").unwrap();
        assert_eq!(hosts.public, "https://api.example.com");
        assert_eq!(hosts.private, hosts.public);
        assert_eq!(hosts.mgmt, hosts.public);

        let hosts =
            Hosts::resolve(Mode::Internal, "https", Some("api.example.com"), "backend").unwrap();
        assert_eq!(hosts.public, "http://backend:8083");

        assert!(Hosts::resolve(Mode::ApiGateway, "http", None, "localhost").is_err());
        assert!(Hosts::resolve(Mode::ApiGateway, "http", Some(""), "localhost").is_err());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("api-gateway".parse::<Mode>().unwrap(), Mode::ApiGateway);
        assert_eq!("".parse::<Mode>().unwrap(), Mode::Localhost);
        assert!("cloud".parse::<Mode>().is_err());
        assert_eq!(Mode::Internal.to_string(), "internal");
    }

    #[test]
    fn test_policies() {
        let config = SuiteConfig::default();
        assert_eq!(config.local_policy().timeout, Duration::from_millis(120_000));
        assert_eq!(config.remote_policy().timeout, Duration::from_millis(3_600_000));
        assert_eq!(config.local_policy().interval, Duration::from_secs(1));
    }
}
