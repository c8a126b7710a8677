use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use tokio_native_tls::TlsConnector as TokioTlsConnector;
use tracing::{info, warn};
use trust_dns_resolver::{
    TokioAsyncResolver,
    config::{NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts},
};

use super::model::{ServiceConfig, ServiceSecret};
use crate::errors::ConfigError;

/// Immutable configuration snapshot, built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub secret: ServiceSecret,
    pub listen: SocketAddr,
    pub dns_hosts: Vec<IpAddr>,
}

impl AppConfig {
    /// Assemble the snapshot from the parsed file plus environment overrides.
    pub fn from_parts(
        service: ServiceConfig,
        env_secret: Option<String>,
        dns_hosts: &str,
    ) -> Result<Self, ConfigError> {
        let secret = env_secret
            .map(ServiceSecret::new)
            .filter(|s| !s.is_empty())
            .or_else(|| service.service_secret.clone())
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSecret)?;

        let listen = service
            .listen
            .parse()
            .map_err(|_| ConfigError::InvalidListen(service.listen.clone()))?;

        let dns_hosts = dns_hosts
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<IpAddr>()
                    .map_err(|_| ConfigError::InvalidDnsHost(s.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            service,
            secret,
            listen,
            dns_hosts,
        })
    }
}

/// Load the application configuration from a YAML file and environment variables.
/// The file named by `CONFIG_FILE` (default `config.yml`) is optional; the
/// service secret may come from `SERVICE_SECRET` instead. DNS hosts used by
/// dns probes come from `DNS_HOSTS`.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let config_file_location =
        PathBuf::from(env::var("CONFIG_FILE").unwrap_or_else(|_| "config.yml".to_string()));

    let service = match std::fs::read_to_string(&config_file_location) {
        Ok(config_str) => {
            info!(path = %config_file_location.display(), "loaded configuration file");
            serde_yaml::from_str(&config_str).map_err(|source| ConfigError::Parse {
                path: config_file_location.clone(),
                source,
            })?
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %config_file_location.display(), "configuration file not found, using defaults");
            ServiceConfig::default()
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: config_file_location,
                source,
            });
        }
    };

    let dns_hosts = env::var("DNS_HOSTS").unwrap_or_else(|_| "1.1.1.1,8.8.8.8".to_string());
    let config = AppConfig::from_parts(service, env::var("SERVICE_SECRET").ok(), &dns_hosts)?;

    info!(
        listen = %config.listen,
        dns_hosts = ?config.dns_hosts,
        auth_schemes = ?config.service.auth_schemes,
        "configuration in effect"
    );
    Ok(config)
}

/// Setup a TLS connector that accepts invalid certificates
pub fn setup_tls_connector() -> Result<TokioTlsConnector, native_tls::Error> {
    let mut builder = native_tls::TlsConnector::builder();
    builder.danger_accept_invalid_certs(true);
    let connector = builder.build()?;
    Ok(TokioTlsConnector::from(connector))
}

/// Setup a DNS resolver for a single probe.
/// Caching is disabled so that every probe performs (and times) its own
/// lookup; two attempts share the probe's time budget.
pub fn setup_resolver(dns_hosts: &[IpAddr], timeout: Duration) -> TokioAsyncResolver {
    let mut opts = ResolverOpts::default();
    opts.attempts = 2;
    opts.timeout = timeout / 2;
    opts.cache_size = 0;

    let mut name_servers = NameServerConfigGroup::new();

    for ip in dns_hosts {
        name_servers.push(NameServerConfig {
            socket_addr: (*ip, 53).into(),
            protocol: Protocol::Tcp,
            tls_dns_name: None,
            trust_negative_responses: false,
            bind_addr: None,
        });
    }

    let resolver_config = ResolverConfig::from_parts(None, vec![], name_servers);
    TokioAsyncResolver::tokio(resolver_config, opts)
}
