//! Daemon configuration, read from flags or the environment.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use ipw_core::{
    ConfigError, PolicyConfig, ReplicationSettings, StageFlags, WebhookConfig,
    DEFAULT_ENGINE_ENDPOINT,
};

/// IPW daemon CLI
#[derive(Debug, Clone, Parser)]
#[command(name = "ipwd")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Image policy webhook daemon", long_about = None)]
pub struct Cli {
    /// Listen port
    #[arg(long, env = "PORT")]
    pub port: u16,

    /// Comma-separated whitelisted registries
    #[arg(long, env = "WHITE_LIST")]
    pub whitelist: String,

    /// Comma-separated namespaces that bypass validation
    #[arg(long, env = "EXCLUDE_NAMESPACES", default_value = "")]
    pub exclude_namespaces: String,

    /// Mirror rejected images into the private registry
    #[arg(
        long,
        env = "REPLICATOR_ON",
        default_value_t = false,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub replicator_on: bool,

    /// Link the scan stage
    #[arg(
        long,
        env = "SCANNER_ON",
        default_value_t = false,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub scanner_on: bool,

    /// Private registry host
    #[arg(long, env = "PRIVATE_REGISTRY_HOST")]
    pub private_registry_host: Option<String>,

    /// Namespace inside the private registry
    #[arg(long, env = "PRIVATE_REGISTRY_NAMESPACE")]
    pub private_registry_namespace: Option<String>,

    /// Private registry user
    #[arg(long, env = "PRIVATE_REGISTRY_USERNAME")]
    pub private_registry_username: Option<String>,

    /// Private registry password
    #[arg(long, env = "PRIVATE_REGISTRY_PASSWORD", hide_env_values = true)]
    pub private_registry_password: Option<String>,

    /// Image engine endpoint
    #[arg(long, env = "APP_DOCKER_HOST", default_value = DEFAULT_ENGINE_ENDPOINT)]
    pub docker_host: String,

    /// Bound in seconds on each pull or push
    #[arg(long, env = "REPLICATOR_TIMEOUT_SECS")]
    pub replicator_timeout_secs: Option<u64>,

    /// Human-readable debug logs; `false` switches to JSON at info
    #[arg(
        long,
        env = "DEBUG",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub debug: bool,
}

impl Cli {
    /// Address the HTTP server binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    /// Resolve the flags into a validated [`WebhookConfig`].
    ///
    /// Replication settings are only read when the replicator is on.
    pub fn webhook_config(&self) -> Result<WebhookConfig, ConfigError> {
        let policy = PolicyConfig::from_lists(&self.whitelist, &self.exclude_namespaces);

        let replication = if self.replicator_on {
            let target = ReplicationSettings {
                host: self.private_registry_host.clone(),
                namespace: self.private_registry_namespace.clone(),
                username: self.private_registry_username.clone(),
                password: self.private_registry_password.clone(),
                engine_endpoint: Some(self.docker_host.clone()),
                timeout_secs: self.replicator_timeout_secs,
            }
            .resolve()?;
            Some(Arc::new(target))
        } else {
            None
        };

        let config = WebhookConfig {
            policy: Arc::new(policy),
            replication,
            stages: StageFlags {
                replicate: self.replicator_on,
                scan: self.scanner_on,
            },
        };
        config.validate()?;
        Ok(config)
    }
}
