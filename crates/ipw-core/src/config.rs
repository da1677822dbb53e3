//! Webhook configuration.
//!
//! Configuration is resolved once at startup into a [`WebhookConfig`] and
//! shared read-only (behind an `Arc`) by every request. Nothing in the
//! pipeline mutates it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default image engine endpoint.
pub const DEFAULT_ENGINE_ENDPOINT: &str = "unix:///var/run/docker.sock";

/// Default bound on a single pull or push call.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 300;

/// Registry whitelist and namespace exclusions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub whitelist: HashSet<String>,
    pub excluded_namespaces: HashSet<String>,
}

impl PolicyConfig {
    /// Build from the raw comma-separated lists (`WHITE_LIST`, `EXCLUDE_NAMESPACES`).
    pub fn from_lists(whitelist: &str, excluded_namespaces: &str) -> Self {
        Self {
            whitelist: parse_list(whitelist).into_iter().collect(),
            excluded_namespaces: parse_list(excluded_namespaces).into_iter().collect(),
        }
    }

    /// Add a whitelisted registry (builder pattern).
    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.whitelist.insert(registry.into());
        self
    }

    /// Add an excluded namespace (builder pattern).
    pub fn with_excluded_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.excluded_namespaces.insert(namespace.into());
        self
    }
}

/// Private registry that rejected images are mirrored into.
///
/// Holds the registry password, so it is neither serializable nor printed
/// in full by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ReplicationTarget {
    /// Registry host, also used as the "already mirrored" prefix.
    pub host: String,
    /// Namespace (project) inside the private registry.
    pub namespace: String,
    pub username: String,
    pub password: String,
    /// Image engine endpoint (`unix://`, `tcp://` or `http://`).
    pub engine_endpoint: String,
    /// Bound on each pull/push call.
    pub call_timeout: Duration,
}

impl std::fmt::Debug for ReplicationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationTarget")
            .field("host", &self.host)
            .field("namespace", &self.namespace)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("engine_endpoint", &self.engine_endpoint)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

/// Raw replication settings as read from the environment.
#[derive(Debug, Clone, Default)]
pub struct ReplicationSettings {
    pub host: Option<String>,
    pub namespace: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub engine_endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl ReplicationSettings {
    /// Resolve into a [`ReplicationTarget`].
    ///
    /// Every registry setting is required; values are cleaned of spaces,
    /// commas and double quotes. A missing or empty engine endpoint falls
    /// back to [`DEFAULT_ENGINE_ENDPOINT`].
    pub fn resolve(self) -> Result<ReplicationTarget, ConfigError> {
        let mut missing = Vec::new();
        let mut take = |value: Option<String>, var: &str| match value {
            Some(v) => clean_env_value(&v),
            None => {
                missing.push(var.to_string());
                String::new()
            }
        };

        let username = take(self.username, "PRIVATE_REGISTRY_USERNAME");
        let password = take(self.password, "PRIVATE_REGISTRY_PASSWORD");
        let namespace = take(self.namespace, "PRIVATE_REGISTRY_NAMESPACE");
        let host = take(self.host, "PRIVATE_REGISTRY_HOST");

        if !missing.is_empty() {
            return Err(ConfigError::MissingReplicationSettings { missing });
        }

        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_CALL_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(timeout_secs));
        }

        let engine_endpoint = self
            .engine_endpoint
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENGINE_ENDPOINT.to_string());

        Ok(ReplicationTarget {
            host,
            namespace,
            username,
            password,
            engine_endpoint,
            call_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Which optional stages are linked after validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFlags {
    pub replicate: bool,
    pub scan: bool,
}

/// Complete, immutable webhook configuration.
#[derive(Debug, Clone, Default)]
pub struct WebhookConfig {
    pub policy: Arc<PolicyConfig>,
    pub replication: Option<Arc<ReplicationTarget>>,
    pub stages: StageFlags,
}

impl WebhookConfig {
    /// Configuration with only the validation stage.
    pub fn validate_only(policy: PolicyConfig) -> Self {
        Self {
            policy: Arc::new(policy),
            replication: None,
            stages: StageFlags::default(),
        }
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.replicate && self.replication.is_none() {
            return Err(ConfigError::ReplicationTargetAbsent);
        }
        Ok(())
    }
}

/// Split a comma list, removing all whitespace and dropping empty entries.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Strip spaces, commas and double quotes from a single setting value.
pub fn clean_env_value(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ' ' | ',' | '"'))
        .collect()
}
