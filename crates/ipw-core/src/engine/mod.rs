//! Image engine abstraction used by the replicate stage.
//!
//! The replicate stage only needs four operations from a container engine:
//! pull, tag, push and remove. They are expressed as the [`ImageEngine`]
//! trait so the workflow can run against the Docker daemon ([`docker`]) or
//! against the in-memory fake in [`fakes`].
//!
//! - [`ImageEngine`]     — per-image operations
//! - [`EngineConnector`] — builds an engine client for a replication target
//! - [`RegistryAuth`]    — registry credentials and their wire token
//! - [`EngineError`]     — distinguishable failure per operation kind

pub mod docker;
pub mod fakes;

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::config::ReplicationTarget;

pub use docker::{DockerConnector, DockerEngine};

/// Errors returned by image engine operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("cannot connect to image engine: {0}")]
    Connect(String),

    #[error("image pull error for {image}: {reason}")]
    Pull { image: String, reason: String },

    #[error("error tagging {from} as {to}: {reason}")]
    Tag {
        from: String,
        to: String,
        reason: String,
    },

    #[error("error pushing {image}: {reason}")]
    Push { image: String, reason: String },

    #[error("error removing {image}: {reason}")]
    Remove { image: String, reason: String },

    #[error("{operation} of {image} timed out after {secs}s")]
    Timeout {
        operation: &'static str,
        image: String,
        secs: u64,
    },

    #[error("registry auth error: {0}")]
    Auth(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Container engine operations needed for replication.
#[async_trait]
pub trait ImageEngine: Send + Sync {
    /// Pull `image` into the local engine store.
    async fn pull(&self, image: &str) -> EngineResult<()>;

    /// Add the reference `to` to the local image `from`.
    async fn tag(&self, from: &str, to: &str) -> EngineResult<()>;

    /// Push `image` using a base64 registry auth token (see [`RegistryAuth::encode`]).
    async fn push(&self, image: &str, auth_token: &str) -> EngineResult<()>;

    /// Remove the local image `image`.
    async fn remove(&self, image: &str) -> EngineResult<()>;
}

/// Produces an engine client for a replication target.
///
/// Called once per replicate invocation; a failure here is the only
/// replication error that aborts the request.
pub trait EngineConnector: Send + Sync {
    fn connect(&self, target: &ReplicationTarget) -> EngineResult<Arc<dyn ImageEngine>>;
}

/// Registry credentials in the engine's auth-config JSON shape.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub serveraddress: String,
}

impl std::fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("serveraddress", &self.serveraddress)
            .finish()
    }
}

impl RegistryAuth {
    pub fn for_target(target: &ReplicationTarget) -> Self {
        Self {
            username: target.username.clone(),
            password: target.password.clone(),
            serveraddress: target.host.clone(),
        }
    }

    /// Encode as URL-safe base64 JSON, the `X-Registry-Auth` header format.
    pub fn encode(&self) -> EngineResult<String> {
        let json = serde_json::to_vec(self).map_err(|e| EngineError::Auth(e.to_string()))?;
        Ok(URL_SAFE.encode(json))
    }

    /// Inverse of [`RegistryAuth::encode`].
    pub fn decode(token: &str) -> EngineResult<Self> {
        let json = URL_SAFE
            .decode(token)
            .map_err(|e| EngineError::Auth(e.to_string()))?;
        serde_json::from_slice(&json).map_err(|e| EngineError::Auth(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_token_is_base64_json() {
        let auth = RegistryAuth {
            username: "robot".into(),
            password: "p@ss/word?".into(),
            serveraddress: "registry.internal".into(),
        };
        let token = auth.encode().unwrap();
        assert!(!token.contains('+') && !token.contains('/'));

        let json = URL_SAFE.decode(&token).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["username"], "robot");
        assert_eq!(value["password"], "p@ss/word?");
        assert_eq!(value["serveraddress"], "registry.internal");

        assert_eq!(RegistryAuth::decode(&token).unwrap(), auth);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            RegistryAuth::decode("%%%not-base64"),
            Err(EngineError::Auth(_))
        ));
    }

    #[test]
    fn test_debug_redacts_password() {
        let auth = RegistryAuth {
            username: "robot".into(),
            password: "hunter2".into(),
            serveraddress: String::new(),
        };
        assert!(!format!("{auth:?}").contains("hunter2"));
    }
}
