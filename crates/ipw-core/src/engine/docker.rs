//! Docker Engine implementation of [`ImageEngine`] backed by `bollard`.

use std::sync::Arc;

use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::image::{CreateImageOptions, PushImageOptions, RemoveImageOptions, TagImageOptions};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::StreamExt;
use tracing::debug;

use super::{EngineConnector, EngineError, EngineResult, ImageEngine, RegistryAuth};
use crate::config::ReplicationTarget;

/// Connects to the Docker daemon named by the target's engine endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerConnector;

impl EngineConnector for DockerConnector {
    fn connect(&self, target: &ReplicationTarget) -> EngineResult<Arc<dyn ImageEngine>> {
        let engine = DockerEngine::connect(&target.engine_endpoint, target.call_timeout.as_secs())?;
        Ok(Arc::new(engine))
    }
}

/// A Docker daemon client.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect to `endpoint`: `unix:///path`, `tcp://host:port` or `http://host:port`.
    pub fn connect(endpoint: &str, timeout_secs: u64) -> EngineResult<Self> {
        let docker = if let Some(path) = endpoint.strip_prefix("unix://") {
            Docker::connect_with_unix(path, timeout_secs, API_DEFAULT_VERSION)
        } else if endpoint.starts_with("tcp://") || endpoint.starts_with("http://") {
            Docker::connect_with_http(endpoint, timeout_secs, API_DEFAULT_VERSION)
        } else {
            return Err(EngineError::Connect(format!(
                "unsupported engine endpoint: {endpoint}"
            )));
        }
        .map_err(|e| EngineError::Connect(e.to_string()))?;

        Ok(Self { docker })
    }
}

/// Split `repo[:tag]` at the tag separator, ignoring colons in a registry port.
fn split_repo_tag(reference: &str) -> (&str, &str) {
    let name_start = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
    match reference[name_start..].rfind(':') {
        Some(i) => (
            &reference[..name_start + i],
            &reference[name_start + i + 1..],
        ),
        None => (reference, "latest"),
    }
}

/// `create_image` options for `image`.
///
/// A name-only reference pulls `latest`; an empty tag would make the daemon
/// pull every tag of the repository. Digest references go through whole.
fn pull_options(image: &str) -> CreateImageOptions<String> {
    if image.contains('@') {
        return CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
    }
    let (repo, tag) = split_repo_tag(image);
    CreateImageOptions {
        from_image: repo.to_string(),
        tag: tag.to_string(),
        ..Default::default()
    }
}

#[async_trait]
impl ImageEngine for DockerEngine {
    async fn pull(&self, image: &str) -> EngineResult<()> {
        let options = pull_options(image);
        let stream = self.docker.create_image(Some(options), None, None);
        futures::pin_mut!(stream);

        while let Some(progress) = stream.next().await {
            let info = progress.map_err(|e| EngineError::Pull {
                image: image.to_string(),
                reason: e.to_string(),
            })?;
            if let Some(reason) = info.error {
                return Err(EngineError::Pull {
                    image: image.to_string(),
                    reason,
                });
            }
            if let Some(status) = info.status {
                debug!(image = %image, status = %status, "pull progress");
            }
        }
        Ok(())
    }

    async fn tag(&self, from: &str, to: &str) -> EngineResult<()> {
        let (repo, tag) = split_repo_tag(to);
        let options = TagImageOptions {
            repo: repo.to_string(),
            tag: tag.to_string(),
        };
        self.docker
            .tag_image(from, Some(options))
            .await
            .map_err(|e| EngineError::Tag {
                from: from.to_string(),
                to: to.to_string(),
                reason: e.to_string(),
            })
    }

    async fn push(&self, image: &str, auth_token: &str) -> EngineResult<()> {
        let auth = RegistryAuth::decode(auth_token)?;
        let credentials = DockerCredentials {
            username: Some(auth.username),
            password: Some(auth.password),
            serveraddress: Some(auth.serveraddress).filter(|s| !s.is_empty()),
            ..Default::default()
        };

        let (repo, tag) = split_repo_tag(image);
        let options = PushImageOptions {
            tag: tag.to_string(),
        };
        let stream = self.docker.push_image(repo, Some(options), Some(credentials));
        futures::pin_mut!(stream);

        while let Some(progress) = stream.next().await {
            let info = progress.map_err(|e| EngineError::Push {
                image: image.to_string(),
                reason: e.to_string(),
            })?;
            if let Some(reason) = info.error {
                return Err(EngineError::Push {
                    image: image.to_string(),
                    reason,
                });
            }
            if let Some(status) = info.status {
                debug!(image = %image, status = %status, "push progress");
            }
        }
        Ok(())
    }

    async fn remove(&self, image: &str) -> EngineResult<()> {
        self.docker
            .remove_image(image, None::<RemoveImageOptions>, None)
            .await
            .map(|_| ())
            .map_err(|e| EngineError::Remove {
                image: image.to_string(),
                reason: e.to_string(),
            })
    }
}
