//! In-memory fakes for the engine traits (testing only)
//!
//! `MemoryImageEngine` records every call and fails the operations it was
//! told to fail; `MemoryConnector` hands it out; `UnreachableConnector`
//! simulates a daemon that cannot be reached.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{EngineConnector, EngineError, EngineResult, ImageEngine};
use crate::config::ReplicationTarget;

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Pull(String),
    Tag { from: String, to: String },
    Push { image: String, auth_token: String },
    Remove(String),
}

#[derive(Debug, Default)]
struct Script {
    failing_pulls: HashSet<String>,
    failing_tags: HashSet<String>,
    failing_pushes: HashSet<String>,
    failing_removes: HashSet<String>,
    hanging_pulls: HashSet<String>,
}

/// Scriptable in-memory engine.
///
/// Failures are keyed by the image argument of the call: the source image
/// for pull, tag and remove, the destination for push.
#[derive(Debug, Default)]
pub struct MemoryImageEngine {
    script: Mutex<Script>,
    calls: Mutex<Vec<EngineCall>>,
}

impl MemoryImageEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_pull(self, image: &str) -> Self {
        self.script.lock().unwrap().failing_pulls.insert(image.to_string());
        self
    }

    pub fn fail_tag(self, image: &str) -> Self {
        self.script.lock().unwrap().failing_tags.insert(image.to_string());
        self
    }

    pub fn fail_push(self, destination: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .failing_pushes
            .insert(destination.to_string());
        self
    }

    pub fn fail_remove(self, image: &str) -> Self {
        self.script.lock().unwrap().failing_removes.insert(image.to_string());
        self
    }

    /// Make pulls of `image` never complete.
    pub fn hang_pull(self, image: &str) -> Self {
        self.script.lock().unwrap().hanging_pulls.insert(image.to_string());
        self
    }

    /// All calls in the order they were made.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pulls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Pull(image) => Some(image),
                _ => None,
            })
            .collect()
    }

    pub fn pushes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Push { image, .. } => Some(image),
                _ => None,
            })
            .collect()
    }

    pub fn removes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Remove(image) => Some(image),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ImageEngine for MemoryImageEngine {
    async fn pull(&self, image: &str) -> EngineResult<()> {
        self.record(EngineCall::Pull(image.to_string()));
        let (hang, fail) = {
            let script = self.script.lock().unwrap();
            (
                script.hanging_pulls.contains(image),
                script.failing_pulls.contains(image),
            )
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(EngineError::Pull {
                image: image.to_string(),
                reason: "manifest unknown".to_string(),
            });
        }
        Ok(())
    }

    async fn tag(&self, from: &str, to: &str) -> EngineResult<()> {
        self.record(EngineCall::Tag {
            from: from.to_string(),
            to: to.to_string(),
        });
        if self.script.lock().unwrap().failing_tags.contains(from) {
            return Err(EngineError::Tag {
                from: from.to_string(),
                to: to.to_string(),
                reason: "no such image".to_string(),
            });
        }
        Ok(())
    }

    async fn push(&self, image: &str, auth_token: &str) -> EngineResult<()> {
        self.record(EngineCall::Push {
            image: image.to_string(),
            auth_token: auth_token.to_string(),
        });
        if self.script.lock().unwrap().failing_pushes.contains(image) {
            return Err(EngineError::Push {
                image: image.to_string(),
                reason: "denied: requested access to the resource is denied".to_string(),
            });
        }
        Ok(())
    }

    async fn remove(&self, image: &str) -> EngineResult<()> {
        self.record(EngineCall::Remove(image.to_string()));
        if self.script.lock().unwrap().failing_removes.contains(image) {
            return Err(EngineError::Remove {
                image: image.to_string(),
                reason: "image is being used by running container".to_string(),
            });
        }
        Ok(())
    }
}

/// Connector that always returns the same shared [`MemoryImageEngine`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    engine: Arc<MemoryImageEngine>,
}

impl MemoryConnector {
    pub fn new(engine: Arc<MemoryImageEngine>) -> Self {
        Self { engine }
    }
}

impl EngineConnector for MemoryConnector {
    fn connect(&self, _target: &ReplicationTarget) -> EngineResult<Arc<dyn ImageEngine>> {
        Ok(self.engine.clone())
    }
}

/// Connector whose daemon can never be reached.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnreachableConnector;

impl EngineConnector for UnreachableConnector {
    fn connect(&self, target: &ReplicationTarget) -> EngineResult<Arc<dyn ImageEngine>> {
        Err(EngineError::Connect(format!(
            "Cannot connect to the Docker daemon at {}",
            target.engine_endpoint
        )))
    }
}
