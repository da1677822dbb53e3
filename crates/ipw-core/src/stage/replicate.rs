//! Replication stage: mirrors rejected images into the private registry.
//!
//! For every container image not already served from the private registry
//! host the stage runs pull → tag → push, concurrently across images, then
//! removes every local copy it pulled. Per-image failures are counted and
//! never abort the remaining images; only an unreachable engine is fatal.
//!
//! The stage never changes `status.allowed`. It only acts on reviews that
//! validation already denied, and a successful mirror does not turn the
//! denial into an admission. Whether replication should instead admit the
//! workload once mirrored is unresolved, so the observed behavior is kept.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::{forward, Stage, StageKind};
use crate::config::ReplicationTarget;
use crate::engine::{EngineConnector, EngineError, EngineResult, ImageEngine, RegistryAuth};
use crate::error::{StageError, StageResult};
use crate::image_ref::ImageReference;
use crate::metrics::METRICS;
use crate::obs::emit_replication_finished;
use crate::review::ImageReview;

/// Reason written when the registry credentials cannot be encoded.
pub const AUTH_ERROR_REASON: &str = "error:replication:auth";

/// Prefix of the audit annotations carrying the report counts.
pub const ANNOTATION_PREFIX: &str = "replication.ipw";

/// Engine operation kinds, in workflow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Pull,
    Tag,
    Push,
    Remove,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Pull => "pull",
            Operation::Tag => "tag",
            Operation::Push => "push",
            Operation::Remove => "remove",
        }
    }
}

/// Success and failure counts for each operation kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationReport {
    pub pulled: usize,
    pub tagged: usize,
    pub pushed: usize,
    pub removed: usize,
    pub pull_failures: usize,
    pub tag_failures: usize,
    pub push_failures: usize,
    pub remove_failures: usize,
}

impl ReplicationReport {
    /// Successful count for `operation`.
    pub fn succeeded(&self, operation: Operation) -> usize {
        match operation {
            Operation::Pull => self.pulled,
            Operation::Tag => self.tagged,
            Operation::Push => self.pushed,
            Operation::Remove => self.removed,
        }
    }

    /// Failed count for `operation`.
    pub fn failed(&self, operation: Operation) -> usize {
        match operation {
            Operation::Pull => self.pull_failures,
            Operation::Tag => self.tag_failures,
            Operation::Push => self.push_failures,
            Operation::Remove => self.remove_failures,
        }
    }

    /// Failures of the mirroring itself. Cleanup failures are excluded.
    pub fn replication_failures(&self) -> usize {
        self.pull_failures + self.tag_failures + self.push_failures
    }

    /// True when no pull, tag or push failed.
    pub fn is_success(&self) -> bool {
        self.replication_failures() == 0
    }

    /// The `status.reason` summary.
    ///
    /// `<success|error>:replication:pull:<pulled>,push:<pushed>;failed:pull:<n>,tag:<n>,push:<n>,remove:<n>`
    pub fn reason(&self) -> String {
        let status = if self.is_success() { "success" } else { "error" };
        format!(
            "{status}:replication:pull:{},push:{};failed:pull:{},tag:{},push:{},remove:{}",
            self.pulled,
            self.pushed,
            self.pull_failures,
            self.tag_failures,
            self.push_failures,
            self.remove_failures,
        )
    }

    /// Counts as audit annotations, e.g. `replication.ipw/pull-failed`.
    pub fn audit_annotations(&self) -> BTreeMap<String, String> {
        let mut annotations = BTreeMap::new();
        for op in [
            Operation::Pull,
            Operation::Tag,
            Operation::Push,
            Operation::Remove,
        ] {
            annotations.insert(
                format!("{ANNOTATION_PREFIX}/{}-ok", op.name()),
                self.succeeded(op).to_string(),
            );
            annotations.insert(
                format!("{ANNOTATION_PREFIX}/{}-failed", op.name()),
                self.failed(op).to_string(),
            );
        }
        annotations
    }

    fn absorb(&mut self, outcome: &ImageOutcome) {
        self.pulled += usize::from(outcome.pulled);
        self.tagged += usize::from(outcome.tagged);
        self.pushed += usize::from(outcome.pushed);
        match outcome.failed {
            Some(Operation::Pull) => self.pull_failures += 1,
            Some(Operation::Tag) => self.tag_failures += 1,
            Some(Operation::Push) => self.push_failures += 1,
            Some(Operation::Remove) => self.remove_failures += 1,
            None => {}
        }
    }
}

/// Result of the pull → tag → push sequence for one image.
#[derive(Debug)]
struct ImageOutcome {
    source: String,
    pulled: bool,
    tagged: bool,
    pushed: bool,
    failed: Option<Operation>,
}

impl ImageOutcome {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            pulled: false,
            tagged: false,
            pushed: false,
            failed: None,
        }
    }

    fn fail(mut self, operation: Operation, err: &EngineError) -> Self {
        error!(
            image = %self.source,
            operation = operation.name(),
            error = %err,
            "replication step failed"
        );
        self.failed = Some(operation);
        self
    }
}

/// Run `call`, failing with [`EngineError::Timeout`] once `limit` elapses.
async fn bounded<F>(
    operation: Operation,
    image: &str,
    limit: Duration,
    call: F,
) -> EngineResult<()>
where
    F: Future<Output = EngineResult<()>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout {
            operation: operation.name(),
            image: image.to_string(),
            secs: limit.as_secs(),
        }),
    }
}

/// Mirrors denied images into the configured private registry.
pub struct ReplicateStage {
    target: Arc<ReplicationTarget>,
    connector: Arc<dyn EngineConnector>,
    next: Option<Box<dyn Stage>>,
}

impl ReplicateStage {
    pub fn new(target: Arc<ReplicationTarget>, connector: Arc<dyn EngineConnector>) -> Self {
        Self {
            target,
            connector,
            next: None,
        }
    }

    /// `<host>/<namespace>/<image>:<tag>` for a source image.
    pub fn destination_for(&self, source: &str) -> Result<String, EngineError> {
        let tag_error = |reason: String| EngineError::Tag {
            from: source.to_string(),
            to: String::new(),
            reason,
        };
        let reference = ImageReference::parse(source).map_err(|e| tag_error(e.to_string()))?;
        let tag = reference
            .tag
            .as_deref()
            .ok_or_else(|| tag_error("digest references cannot be retagged".to_string()))?;
        Ok(format!(
            "{}/{}/{}:{}",
            self.target.host, self.target.namespace, reference.image, tag
        ))
    }

    /// Replicate a whole review, returning the aggregated report.
    ///
    /// Fails only when no engine client can be created.
    pub async fn replicate(
        &self,
        review: &ImageReview,
        auth_token: &str,
    ) -> StageResult<ReplicationReport> {
        let engine = self
            .connector
            .connect(&self.target)
            .map_err(StageError::EngineUnavailable)?;

        let sources: Vec<&str> = review
            .images()
            .filter(|image| !image.starts_with(self.target.host.as_str()))
            .collect();

        let outcomes = join_all(
            sources
                .iter()
                .map(|source| self.replicate_image(engine.as_ref(), source, auth_token)),
        )
        .await;

        let mut report = ReplicationReport::default();
        for outcome in &outcomes {
            report.absorb(outcome);
        }

        for outcome in outcomes.iter().filter(|o| o.pulled) {
            match engine.remove(&outcome.source).await {
                Ok(()) => {
                    report.removed += 1;
                    info!(image = %outcome.source, "removed successfully");
                }
                Err(err) => {
                    report.remove_failures += 1;
                    error!(image = %outcome.source, error = %err, "Error removing image");
                }
            }
        }

        Ok(report)
    }

    async fn replicate_image(
        &self,
        engine: &dyn ImageEngine,
        source: &str,
        auth_token: &str,
    ) -> ImageOutcome {
        let limit = self.target.call_timeout;
        let mut outcome = ImageOutcome::new(source);

        info!(image = %source, "Trying pull");
        if let Err(err) = bounded(Operation::Pull, source, limit, engine.pull(source)).await {
            return outcome.fail(Operation::Pull, &err);
        }
        outcome.pulled = true;
        info!(image = %source, "pulled successfully");

        let destination = match self.destination_for(source) {
            Ok(d) => d,
            Err(err) => return outcome.fail(Operation::Tag, &err),
        };
        if let Err(err) = engine.tag(source, &destination).await {
            return outcome.fail(Operation::Tag, &err);
        }
        outcome.tagged = true;
        info!(image = %source, destination = %destination, "tagged successfully");

        if let Err(err) = bounded(
            Operation::Push,
            &destination,
            limit,
            engine.push(&destination, auth_token),
        )
        .await
        {
            return outcome.fail(Operation::Push, &err);
        }
        outcome.pushed = true;
        info!(destination = %destination, "pushed successfully");

        outcome
    }
}

#[async_trait]
impl Stage for ReplicateStage {
    fn kind(&self) -> StageKind {
        StageKind::Replicate
    }

    fn set_next(&mut self, next: Box<dyn Stage>) {
        self.next = Some(next);
    }

    fn next(&self) -> Option<&dyn Stage> {
        self.next.as_deref()
    }

    async fn execute(&self, review: &mut ImageReview) -> StageResult<()> {
        if review.status.allowed {
            debug!("review already allowed, skipping replication");
            return forward(&self.next, review).await;
        }

        info!("Replication started!");

        match RegistryAuth::for_target(&self.target).encode() {
            Ok(token) => {
                let report = self.replicate(review, &token).await?;
                METRICS.add_images_replicated(report.pushed as u64);
                METRICS.add_replication_failures(report.replication_failures() as u64);
                emit_replication_finished(&report);

                review.status.reason = report.reason();
                review.status.audit_annotations.extend(report.audit_annotations());
            }
            Err(err) => {
                error!(error = %err, "Error encoding auth config");
                review.status.reason = AUTH_ERROR_REASON.to_string();
            }
        }

        forward(&self.next, review).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fakes::{MemoryConnector, MemoryImageEngine};

    fn target() -> Arc<ReplicationTarget> {
        Arc::new(ReplicationTarget {
            host: "registry.internal".into(),
            namespace: "mirror".into(),
            username: "robot".into(),
            password: "pw".into(),
            engine_endpoint: "unix:///var/run/docker.sock".into(),
            call_timeout: Duration::from_secs(5),
        })
    }

    fn stage() -> ReplicateStage {
        let engine = Arc::new(MemoryImageEngine::new());
        ReplicateStage::new(target(), Arc::new(MemoryConnector::new(engine)))
    }

    #[test]
    fn test_destination_for_tagged_image() {
        assert_eq!(
            stage().destination_for("docker.io/library/nginx:1.25").unwrap(),
            "registry.internal/mirror/nginx:1.25"
        );
    }

    #[test]
    fn test_destination_for_digest_image_fails() {
        assert!(matches!(
            stage().destination_for("docker.io/library/nginx@sha256:abc"),
            Err(EngineError::Tag { .. })
        ));
    }

    #[test]
    fn test_report_reason_shapes() {
        let ok = ReplicationReport {
            pulled: 2,
            tagged: 2,
            pushed: 2,
            removed: 1,
            remove_failures: 1,
            ..Default::default()
        };
        assert!(ok.is_success());
        assert_eq!(
            ok.reason(),
            "success:replication:pull:2,push:2;failed:pull:0,tag:0,push:0,remove:1"
        );

        let failed = ReplicationReport {
            tag_failures: 1,
            ..ok
        };
        assert!(!failed.is_success());
        assert!(failed.reason().starts_with("error:replication:"));
    }

    #[test]
    fn test_report_audit_annotations() {
        let report = ReplicationReport {
            pulled: 3,
            pull_failures: 1,
            ..Default::default()
        };
        let annotations = report.audit_annotations();
        assert_eq!(annotations.len(), 8);
        assert_eq!(annotations["replication.ipw/pull-ok"], "3");
        assert_eq!(annotations["replication.ipw/pull-failed"], "1");
        assert_eq!(annotations["replication.ipw/remove-ok"], "0");
    }
}
