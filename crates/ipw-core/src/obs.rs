//! Structured observability hooks for the review lifecycle.
//!
//! Events are emitted at `info!` level with a stable `event` field so they
//! can be filtered downstream (`RUST_LOG`, JSON log pipelines).

use tracing::{error, info, Span};
use uuid::Uuid;

use crate::error::StageError;
use crate::stage::ReplicationReport;

/// Span tagging everything logged while one review is processed.
pub fn review_span(review_id: &Uuid) -> Span {
    tracing::info_span!("ipw.review", review_id = %review_id)
}

/// Emit event: review received.
pub fn emit_review_received(namespace: &str, containers: usize) {
    info!(event = "review.received", namespace = %namespace, containers = containers);
}

/// Emit event: chain finished with a decision.
pub fn emit_review_decided(allowed: bool, reason: &str) {
    info!(event = "review.decided", allowed = allowed, reason = %reason);
}

/// Emit event: replication finished with per-operation counts.
pub fn emit_replication_finished(report: &ReplicationReport) {
    info!(
        event = "replication.finished",
        success = report.is_success(),
        pulled = report.pulled,
        tagged = report.tagged,
        pushed = report.pushed,
        removed = report.removed,
        pull_failures = report.pull_failures,
        tag_failures = report.tag_failures,
        push_failures = report.push_failures,
        remove_failures = report.remove_failures,
    );
}

/// Emit event: a stage aborted the chain.
pub fn emit_stage_error(err: &StageError) {
    error!(event = "review.aborted", error = %err);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_span_create() {
        let _entered = review_span(&Uuid::new_v4()).entered();
        emit_review_received("default", 2);
        emit_review_decided(false, "");
    }
}
