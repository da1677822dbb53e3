//! Review chain assembly and execution.

use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use crate::config::WebhookConfig;
use crate::engine::EngineConnector;
use crate::error::{ConfigError, StageResult};
use crate::metrics::METRICS;
use crate::obs::{emit_review_decided, emit_review_received, emit_stage_error, review_span};
use crate::review::ImageReview;
use crate::stage::{ReplicateStage, ScanStage, Stage, StageKind, ValidateStage};

/// A linear chain of stages, built fresh for each review.
///
/// Validate always heads the chain; Replicate and Scan follow it, in that
/// order, when their flags are set.
pub struct ReviewChain {
    head: Box<dyn Stage>,
}

impl ReviewChain {
    /// Link the stages enabled in `config`.
    pub fn assemble(
        config: &WebhookConfig,
        connector: Arc<dyn EngineConnector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let validate = Box::new(ValidateStage::new(config.policy.clone()));
        let mut tail: Vec<Box<dyn Stage>> = Vec::new();

        if config.stages.replicate {
            let target = config
                .replication
                .clone()
                .ok_or(ConfigError::ReplicationTargetAbsent)?;
            tail.push(Box::new(ReplicateStage::new(target, connector)));
        }
        if config.stages.scan {
            tail.push(Box::new(ScanStage::new()));
        }

        Ok(Self::link(validate, tail))
    }

    /// Link `head` followed by `tail` in order; the last stage ends the chain.
    pub fn link(mut head: Box<dyn Stage>, tail: Vec<Box<dyn Stage>>) -> Self {
        let rest = tail.into_iter().rev().reduce(|next, mut stage| {
            stage.set_next(next);
            stage
        });
        if let Some(next) = rest {
            head.set_next(next);
        }
        Self { head }
    }

    /// Stage kinds from head to tail.
    pub fn order(&self) -> Vec<StageKind> {
        let mut order = Vec::new();
        let mut current: Option<&dyn Stage> = Some(self.head.as_ref());
        while let Some(stage) = current {
            order.push(stage.kind());
            current = stage.next();
        }
        order
    }

    /// Run the chain over `review`.
    ///
    /// On success `review.status.allowed` holds the decision.
    pub async fn run(&self, review: &mut ImageReview) -> StageResult<()> {
        let review_id = Uuid::new_v4();
        let span = review_span(&review_id);

        async {
            emit_review_received(review.namespace(), review.spec.containers.len());

            if let Err(err) = self.head.execute(review).await {
                emit_stage_error(&err);
                return Err(err);
            }

            if review.status.allowed {
                METRICS.inc_reviews_allowed();
            } else {
                METRICS.inc_reviews_denied();
            }
            emit_review_decided(review.status.allowed, &review.status.reason);
            Ok(())
        }
        .instrument(span)
        .await
    }
}
