//! Scan stage.
//!
//! Reserved for vulnerability scanning of the reviewed images. A scanner may
//! annotate the review but must not change `status.allowed`. No scanner is
//! wired in yet, so the stage has no effect.

use async_trait::async_trait;
use tracing::debug;

use super::{forward, Stage, StageKind};
use crate::error::StageResult;
use crate::review::ImageReview;

#[derive(Default)]
pub struct ScanStage {
    next: Option<Box<dyn Stage>>,
}

impl ScanStage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Stage for ScanStage {
    fn kind(&self) -> StageKind {
        StageKind::Scan
    }

    fn set_next(&mut self, next: Box<dyn Stage>) {
        self.next = Some(next);
    }

    fn next(&self) -> Option<&dyn Stage> {
        self.next.as_deref()
    }

    async fn execute(&self, review: &mut ImageReview) -> StageResult<()> {
        debug!(images = review.spec.containers.len(), "Scan");
        forward(&self.next, review).await
    }
}
