//! Review stages and the interface they share.
//!
//! A stage applies its effect to the review in place and then, if and only
//! if a successor has been installed with [`Stage::set_next`], hands the same
//! review to that successor. A stage without a successor ends the chain.

pub mod replicate;
pub mod scan;
pub mod validate;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StageResult;
use crate::review::ImageReview;

pub use replicate::{ReplicateStage, ReplicationReport};
pub use scan::ScanStage;
pub use validate::ValidateStage;

/// The stage variants a chain can be built from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Whitelist and tag checks; decides `allowed`.
    Validate,

    /// Mirrors rejected images into the private registry.
    Replicate,

    /// Reserved for image scanning; currently a no-op.
    Scan,
}

impl StageKind {
    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Validate => "validate",
            StageKind::Replicate => "replicate",
            StageKind::Scan => "scan",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A link in the review chain.
#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Install the successor, replacing any previous one.
    fn set_next(&mut self, next: Box<dyn Stage>);

    fn next(&self) -> Option<&dyn Stage>;

    /// Apply this stage to `review`, then continue with the successor if set.
    async fn execute(&self, review: &mut ImageReview) -> StageResult<()>;
}

/// Continue the chain with `next`, if there is one.
pub(crate) async fn forward(
    next: &Option<Box<dyn Stage>>,
    review: &mut ImageReview,
) -> StageResult<()> {
    match next {
        Some(stage) => stage.execute(review).await,
        None => Ok(()),
    }
}
