//! Validation stage: decides `status.allowed`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{forward, Stage, StageKind};
use crate::config::PolicyConfig;
use crate::error::StageResult;
use crate::image_ref::ImageReference;
use crate::review::ImageReview;

/// Why a review was denied by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    NoContainers,
    InvalidReference { image: String },
    MissingTag { image: String },
    LatestTag { image: String },
    RegistryNotWhitelisted { image: String, registry: String },
}

/// Outcome of evaluating a review against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Namespace is excluded; no image was inspected.
    Excluded,
    /// Every container passed.
    Passed { images: usize },
    Denied(Denial),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Verdict::Denied(_))
    }
}

/// Evaluate `review` against `policy` without touching it.
///
/// Containers are checked in submission order and the first failing one
/// decides the verdict.
pub fn evaluate(policy: &PolicyConfig, review: &ImageReview) -> Verdict {
    if policy.is_excluded_namespace(review.namespace()) {
        return Verdict::Excluded;
    }

    let mut images = 0usize;
    for image in review.images() {
        let reference = match ImageReference::parse(image) {
            Ok(r) => r,
            Err(_) => {
                return Verdict::Denied(Denial::InvalidReference {
                    image: image.to_string(),
                })
            }
        };
        images += 1;

        debug!(
            image = %image,
            registry = %reference.registry,
            project = %reference.project,
            name = %reference.image,
            tag = %reference.tag_str(),
            hash = %reference.hash_str(),
            "parsed container image"
        );

        match reference.tag.as_deref() {
            None | Some("") => {
                return Verdict::Denied(Denial::MissingTag {
                    image: image.to_string(),
                })
            }
            Some("latest") => {
                return Verdict::Denied(Denial::LatestTag {
                    image: image.to_string(),
                })
            }
            Some(_) => {}
        }

        if !policy.is_whitelisted(&reference.registry) {
            return Verdict::Denied(Denial::RegistryNotWhitelisted {
                image: image.to_string(),
                registry: reference.registry_host().to_string(),
            });
        }
    }

    if images == 0 {
        Verdict::Denied(Denial::NoContainers)
    } else {
        Verdict::Passed { images }
    }
}

/// Applies [`evaluate`] and records the decision on the review.
pub struct ValidateStage {
    policy: Arc<PolicyConfig>,
    next: Option<Box<dyn Stage>>,
}

impl ValidateStage {
    pub fn new(policy: Arc<PolicyConfig>) -> Self {
        Self { policy, next: None }
    }
}

#[async_trait]
impl Stage for ValidateStage {
    fn kind(&self) -> StageKind {
        StageKind::Validate
    }

    fn set_next(&mut self, next: Box<dyn Stage>) {
        self.next = Some(next);
    }

    fn next(&self) -> Option<&dyn Stage> {
        self.next.as_deref()
    }

    async fn execute(&self, review: &mut ImageReview) -> StageResult<()> {
        let verdict = evaluate(&self.policy, review);
        review.status.allowed = verdict.is_allowed();

        match &verdict {
            Verdict::Excluded => info!(
                namespace = %review.namespace(),
                "Passed the requirement (excluded namespace)"
            ),
            Verdict::Passed { images } => info!(images = images, "Passed the requirement"),
            Verdict::Denied(denial) => info!(denial = ?denial, "Couldn't pass the requirement"),
        }

        // Continuation does not depend on the decision.
        forward(&self.next, review).await
    }
}
