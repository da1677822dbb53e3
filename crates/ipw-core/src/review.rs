//! The `ImageReview` record that flows through the stage chain.
//!
//! Mirrors the Kubernetes `imagepolicy.k8s.io/v1alpha1` wire format so the
//! API server's ImagePolicyWebhook admission plugin can talk to us directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const API_VERSION: &str = "imagepolicy.k8s.io/v1alpha1";
pub const KIND: &str = "ImageReview";

/// Admission review of a workload's container images.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReview {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default)]
    pub spec: ImageReviewSpec,

    #[serde(default)]
    pub status: ImageReviewStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReviewSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<ImageReviewContainerSpec>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReviewContainerSpec {
    #[serde(default)]
    pub image: String,
}

/// Decision and annotations written by the stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReviewStatus {
    /// The authoritative decision once the chain has finished.
    #[serde(default)]
    pub allowed: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub audit_annotations: BTreeMap<String, String>,
}

impl ImageReview {
    /// Build a review for `namespace` with the given container images.
    pub fn new<I, S>(namespace: impl Into<String>, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            spec: ImageReviewSpec {
                containers: images
                    .into_iter()
                    .map(|image| ImageReviewContainerSpec {
                        image: image.into(),
                    })
                    .collect(),
                annotations: BTreeMap::new(),
                namespace: namespace.into(),
            },
            status: ImageReviewStatus::default(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.spec.namespace
    }

    /// Container image strings in submission order.
    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.spec.containers.iter().map(|c| c.image.as_str())
    }

    pub fn is_allowed(&self) -> bool {
        self.status.allowed
    }
}
