//! IPW Core Library
//!
//! Decision pipeline for the image policy webhook. An [`ImageReview`] is
//! passed through a chain of stages assembled from the configuration:
//!
//! ```text
//! ImageReview --> Validate --> [Replicate] --> [Scan] --> status.allowed
//! ```
//!
//! - [`image_ref`] — image reference parser
//! - [`policy`]    — whitelist and namespace-exclusion predicates
//! - [`stage`]     — the `Stage` interface and its three variants
//! - [`chain`]     — per-request chain assembly and execution
//! - [`engine`]    — container engine abstraction used for replication

pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod image_ref;
pub mod metrics;
pub mod obs;
pub mod policy;
pub mod review;
pub mod stage;
pub mod telemetry;

pub use chain::ReviewChain;
pub use config::{
    parse_list, PolicyConfig, ReplicationSettings, ReplicationTarget, StageFlags, WebhookConfig,
    DEFAULT_CALL_TIMEOUT_SECS, DEFAULT_ENGINE_ENDPOINT,
};
pub use engine::{
    DockerConnector, DockerEngine, EngineConnector, EngineError, ImageEngine, RegistryAuth,
};
pub use error::{ConfigError, StageError, StageResult};
pub use image_ref::{ImageRefError, ImageReference};
pub use metrics::METRICS;
pub use review::{ImageReview, ImageReviewContainerSpec, ImageReviewSpec, ImageReviewStatus};
pub use stage::{ReplicateStage, ReplicationReport, ScanStage, Stage, StageKind, ValidateStage};
pub use telemetry::{init_tracing, logging_profile};

/// IPW version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
