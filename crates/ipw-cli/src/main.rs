//! IPW - Image Policy Webhook CLI
//!
//! Offline access to the webhook's decision logic.
//!
//! ## Commands
//!
//! - `parse`: Split an image reference into its parts
//! - `review`: Run an ImageReview file through the validation chain

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ipw_core::{
    DockerConnector, ImageReference, ImageReview, PolicyConfig, ReviewChain, StageFlags,
    WebhookConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "ipw")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Image Policy Webhook (IPW) tools", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an image reference and print its parts as JSON
    Parse {
        /// Image reference, e.g. harbor.it.org/proj/app:1.0
        image: String,
    },

    /// Validate an ImageReview JSON file; exits non-zero when denied
    Review {
        /// Path to the ImageReview JSON
        file: PathBuf,

        /// Comma-separated whitelisted registries
        #[arg(short, long, env = "WHITE_LIST")]
        whitelist: String,

        /// Comma-separated namespaces that bypass validation
        #[arg(short, long, env = "EXCLUDE_NAMESPACES", default_value = "")]
        exclude_namespaces: String,

        /// Also run the scan stage
        #[arg(long)]
        scan: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    ipw_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Parse { image } => {
            println!("{}", cmd_parse(&image)?);
            Ok(())
        }
        Commands::Review {
            file,
            whitelist,
            exclude_namespaces,
            scan,
        } => {
            let review = cmd_review(&file, &whitelist, &exclude_namespaces, scan).await?;
            println!("{}", serde_json::to_string_pretty(&review)?);
            if !review.status.allowed {
                bail!("image review denied");
            }
            Ok(())
        }
    }
}

/// Parse `image` and render the reference as pretty JSON
fn cmd_parse(image: &str) -> Result<String> {
    let reference = ImageReference::parse(image)?;
    Ok(serde_json::to_string_pretty(&reference)?)
}

/// Load an ImageReview from `path` and decide it without replication
async fn cmd_review(
    path: &Path,
    whitelist: &str,
    exclude_namespaces: &str,
    scan: bool,
) -> Result<ImageReview> {
    let raw = std::fs::read_to_string(path).context(format!("Failed to read {:?}", path))?;
    let mut review: ImageReview =
        serde_json::from_str(&raw).context(format!("Invalid ImageReview JSON in {:?}", path))?;

    let config = WebhookConfig {
        stages: StageFlags {
            replicate: false,
            scan,
        },
        ..WebhookConfig::validate_only(PolicyConfig::from_lists(whitelist, exclude_namespaces))
    };

    // Replication is never linked offline; the connector stays unused.
    let chain = ReviewChain::assemble(&config, Arc::new(DockerConnector))?;
    info!(stages = ?chain.order(), "running review chain");
    chain.run(&mut review).await?;

    Ok(review)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_review(dir: &tempfile::TempDir, namespace: &str, images: &[&str]) -> PathBuf {
        let path = dir.path().join("review.json");
        let review = ImageReview::new(namespace, images.iter().copied());
        std::fs::write(&path, serde_json::to_string(&review).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_cmd_parse_tagged_reference() {
        let json: serde_json::Value =
            serde_json::from_str(&cmd_parse("harbor.it.org/proj/app:1.0").unwrap()).unwrap();
        assert_eq!(json["registry"], "harbor.it.org/");
        assert_eq!(json["project"], "proj");
        assert_eq!(json["image"], "app");
        assert_eq!(json["tag"], "1.0");
    }

    #[test]
    fn test_cmd_parse_rejects_bare_name() {
        assert!(cmd_parse("not-an-image").is_err());
    }

    #[tokio::test]
    async fn test_cmd_review_allows_whitelisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_review(&dir, "default", &["harbor.it.org/proj/app:1.0"]);

        let review = cmd_review(&path, "harbor.it.org", "", true).await.unwrap();
        assert!(review.status.allowed);
    }

    #[tokio::test]
    async fn test_cmd_review_denies_latest() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_review(&dir, "default", &["harbor.it.org/proj/app:latest"]);

        let review = cmd_review(&path, "harbor.it.org", "", false).await.unwrap();
        assert!(!review.status.allowed);
    }

    #[tokio::test]
    async fn test_cmd_review_honours_exclusions() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_review(&dir, "kube-system", &["docker.io/proj/app:latest"]);

        let review = cmd_review(&path, "harbor.it.org", "kube-system", false)
            .await
            .unwrap();
        assert!(review.status.allowed);
    }

    #[tokio::test]
    async fn test_cmd_review_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.json");
        std::fs::write(&path, "{").unwrap();

        let err = cmd_review(&path, "harbor.it.org", "", false).await.unwrap_err();
        assert!(err.to_string().contains("Invalid ImageReview JSON"));
    }

    #[tokio::test]
    async fn test_cmd_review_missing_file() {
        let err = cmd_review(Path::new("/nonexistent/review.json"), "", "", false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
