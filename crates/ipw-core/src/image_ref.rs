//! Container image reference parsing.
//!
//! An image string is decomposed into registry, project, image and either a
//! tag or a content digest. Two anchored grammars are tried in order:
//!
//! 1. tag form: `[registry/]project/image:tag`
//! 2. digest form: `[registry/]project/image@sha256:<hex>`
//!
//! Anything else is rejected with [`ImageRefError::InvalidFormat`].

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const TAG_PATTERN: &str = r"^(?P<registry>.+?/)?(?P<project>[A-Za-z0-9_-]+)/(?P<image>[A-Za-z0-9_-]+):(?P<tag>[A-Za-z0-9_.-]+)$";
const HASH_PATTERN: &str = r"^(?P<registry>.+?/)?(?P<project>[A-Za-z0-9_-]+)/(?P<image>[A-Za-z0-9_-]+)@(?P<hash>sha256:[A-Fa-f0-9]+)$";

/// Errors produced while parsing an image reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageRefError {
    #[error("invalid image format: {input:?}")]
    InvalidFormat { input: String },
}

/// A parsed container image reference.
///
/// `registry` keeps its trailing `/` exactly as written; an empty registry
/// means the reference relies on the engine's implicit default registry.
/// Exactly one of `tag` and `hash` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub registry: String,
    pub project: String,
    pub image: String,
    pub tag: Option<String>,
    pub hash: Option<String>,
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TAG_PATTERN).expect("tag pattern is valid"))
}

fn hash_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(HASH_PATTERN).expect("hash pattern is valid"))
}

impl ImageReference {
    /// Parse an image string, trying the tag grammar before the digest grammar.
    pub fn parse(input: &str) -> Result<Self, ImageRefError> {
        let group = |caps: &regex::Captures<'_>, name: &str| {
            caps.name(name)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };

        if let Some(caps) = tag_regex().captures(input) {
            return Ok(Self {
                registry: group(&caps, "registry"),
                project: group(&caps, "project"),
                image: group(&caps, "image"),
                tag: Some(group(&caps, "tag")),
                hash: None,
            });
        }

        if let Some(caps) = hash_regex().captures(input) {
            return Ok(Self {
                registry: group(&caps, "registry"),
                project: group(&caps, "project"),
                image: group(&caps, "image"),
                tag: None,
                hash: Some(group(&caps, "hash")),
            });
        }

        Err(ImageRefError::InvalidFormat {
            input: input.to_string(),
        })
    }

    /// Registry with trailing separators stripped (`"harbor.it.org/"` → `"harbor.it.org"`).
    pub fn registry_host(&self) -> &str {
        self.registry.trim_end_matches('/')
    }

    /// Whether the reference names an explicit registry.
    pub fn has_registry(&self) -> bool {
        !self.registry.is_empty()
    }

    /// Tag as a plain string; empty for digest references.
    pub fn tag_str(&self) -> &str {
        self.tag.as_deref().unwrap_or("")
    }

    /// Digest as a plain string; empty for tag references.
    pub fn hash_str(&self) -> &str {
        self.hash.as_deref().unwrap_or("")
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", self.registry, self.project, self.image)?;
        match (&self.tag, &self.hash) {
            (Some(tag), _) => write!(f, ":{tag}"),
            (None, Some(hash)) => write!(f, "@{hash}"),
            (None, None) => Ok(()),
        }
    }
}

impl std::str::FromStr for ImageReference {
    type Err = ImageRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tag_form_with_registry() {
        let r = ImageReference::parse("harbor.it.org/proj/img:1.0").unwrap();
        assert_eq!(r.registry, "harbor.it.org/");
        assert_eq!(r.registry_host(), "harbor.it.org");
        assert_eq!(r.project, "proj");
        assert_eq!(r.image, "img");
        assert_eq!(r.tag.as_deref(), Some("1.0"));
        assert!(r.hash.is_none());
    }

    #[test]
    fn test_parse_tag_form_without_registry() {
        let r = ImageReference::parse("library/nginx:1.25-alpine").unwrap();
        assert_eq!(r.registry, "");
        assert!(!r.has_registry());
        assert_eq!(r.project, "library");
        assert_eq!(r.image, "nginx");
        assert_eq!(r.tag_str(), "1.25-alpine");
    }

    #[test]
    fn test_parse_registry_with_port_and_nested_path() {
        let r = ImageReference::parse("registry.local:5000/team/sub/proj/img:v2").unwrap();
        assert_eq!(r.registry, "registry.local:5000/team/sub/");
        assert_eq!(r.project, "proj");
        assert_eq!(r.image, "img");
        assert_eq!(r.tag_str(), "v2");
    }

    #[test]
    fn test_parse_hash_form() {
        let r = ImageReference::parse("docker.io/proj/img@sha256:abc123DEF").unwrap();
        assert_eq!(r.registry, "docker.io/");
        assert_eq!(r.hash.as_deref(), Some("sha256:abc123DEF"));
        assert!(r.tag.is_none());
        assert_eq!(r.tag_str(), "");
    }

    #[test]
    fn test_parse_rejects_missing_tag_and_hash() {
        for input in ["not-an-image", "proj/image", "proj/img@", "proj/img@sha256:", ""] {
            assert_eq!(
                ImageReference::parse(input),
                Err(ImageRefError::InvalidFormat {
                    input: input.to_string()
                }),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_bad_tag_characters() {
        assert!(ImageReference::parse("proj/img:1.0+build").is_err());
        assert!(ImageReference::parse("proj/im g:1.0").is_err());
    }

    #[test]
    fn test_display_reproduces_input() {
        for input in [
            "harbor.it.org/proj/img:1.0",
            "proj/img:latest",
            "quay.io/proj/img@sha256:0123abcd",
        ] {
            let parsed: ImageReference = input.parse().unwrap();
            assert_eq!(parsed.to_string(), input);
        }
    }

    #[test]
    fn test_synthesized_references_recover_fields() {
        let registries = ["", "harbor.it.org/", "10.0.0.1:5000/"];
        let tags = ["1.0", "v2.3.4-rc.1", "latest", "build_7"];
        for registry in registries {
            for tag in tags {
                let input = format!("{registry}my-proj/my_img:{tag}");
                let r = ImageReference::parse(&input).unwrap();
                assert_eq!(r.registry, registry);
                assert_eq!(r.project, "my-proj");
                assert_eq!(r.image, "my_img");
                assert_eq!(r.tag.as_deref(), Some(tag));
                assert!(r.hash.is_none());
            }
        }
    }
}
