//! Container image references for emulator imports.
//!
//! Emulators are shipped as container images.  Users often paste the GitLab
//! *web* URL of a project (or branch) instead of the registry reference, so
//! the parser rewrites those before splitting the reference:
//!
//! ```text
//! https://gitlab.com/group/emulator/-/tree/feature-x
//!   └─► registry.gitlab.com/group/emulator:feature-x
//! ```

use thiserror::Error;
use tracing::debug;
use url::Url;

/// Error type for image reference parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageReferenceError {
    #[error("image reference is empty")]
    Empty,
}

/// A parsed `name[:tag][@digest]` image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub name: String,
    pub tag: String,
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parses a registry reference or GitLab project URL.
    ///
    /// A missing tag defaults to `latest`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageReferenceError::Empty`] for a blank reference.
    pub fn parse(reference: &str) -> Result<Self, ImageReferenceError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ImageReferenceError::Empty);
        }

        let normalized = normalize_gitlab_url(reference).unwrap_or_else(|| reference.to_string());
        if normalized != reference {
            debug!("rewrote {reference} to {normalized}");
        }

        let (rest, digest) = match normalized.split_once('@') {
            Some((rest, digest)) => (rest.to_string(), Some(digest.to_string())),
            None => (normalized, None),
        };

        // A ':' only separates a tag when it follows the last path segment
        // separator; `host:5000/image` carries a port, not a tag.
        let last_slash = rest.rfind('/').map_or(0, |i| i + 1);
        let (name, tag) = match rest[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                (rest[..split].to_string(), rest[split + 1..].to_string())
            }
            None => (rest.clone(), "latest".to_string()),
        };

        Ok(Self { name, tag, digest })
    }
}

/// Rewrites `https://gitlab.com/<path>/-/<kind>/<branch>` to a registry reference.
///
/// Returns `None` for anything that is not a gitlab.com URL.
fn normalize_gitlab_url(reference: &str) -> Option<String> {
    let url = Url::parse(reference).ok()?;
    if url.host_str() != Some("gitlab.com") {
        return None;
    }

    let (path, local_part) = match url.path().split_once("/-/") {
        Some((path, local)) => (path, Some(local)),
        None => (url.path(), None),
    };
    let mut normalized = format!("registry.gitlab.com{}", path.trim_end_matches('/'));

    if let Some(branch) = local_part.and_then(|local| local.split('/').nth(1)) {
        if !branch.is_empty() {
            normalized.push(':');
            normalized.push_str(branch);
        }
    }
    Some(normalized)
}
