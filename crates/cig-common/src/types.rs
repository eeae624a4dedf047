//! Domain primitive types used across the cig workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CigError, Result};

/// Unique identifier for a container instance.
///
/// Twelve lowercase hex characters derived from six random bytes. The
/// id doubles as the directory, cgroup, and namespace-file key for the
/// container; uniqueness is probabilistic and collisions are not
/// detected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Generates a random container ID.
    #[must_use]
    pub fn generate() -> Self {
        let bytes = random_octets();
        let id = bytes[..6].iter().map(|b| format!("{b:02x}")).collect();
        Self(id)
    }

    /// Wraps an existing identifier string.
    ///
    /// # Errors
    ///
    /// Returns an error unless the input is exactly 12 hex characters.
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.len() != 12 || !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CigError::Config {
                message: format!("invalid container id: {id}"),
            });
        }
        Ok(Self(id))
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the 6-character prefix used in veth interface names.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..6]
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A `name:tag` image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Image name (e.g. `alpine`).
    pub name: String,
    /// Image tag; defaults to `latest` when the reference omits it.
    pub tag: String,
}

impl ImageReference {
    /// Parses a `name[:tag]` reference, defaulting the tag to `latest`.
    #[must_use]
    pub fn parse(src: &str) -> Self {
        match src.split_once(':') {
            Some((name, tag)) => Self {
                name: name.to_string(),
                tag: tag.to_string(),
            },
            None => Self {
                name: src.to_string(),
                tag: "latest".to_string(),
            },
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

/// Resource limits for a container. `None` means the limit is unset
/// and the corresponding cgroup file is left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum RAM in megabytes.
    pub memory_mb: Option<u64>,
    /// Maximum swap in megabytes; only honored alongside a memory limit.
    pub swap_mb: Option<u64>,
    /// Maximum number of processes.
    pub pids: Option<u64>,
    /// CPU cores as a fraction of the host (e.g. `0.5`).
    pub cpus: Option<f64>,
}

impl ResourceLimits {
    /// Returns true when no limit is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.memory_mb.is_none()
            && self.swap_mb.is_none()
            && self.pids.is_none()
            && self.cpus.is_none()
    }
}

/// Returns 16 random bytes.
///
/// UUIDv4 generation is the workspace's single entropy source; note
/// that bytes 6 and 8 carry fixed version/variant bits and callers
/// needing full-width randomness should avoid them.
#[must_use]
pub fn random_octets() -> [u8; 16] {
    *uuid::Uuid::new_v4().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_id_is_twelve_hex_chars() {
        let id = ContainerId::generate();
        assert_eq!(id.as_str().len(), 12);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(ContainerId::generate(), ContainerId::generate());
    }

    #[test]
    fn short_is_six_char_prefix() {
        let id = ContainerId::parse("0123456789ab").expect("valid id");
        assert_eq!(id.short(), "012345");
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(ContainerId::parse("abc").is_err());
        assert!(ContainerId::parse("0123456789abcd").is_err());
    }

    #[test]
    fn parse_rejects_non_hex() {
        assert!(ContainerId::parse("0123456789zz").is_err());
    }

    #[test]
    fn image_reference_defaults_tag_to_latest() {
        let r = ImageReference::parse("alpine");
        assert_eq!(r.name, "alpine");
        assert_eq!(r.tag, "latest");
    }

    #[test]
    fn image_reference_parses_explicit_tag() {
        let r = ImageReference::parse("ubuntu:22.04");
        assert_eq!(r.name, "ubuntu");
        assert_eq!(r.tag, "22.04");
        assert_eq!(r.to_string(), "ubuntu:22.04");
    }

    #[test]
    fn default_limits_are_empty() {
        assert!(ResourceLimits::default().is_empty());
    }

    #[test]
    fn limits_with_memory_are_not_empty() {
        let limits = ResourceLimits {
            memory_mb: Some(100),
            ..ResourceLimits::default()
        };
        assert!(!limits.is_empty());
    }
}
