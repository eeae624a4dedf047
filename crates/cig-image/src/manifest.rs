//! Stored image manifest and runtime config parsing.
//!
//! The on-disk `manifest.json` uses the legacy docker-save shape: an
//! array of entries, each listing a config file, repo tags, and layer
//! file names whose leading hex identifies the layer directory. The
//! runtime config (`<hash>.json`) is the image's OCI config blob, of
//! which only `Config.Env` and `Config.Cmd` matter here.

use std::path::Path;

use cig_common::error::{CigError, Result};
use serde::{Deserialize, Serialize};

/// One entry of a legacy-format manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestEntry {
    /// File name of the image config within the image directory.
    pub config: String,
    /// `name:tag` references this entry was stored under.
    pub repo_tags: Vec<String>,
    /// Layer file names, base layer first.
    pub layers: Vec<String>,
}

/// A legacy-format image manifest.
pub type Manifest = Vec<ManifestEntry>;

/// The subset of an image's runtime configuration the container uses.
/// Both lists can be absent or explicitly `null` in real config blobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Environment variables as `KEY=value` strings.
    #[serde(rename = "Env", default, deserialize_with = "null_as_empty")]
    pub env: Vec<String>,
    /// Default command.
    #[serde(rename = "Cmd", default, deserialize_with = "null_as_empty")]
    pub cmd: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// An image config blob; unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Runtime configuration section.
    #[serde(rename = "Config", default)]
    pub config: RuntimeConfig,
}

/// Parses manifest JSON.
///
/// # Errors
///
/// Returns an error when the content is not valid manifest JSON.
pub fn parse_manifest(content: &str) -> Result<Manifest> {
    Ok(serde_json::from_str(content)?)
}

/// Loads and parses the manifest of a stored image.
///
/// # Errors
///
/// Returns an error if the file is missing or malformed.
pub fn load_manifest(images_root: &Path, image_hash: &str) -> Result<Manifest> {
    let path = crate::image_manifest_path(images_root, image_hash);
    let content = std::fs::read_to_string(&path).map_err(|e| CigError::Io {
        path: path.clone(),
        source: e,
    })?;
    parse_manifest(&content)
}

/// Validates a manifest down to its layer list: exactly one entry
/// with at least one layer.
///
/// # Errors
///
/// Returns an error for zero entries, multiple entries, or an entry
/// without layers.
pub fn validated_layers(manifest: &Manifest) -> Result<&[String]> {
    let entry = match manifest.as_slice() {
        [] => {
            return Err(CigError::Image {
                message: "manifest has no entries".to_owned(),
            });
        }
        [entry] => entry,
        entries => {
            return Err(CigError::Image {
                message: format!("manifest has {} entries, expected exactly one", entries.len()),
            });
        }
    };
    if entry.layers.is_empty() {
        return Err(CigError::Image {
            message: "manifest entry has no layers".to_owned(),
        });
    }
    Ok(&entry.layers)
}

/// Loads the runtime config of a stored image.
///
/// # Errors
///
/// Returns an error if the file is missing or malformed.
pub fn load_image_config(images_root: &Path, image_hash: &str) -> Result<ImageConfig> {
    let path = crate::image_config_path(images_root, image_hash);
    let content = std::fs::read_to_string(&path).map_err(|e| CigError::Io {
        path: path.clone(),
        source: e,
    })?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {
            "Config": "0123456789ab.json",
            "RepoTags": ["alpine:latest"],
            "Layers": ["aaaaaaaaaaaa.tar.gz", "bbbbbbbbbbbb.tar.gz"]
        }
    ]"#;

    #[test]
    fn parses_single_entry_manifest() {
        let manifest = parse_manifest(SAMPLE).expect("parse");
        let layers = validated_layers(&manifest).expect("validate");
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0], "aaaaaaaaaaaa.tar.gz");
    }

    #[test]
    fn empty_manifest_is_rejected() {
        let manifest = parse_manifest("[]").expect("parse");
        assert!(validated_layers(&manifest).is_err());
    }

    #[test]
    fn multi_entry_manifest_is_rejected() {
        let entry = ManifestEntry {
            config: "c.json".into(),
            repo_tags: vec![],
            layers: vec!["l.tar".into()],
        };
        let manifest = vec![entry.clone(), entry];
        assert!(validated_layers(&manifest).is_err());
    }

    #[test]
    fn entry_without_layers_is_rejected() {
        let manifest = vec![ManifestEntry {
            config: "c.json".into(),
            repo_tags: vec!["a:b".into()],
            layers: vec![],
        }];
        assert!(validated_layers(&manifest).is_err());
    }

    #[test]
    fn config_parses_env_and_cmd_ignoring_the_rest() {
        let raw = r#"{
            "architecture": "amd64",
            "Config": {
                "Env": ["PATH=/usr/bin"],
                "Cmd": ["/bin/sh"],
                "WorkingDir": "/"
            },
            "history": []
        }"#;
        let config: ImageConfig = serde_json::from_str(raw).expect("parse");
        assert_eq!(config.config.env, vec!["PATH=/usr/bin"]);
        assert_eq!(config.config.cmd, vec!["/bin/sh"]);
    }

    #[test]
    fn config_tolerates_null_sections() {
        let config: ImageConfig =
            serde_json::from_str(r#"{"Config": {"Env": null, "Cmd": null}}"#).expect("parse");
        assert!(config.config.env.is_empty());
        assert!(config.config.cmd.is_empty());
    }
}
