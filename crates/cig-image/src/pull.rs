//! Pull-if-absent and image removal.
//!
//! Downloads go through the `oci-distribution` client on a dedicated
//! current-thread tokio runtime. The runtime lives only for the
//! duration of the fetch and is gone before the caller does any
//! namespace work, keeping the process single-threaded afterwards.

use std::path::Path;

use cig_common::constants::{CIG_IMAGES_PATH, IMAGE_HASH_LENGTH};
use cig_common::error::{CigError, Result};
use cig_common::types::ImageReference;
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::manifest;
use oci_distribution::secrets::RegistryAuth;
use oci_distribution::{Client, Reference};

use crate::manifest::ManifestEntry;
use crate::metadata::ImageDb;
use crate::{hash, layer};

/// A fully downloaded image, in memory, before unpacking.
struct FetchedImage {
    config_digest_hex: String,
    config_bytes: Vec<u8>,
    layers: Vec<FetchedLayer>,
}

struct FetchedLayer {
    digest_hex: String,
    media_type: String,
    data: Vec<u8>,
}

/// Ensures `reference` is available locally and returns its 12-char
/// image hash. Downloads only when the metadata store has no entry
/// for the tag; content already stored under another tag is aliased
/// instead of unpacked again.
///
/// # Errors
///
/// Returns an error if the registry is unreachable, the image cannot
/// be parsed, or unpacking fails.
pub fn pull_if_absent(reference: &ImageReference) -> Result<String> {
    pull_into(Path::new(CIG_IMAGES_PATH), reference)
}

/// [`pull_if_absent`] against an explicit images directory.
///
/// # Errors
///
/// See [`pull_if_absent`].
pub fn pull_into(images_root: &Path, reference: &ImageReference) -> Result<String> {
    let mut db = ImageDb::open(images_root)?;
    if let Some(existing) = db.hash_for_tag(&reference.name, &reference.tag) {
        tracing::info!(image = %reference, hash = existing, "image already present");
        return Ok(existing.to_owned());
    }

    tracing::info!(image = %reference, "downloading image");
    let fetched = fetch(reference)?;
    let image_hash = fetched.config_digest_hex[..IMAGE_HASH_LENGTH].to_owned();

    if let Some((alt_name, alt_tag)) = db.tag_for_hash(&image_hash) {
        tracing::info!(
            image = %reference,
            alias = %format_args!("{alt_name}:{alt_tag}"),
            "identical content already stored under another tag"
        );
        db.store(&reference.name, &reference.tag, &image_hash)?;
        return Ok(image_hash);
    }

    unpack(images_root, &image_hash, &fetched, reference)?;
    db.store(&reference.name, &reference.tag, &image_hash)?;
    tracing::info!(image = %reference, hash = %image_hash, "image stored");
    Ok(image_hash)
}

/// Deletes a stored image: its directory tree and every metadata tag
/// pointing at it. Callers must first check that no running container
/// uses the image.
///
/// # Errors
///
/// Returns [`CigError::NotFound`] for an unknown hash, or an I/O
/// error if the directory cannot be removed.
pub fn remove_image(images_root: &Path, image_hash: &str) -> Result<()> {
    let mut db = ImageDb::open(images_root)?;
    if db.tag_for_hash(image_hash).is_none() {
        return Err(CigError::NotFound {
            kind: "image",
            id: image_hash.to_owned(),
        });
    }

    let base = crate::image_base_path(images_root, image_hash);
    if base.exists() {
        std::fs::remove_dir_all(&base).map_err(|e| CigError::Io {
            path: base,
            source: e,
        })?;
    }
    let _ = db.remove_hash(image_hash)?;
    tracing::info!(hash = image_hash, "image removed");
    Ok(())
}

/// Runs the async registry client to completion on a throwaway
/// current-thread runtime.
fn fetch(reference: &ImageReference) -> Result<FetchedImage> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CigError::Image {
            message: format!("failed to start pull runtime: {e}"),
        })?;
    runtime.block_on(fetch_async(reference))
}

async fn fetch_async(reference: &ImageReference) -> Result<FetchedImage> {
    let oci_ref: Reference = reference
        .to_string()
        .parse()
        .map_err(|e| CigError::Image {
            message: format!("invalid image reference {reference}: {e}"),
        })?;

    let client = Client::new(ClientConfig {
        protocol: ClientProtocol::Https,
        ..Default::default()
    });
    let accepted = vec![
        manifest::IMAGE_LAYER_MEDIA_TYPE,
        manifest::IMAGE_LAYER_GZIP_MEDIA_TYPE,
        manifest::IMAGE_DOCKER_LAYER_TAR_MEDIA_TYPE,
        manifest::IMAGE_DOCKER_LAYER_GZIP_MEDIA_TYPE,
    ];

    let image = client
        .pull(&oci_ref, &RegistryAuth::Anonymous, accepted)
        .await
        .map_err(|e| CigError::Image {
            message: format!("failed to pull {reference}: {e}"),
        })?;

    // Both digests are recomputed from the blob bytes rather than
    // trusted from the manifest descriptors.
    let config_digest_hex = hash::sha256_hex(&image.config.data);
    let layers = image
        .layers
        .into_iter()
        .map(|l| FetchedLayer {
            digest_hex: hash::sha256_hex(&l.data),
            media_type: l.media_type,
            data: l.data,
        })
        .collect();

    Ok(FetchedImage {
        config_digest_hex,
        config_bytes: image.config.data,
        layers,
    })
}

/// Writes a fetched image to disk in the stored-image layout: one
/// `fs` tree per layer, the legacy manifest, and the runtime config.
fn unpack(
    images_root: &Path,
    image_hash: &str,
    fetched: &FetchedImage,
    reference: &ImageReference,
) -> Result<()> {
    let base = crate::image_base_path(images_root, image_hash);
    std::fs::create_dir_all(&base).map_err(|e| CigError::Io {
        path: base,
        source: e,
    })?;

    for fetched_layer in &fetched.layers {
        let target = crate::layer_fs_path(images_root, image_hash, &fetched_layer.digest_hex);
        tracing::info!(layer = %target.display(), "unpacking layer");
        layer::extract_layer(&fetched_layer.data, &fetched_layer.media_type, &target)?;
    }

    let entry = ManifestEntry {
        config: format!("{image_hash}.json"),
        repo_tags: vec![reference.to_string()],
        layers: fetched
            .layers
            .iter()
            .map(|l| format!("{}.tar.gz", l.digest_hex))
            .collect(),
    };
    let manifest_path = crate::image_manifest_path(images_root, image_hash);
    let content = serde_json::to_string(&vec![entry])?;
    std::fs::write(&manifest_path, content).map_err(|e| CigError::Io {
        path: manifest_path,
        source: e,
    })?;

    let config_path = crate::image_config_path(images_root, image_hash);
    std::fs::write(&config_path, &fetched.config_bytes).map_err(|e| CigError::Io {
        path: config_path,
        source: e,
    })?;
    Ok(())
}
