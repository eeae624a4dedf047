//! `cig rmi`: remove a stored image.

use std::path::Path;

use clap::Args;

use cig_common::constants::CIG_IMAGES_PATH;
use cig_common::types::ImageReference;
use cig_image::metadata::ImageDb;

/// Arguments for the `rmi` command.
#[derive(Args, Debug)]
pub struct RmiArgs {
    /// 12-char hash of the image to remove.
    pub image_hash: String,
}

/// Executes the `rmi` command. Refuses to remove an image any running
/// container was started from. The check races against new `run`
/// invocations; that window is accepted.
///
/// # Errors
///
/// Returns an error for an unknown hash, an image in use, or a failed
/// removal.
pub fn execute(args: RmiArgs) -> anyhow::Result<()> {
    let images_root = Path::new(CIG_IMAGES_PATH);
    let db = ImageDb::open(images_root)?;
    if db.tag_for_hash(&args.image_hash).is_none() {
        anyhow::bail!("no such image: {}", args.image_hash);
    }

    for container in cig_runtime::registry::Registry::new().list_running()? {
        let reference = ImageReference::parse(&container.image);
        if db.hash_for_tag(&reference.name, &reference.tag) == Some(args.image_hash.as_str()) {
            anyhow::bail!(
                "cannot remove image {}: in use by container {}",
                args.image_hash,
                container.id
            );
        }
    }

    cig_image::pull::remove_image(images_root, &args.image_hash)?;
    Ok(())
}
