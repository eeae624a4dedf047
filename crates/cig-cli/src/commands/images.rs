//! `cig images`: list locally stored images.

use std::path::Path;

use cig_common::constants::CIG_IMAGES_PATH;
use cig_image::metadata::ImageDb;

use crate::output;

/// Executes the `images` command.
///
/// # Errors
///
/// Returns an error if the metadata database cannot be read.
#[allow(clippy::print_stdout)]
pub fn execute() -> anyhow::Result<()> {
    let db = ImageDb::open(Path::new(CIG_IMAGES_PATH))?;
    let rows: Vec<Vec<String>> = db
        .rows()
        .into_iter()
        .map(|(name, tag, hash)| vec![name, tag, hash])
        .collect();
    println!("{}", output::format_table(&["NAME", "TAG", "HASH"], &rows));
    Ok(())
}
