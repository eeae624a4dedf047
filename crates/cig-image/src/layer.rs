//! Layer blob extraction.
//!
//! Registry layers arrive as tar archives, usually gzip-compressed.
//! Whether to decompress is decided by the layer's media type first
//! and the gzip magic bytes second, since some registries serve
//! compressed blobs under the plain tar media type.

use std::path::Path;

use cig_common::error::{CigError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Extracts a layer blob into `target`, creating it if needed.
///
/// # Errors
///
/// Returns an error if the target cannot be created or the archive is
/// malformed.
pub fn extract_layer(data: &[u8], media_type: &str, target: &Path) -> Result<()> {
    std::fs::create_dir_all(target).map_err(|e| CigError::Io {
        path: target.to_path_buf(),
        source: e,
    })?;

    let unpack_err = |e: std::io::Error| CigError::Io {
        path: target.to_path_buf(),
        source: e,
    };

    if is_gzip(data, media_type) {
        let decoder = flate2::read::GzDecoder::new(data);
        let mut archive = tar::Archive::new(decoder);
        archive.set_preserve_permissions(true);
        archive.unpack(target).map_err(unpack_err)?;
    } else {
        let mut archive = tar::Archive::new(data);
        archive.set_preserve_permissions(true);
        archive.unpack(target).map_err(unpack_err)?;
    }

    tracing::info!(target = %target.display(), bytes = data.len(), "layer extracted");
    Ok(())
}

fn is_gzip(data: &[u8], media_type: &str) -> bool {
    media_type.ends_with("gzip") || data.starts_with(&GZIP_MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_tar() -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let data = b"hello from layer";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "hello.txt", &data[..])
            .expect("append data");
        builder.into_inner().expect("finish tar")
    }

    fn build_tar_gz() -> Vec<u8> {
        use std::io::Write;
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&build_tar()).expect("compress");
        encoder.finish().expect("finish gzip")
    }

    #[test]
    fn extracts_plain_tar_blob() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("fs");
        extract_layer(
            &build_tar(),
            "application/vnd.oci.image.layer.v1.tar",
            &target,
        )
        .expect("extract");
        let content = std::fs::read_to_string(target.join("hello.txt")).expect("read");
        assert_eq!(content, "hello from layer");
    }

    #[test]
    fn extracts_gzipped_blob_by_media_type() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("fs");
        extract_layer(
            &build_tar_gz(),
            "application/vnd.docker.image.rootfs.diff.tar.gzip",
            &target,
        )
        .expect("extract");
        assert!(target.join("hello.txt").exists());
    }

    #[test]
    fn sniffs_gzip_despite_plain_media_type() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("fs");
        extract_layer(
            &build_tar_gz(),
            "application/vnd.oci.image.layer.v1.tar",
            &target,
        )
        .expect("extract");
        assert!(target.join("hello.txt").exists());
    }

    #[test]
    fn garbage_blob_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = extract_layer(b"not a tar archive", "", &dir.path().join("fs"));
        assert!(result.is_err());
    }
}
