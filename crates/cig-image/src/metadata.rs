//! The `images.json` metadata database.
//!
//! A two-level map, `name -> tag -> hash`, stored as a single JSON
//! file in the images directory. Lookups go both ways: by tag to skip
//! a pull, and by hash to detect that two tags name identical content.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cig_common::error::{CigError, Result};

type Entries = BTreeMap<String, BTreeMap<String, String>>;

/// The image metadata database, loaded into memory.
#[derive(Debug)]
pub struct ImageDb {
    path: PathBuf,
    entries: Entries,
}

impl ImageDb {
    /// Opens the database in `images_root`, creating an empty one on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, written, or
    /// parsed.
    pub fn open(images_root: &Path) -> Result<Self> {
        let path = images_root.join("images.json");
        if !path.exists() {
            std::fs::write(&path, b"{}").map_err(|e| CigError::Io {
                path: path.clone(),
                source: e,
            })?;
        }
        let content = std::fs::read_to_string(&path).map_err(|e| CigError::Io {
            path: path.clone(),
            source: e,
        })?;
        let entries: Entries = serde_json::from_str(&content)?;
        Ok(Self { path, entries })
    }

    /// Hash stored for `name:tag`, if any.
    #[must_use]
    pub fn hash_for_tag(&self, name: &str, tag: &str) -> Option<&str> {
        self.entries
            .get(name)
            .and_then(|tags| tags.get(tag))
            .map(String::as_str)
    }

    /// Any `(name, tag)` pair already stored for `hash`.
    #[must_use]
    pub fn tag_for_hash(&self, hash: &str) -> Option<(&str, &str)> {
        for (name, tags) in &self.entries {
            for (tag, stored) in tags {
                if stored == hash {
                    return Some((name.as_str(), tag.as_str()));
                }
            }
        }
        None
    }

    /// Records `name:tag -> hash` and saves the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be written.
    pub fn store(&mut self, name: &str, tag: &str, hash: &str) -> Result<()> {
        let _ = self
            .entries
            .entry(name.to_owned())
            .or_default()
            .insert(tag.to_owned(), hash.to_owned());
        self.save()
    }

    /// Deletes every tag pointing at `hash` and saves the database.
    /// Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be written.
    pub fn remove_hash(&mut self, hash: &str) -> Result<bool> {
        let mut removed = false;
        for tags in self.entries.values_mut() {
            let before = tags.len();
            tags.retain(|_, stored| stored != hash);
            removed |= tags.len() != before;
        }
        self.entries.retain(|_, tags| !tags.is_empty());
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// All `(name, tag, hash)` rows in name order, for listings.
    #[must_use]
    pub fn rows(&self) -> Vec<(String, String, String)> {
        let mut rows = Vec::new();
        for (name, tags) in &self.entries {
            for (tag, hash) in tags {
                rows.push((name.clone(), tag.clone(), hash.clone()));
            }
        }
        rows
    }

    fn save(&self) -> Result<()> {
        let content = serde_json::to_string(&self.entries)?;
        std::fs::write(&self.path, content).map_err(|e| CigError::Io {
            path: self.path.clone(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_an_empty_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = ImageDb::open(dir.path()).expect("open");
        assert!(db.rows().is_empty());
        assert!(dir.path().join("images.json").exists());
    }

    #[test]
    fn store_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut db = ImageDb::open(dir.path()).expect("open");
        db.store("alpine", "latest", "0123456789ab").expect("store");
        db.store("alpine", "3.18", "ba9876543210").expect("store");

        let reloaded = ImageDb::open(dir.path()).expect("reopen");
        assert_eq!(
            reloaded.hash_for_tag("alpine", "latest"),
            Some("0123456789ab")
        );
        assert_eq!(reloaded.hash_for_tag("alpine", "3.18"), Some("ba9876543210"));
        assert_eq!(reloaded.hash_for_tag("alpine", "edge"), None);
    }

    #[test]
    fn tag_for_hash_finds_aliases() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut db = ImageDb::open(dir.path()).expect("open");
        db.store("ubuntu", "22.04", "0123456789ab").expect("store");
        assert_eq!(
            db.tag_for_hash("0123456789ab"),
            Some(("ubuntu", "22.04"))
        );
        assert_eq!(db.tag_for_hash("ffffffffffff"), None);
    }

    #[test]
    fn remove_hash_drops_every_alias() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut db = ImageDb::open(dir.path()).expect("open");
        db.store("ubuntu", "22.04", "0123456789ab").expect("store");
        db.store("ubuntu", "latest", "0123456789ab").expect("store");
        db.store("alpine", "latest", "ba9876543210").expect("store");

        assert!(db.remove_hash("0123456789ab").expect("remove"));
        assert_eq!(db.tag_for_hash("0123456789ab"), None);
        assert_eq!(db.rows().len(), 1);

        assert!(!db.remove_hash("0123456789ab").expect("remove again"));
    }
}
