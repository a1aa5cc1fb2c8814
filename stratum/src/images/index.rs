//! The digest → metadata and `repository:tag` → digest indexes (spec §4.2).
//!
//! Per-image metadata lives at `images/<digest>/config.json` (so it travels
//! with the layer blobs it describes); the tag index is the single file
//! `images/tags.json` named explicitly in spec §6's on-disk layout.

use crate::error::{StratumError, StratumResult};
use crate::model::Image;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use stratum_shared::layout::StateLayout;

#[derive(Default, Serialize, Deserialize)]
struct TagIndex {
    /// repository:tag -> digest
    tags: BTreeMap<String, String>,
}

pub struct ImageIndex {
    layout: StateLayout,
}

impl ImageIndex {
    pub fn new(layout: StateLayout) -> StratumResult<Self> {
        std::fs::create_dir_all(layout.images_dir())
            .map_err(|e| StratumError::io("images.index", "failed to create images directory").with_source(e))?;
        Ok(Self { layout })
    }

    fn load_tags(&self) -> StratumResult<TagIndex> {
        let path = self.layout.tags_index();
        match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StratumError::io("images.index", "corrupt tags.json").with_source(e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TagIndex::default()),
            Err(e) => Err(StratumError::io("images.index", "failed to read tags.json").with_source(e)),
        }
    }

    fn save_tags(&self, index: &TagIndex) -> StratumResult<()> {
        let path = self.layout.tags_index();
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(index)
            .map_err(|e| StratumError::io("images.index", "failed to serialize tags.json").with_source(e))?;
        std::fs::write(&tmp, json).map_err(|e| StratumError::io("images.index", "failed to write tags.json").with_source(e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StratumError::io("images.index", "failed to rename tags.json").with_source(e))?;
        Ok(())
    }

    pub fn save_image(&self, image: &Image) -> StratumResult<()> {
        let path = self.layout.image_config(&image.digest);
        std::fs::create_dir_all(path.parent().unwrap())
            .map_err(|e| StratumError::io("images.index", "failed to create image directory").with_source(e))?;
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(image)
            .map_err(|e| StratumError::io("images.index", "failed to serialize image metadata").with_source(e))?;
        std::fs::write(&tmp, json).map_err(|e| StratumError::io("images.index", "failed to write image metadata").with_source(e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StratumError::io("images.index", "failed to rename image metadata").with_source(e))?;
        Ok(())
    }

    pub fn load_image(&self, digest: &str) -> StratumResult<Image> {
        let path = self.layout.image_config(digest);
        read_json(&path).map_err(|e| match e.kind() {
            stratum_shared::ErrorKind::NotFound => {
                StratumError::not_found("images.index", format!("no such image: {digest}"))
            }
            _ => e,
        })
    }

    pub fn list_images(&self) -> StratumResult<Vec<Image>> {
        let dir = self.layout.images_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StratumError::io("images.index", "failed to read images directory").with_source(e)),
        };
        let mut images = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StratumError::io("images.index", "failed to read directory entry").with_source(e))?;
            let config_path = entry.path().join("config.json");
            if config_path.exists() {
                images.push(read_json(&config_path)?);
            }
        }
        images.sort_by(|a, b| a.digest.cmp(&b.digest));
        Ok(images)
    }

    /// Resolve a digest or `repository:tag` reference to a digest (spec §4.2
    /// `resolve`).
    pub fn resolve(&self, reference: &str) -> StratumResult<String> {
        if self.layout.image_dir(reference).join("config.json").exists() {
            return Ok(reference.to_string());
        }
        let tags = self.load_tags()?;
        tags.tags
            .get(reference)
            .cloned()
            .ok_or_else(|| StratumError::not_found("images.resolve", format!("no such image: {reference}")))
    }

    /// Tag `source` (a digest or existing tag) as `target`. `target` must be
    /// free; re-tagging an already-tagged name is a `CONFLICT`, making `tag`
    /// idempotent-to-fail rather than silently overwriting (spec §8).
    pub fn tag(&self, source: &str, target: &str) -> StratumResult<()> {
        crate::model::split_tag_ref(target).map_err(|e| StratumError::validation("images.tag", e))?;
        let digest = self.resolve(source)?;

        let mut tags = self.load_tags()?;
        if tags.tags.contains_key(target) {
            return Err(StratumError::conflict("images.tag", format!("tag '{target}' already exists")));
        }
        tags.tags.insert(target.to_string(), digest.clone());
        self.save_tags(&tags)?;

        let mut image = self.load_image(&digest)?;
        if !image.tags.contains(&target.to_string()) {
            image.tags.push(target.to_string());
        }
        self.save_image(&image)
    }

    pub fn untag(&self, reference: &str) -> StratumResult<()> {
        let mut tags = self.load_tags()?;
        let digest = tags
            .tags
            .remove(reference)
            .ok_or_else(|| StratumError::not_found("images.untag", format!("no such tag: {reference}")))?;
        self.save_tags(&tags)?;

        let mut image = self.load_image(&digest)?;
        image.tags.retain(|t| t != reference);
        self.save_image(&image)
    }

    /// Remove all index state for `digest`. Callers must already have
    /// established that nothing references it (spec §4.2 `remove` `CONFLICT`
    /// rule — enforced at the `ImageStore` facade, which can see container
    /// references that this index cannot).
    pub fn remove(&self, digest: &str) -> StratumResult<()> {
        let mut tags = self.load_tags()?;
        tags.tags.retain(|_, d| d != digest);
        self.save_tags(&tags)?;

        let dir = self.layout.image_dir(digest);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StratumError::io("images.remove", format!("failed to remove {}", dir.display())).with_source(e)),
        }
    }

    pub fn tags_for(&self, digest: &str) -> StratumResult<Vec<String>> {
        let tags = self.load_tags()?;
        Ok(tags.tags.iter().filter(|(_, d)| d.as_str() == digest).map(|(t, _)| t.clone()).collect())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> StratumResult<T> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StratumError::not_found("images.index", format!("{} does not exist", path.display()))
        } else {
            StratumError::io("images.index", format!("failed to read {}", path.display())).with_source(e)
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|e| StratumError::io("images.index", "corrupt image metadata").with_source(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImageConfig;

    fn index() -> (tempfile::TempDir, ImageIndex) {
        let dir = tempfile::tempdir().unwrap();
        let index = ImageIndex::new(StateLayout::new(dir.path())).unwrap();
        (dir, index)
    }

    fn sample_image(digest: &str) -> Image {
        Image::new(digest.to_string(), vec!["sha256:layer1".to_string()], ImageConfig::default(), 1024)
    }

    #[test]
    fn tag_then_resolve_returns_digest() {
        let (_dir, index) = index();
        index.save_image(&sample_image("sha256:abc")).unwrap();
        index.tag("sha256:abc", "alpine:latest").unwrap();
        assert_eq!(index.resolve("alpine:latest").unwrap(), "sha256:abc");
    }

    #[test]
    fn retagging_the_same_name_is_a_conflict() {
        let (_dir, index) = index();
        index.save_image(&sample_image("sha256:abc")).unwrap();
        index.save_image(&sample_image("sha256:def")).unwrap();
        index.tag("sha256:abc", "alpine:latest").unwrap();
        let err = index.tag("sha256:def", "alpine:latest").unwrap_err();
        assert_eq!(err.kind(), stratum_shared::ErrorKind::Conflict);
    }

    #[test]
    fn multiple_tags_can_resolve_to_one_digest() {
        let (_dir, index) = index();
        index.save_image(&sample_image("sha256:abc")).unwrap();
        index.tag("sha256:abc", "alpine:latest").unwrap();
        index.tag("sha256:abc", "alpine:3.19").unwrap();
        assert_eq!(index.resolve("alpine:latest").unwrap(), "sha256:abc");
        assert_eq!(index.resolve("alpine:3.19").unwrap(), "sha256:abc");
    }

    #[test]
    fn untag_removes_only_that_tag() {
        let (_dir, index) = index();
        index.save_image(&sample_image("sha256:abc")).unwrap();
        index.tag("sha256:abc", "alpine:latest").unwrap();
        index.tag("sha256:abc", "alpine:3.19").unwrap();
        index.untag("alpine:latest").unwrap();
        assert!(index.resolve("alpine:latest").is_err());
        assert_eq!(index.resolve("alpine:3.19").unwrap(), "sha256:abc");
    }
}
