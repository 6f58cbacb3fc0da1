//! Cached project descriptors and their frame images.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A frame of a project and its downloaded image, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameImage {
    /// Frame node id in the remote file.
    pub id: String,
    /// Rendered image as a `data:` URI. `None` means not downloaded yet.
    pub image: Option<String>,
}

impl FrameImage {
    /// A frame known to exist whose image has not been fetched.
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image: None,
        }
    }
}

/// Frame id -> image mapping that keeps insertion order.
///
/// Frame counts per file are small, so lookups scan the list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameImages {
    entries: Vec<FrameImage>,
}

impl FrameImages {
    /// Build a mapping with every id pending. Duplicate ids keep their first position.
    pub fn pending<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_records(ids.into_iter().map(FrameImage::pending))
    }

    /// Rebuild a mapping from flattened records. A repeated id overwrites the
    /// earlier value in place.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = FrameImage>,
    {
        let mut images = Self::default();
        for record in records {
            images.insert(record);
        }
        images
    }

    /// Flatten into ordered `{id, image}` records.
    pub fn to_records(&self) -> Vec<FrameImage> {
        self.entries.clone()
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<&FrameImage> {
        self.entries.iter().find(|f| f.id == id)
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Insert or replace the entry for `frame.id`.
    pub fn insert(&mut self, frame: FrameImage) {
        match self.entries.iter_mut().find(|f| f.id == frame.id) {
            Some(existing) => *existing = frame,
            None => self.entries.push(frame),
        }
    }

    /// Store a downloaded image. Returns `false` if the frame is unknown.
    pub fn set_image(&mut self, id: &str, data_uri: String) -> bool {
        match self.entries.iter_mut().find(|f| f.id == id) {
            Some(frame) => {
                frame.image = Some(data_uri);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<FrameImage> {
        let index = self.entries.iter().position(|f| f.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Ids of up to `limit` frames without an image, in insertion order.
    pub fn missing(&self, limit: usize) -> Vec<String> {
        self.entries
            .iter()
            .filter(|f| f.image.is_none())
            .take(limit)
            .map(|f| f.id.clone())
            .collect()
    }

    pub fn missing_count(&self) -> usize {
        self.entries.iter().filter(|f| f.image.is_none()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameImage> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The locally retained subset of a remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    /// Remote file key.
    pub id: String,
    pub name: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub version: String,
    pub thumbnail_url: Option<String>,
    pub images: FrameImages,
}

impl ProjectDescriptor {
    /// Number of frames with a downloaded image.
    pub fn loaded_count(&self) -> usize {
        self.images.len() - self.images.missing_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_keeps_order_and_dedups() {
        let images = FrameImages::pending(["f3", "f1", "f3", "f2"]);
        let ids: Vec<_> = images.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["f3", "f1", "f2"]);
        assert!(images.iter().all(|f| f.image.is_none()));
    }

    #[test]
    fn test_missing_respects_limit_and_order() {
        let mut images = FrameImages::pending(["a", "b", "c", "d"]);
        assert!(images.set_image("b", "data:image/png;base64,AA==".to_string()));

        assert_eq!(images.missing(2), ["a", "c"]);
        assert_eq!(images.missing(10), ["a", "c", "d"]);
        assert_eq!(images.missing_count(), 3);
    }

    #[test]
    fn test_set_image_on_unknown_frame() {
        let mut images = FrameImages::pending(["a"]);
        assert!(!images.set_image("zzz", "data:,".to_string()));
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn test_remove_frame() {
        let mut images = FrameImages::pending(["a", "b"]);
        assert_eq!(images.remove("a"), Some(FrameImage::pending("a")));
        assert!(images.remove("a").is_none());
        assert!(!images.contains("a"));
        assert!(images.contains("b"));
    }

    #[test]
    fn test_records_rebuild_overwrites_in_place() {
        let images = FrameImages::from_records(vec![
            FrameImage::pending("a"),
            FrameImage::pending("b"),
            FrameImage {
                id: "a".to_string(),
                image: Some("data:,x".to_string()),
            },
        ]);
        let records = images.to_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "a");
        assert_eq!(records[0].image.as_deref(), Some("data:,x"));
    }
}
