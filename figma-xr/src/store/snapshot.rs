//! Storage representation of the project cache.
//!
//! The cache is written as one JSON object mapping project id to a flattened
//! descriptor whose frame images are an ordered list of `{id, image}` records.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{FrameImage, FrameImages, ProjectDescriptor};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredProject {
    id: String,
    name: String,
    #[serde(default)]
    last_modified: Option<DateTime<Utc>>,
    version: String,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    images: Vec<FrameImage>,
}

impl From<&ProjectDescriptor> for StoredProject {
    fn from(p: &ProjectDescriptor) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            last_modified: p.last_modified,
            version: p.version.clone(),
            thumbnail_url: p.thumbnail_url.clone(),
            images: p.images.to_records(),
        }
    }
}

impl StoredProject {
    fn into_descriptor(self, id: String) -> ProjectDescriptor {
        ProjectDescriptor {
            id,
            name: self.name,
            last_modified: self.last_modified,
            version: self.version,
            thumbnail_url: self.thumbnail_url,
            images: FrameImages::from_records(self.images),
        }
    }
}

/// Serialize the cache. Keys are sorted so unchanged caches produce identical output.
pub fn encode_projects(projects: &HashMap<String, ProjectDescriptor>) -> Result<String> {
    let flat: BTreeMap<&str, StoredProject> = projects
        .iter()
        .map(|(id, project)| (id.as_str(), StoredProject::from(project)))
        .collect();
    Ok(serde_json::to_string(&flat)?)
}

/// Rebuild the cache from its storage representation. The object key is the
/// authoritative project id.
pub fn decode_projects(json: &str) -> Result<HashMap<String, ProjectDescriptor>> {
    let flat: HashMap<String, StoredProject> = serde_json::from_str(json)?;
    Ok(flat
        .into_iter()
        .map(|(id, stored)| {
            let project = stored.into_descriptor(id.clone());
            (id, project)
        })
        .collect())
}
