//! Wire types for the Figma REST API.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::models::{FrameImages, ProjectDescriptor};

/// Response of `POST /v1/oauth/token` for both grant types.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Absent on some refresh responses; the previous token stays valid then.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds.
    #[serde(deserialize_with = "number_or_string")]
    pub expires_in: i64,
}

/// Accepts `3600` as well as `"3600"`.
fn number_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// A node of the document tree, reduced to what the cache keeps.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentNode {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub children: Vec<DocumentNode>,
}

/// Response of `GET /v1/files/{key}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub name: String,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub version: String,
    #[serde(default)]
    pub document: DocumentNode,
}

impl RemoteFile {
    /// Frame ids of the first page, in document order.
    pub fn frame_ids(&self) -> Vec<String> {
        self.document
            .children
            .first()
            .map(|page| {
                page.children
                    .iter()
                    .filter_map(|frame| frame.id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Strip the file down to a descriptor with every frame image pending.
    pub fn into_descriptor(self, id: &str) -> ProjectDescriptor {
        let images = FrameImages::pending(self.frame_ids());
        ProjectDescriptor {
            id: id.to_string(),
            name: self.name,
            last_modified: self.last_modified,
            version: self.version,
            thumbnail_url: self.thumbnail_url,
            images,
        }
    }
}

/// Response of `GET /v1/images/{key}`. A `None` url means the frame could not be rendered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImagesResponse {
    #[serde(default)]
    pub images: HashMap<String, Option<String>>,
}
