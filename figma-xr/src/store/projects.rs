//! Project cache: remote file key -> descriptor, with incremental frame image
//! loading and a debounced background writer mirroring the map to storage.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use futures::future::join_all;
use regex::Regex;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::snapshot::{decode_projects, encode_projects};
use super::storage::{KeyValueStore, PROJECTS_KEY};
use crate::api::FigmaClient;
use crate::auth::AuthManager;
use crate::error::{Error, Result};
use crate::models::ProjectDescriptor;

static FILE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://[\w.-]+\.?figma.com/([\w-]+)/([0-9a-zA-Z]{22,128})(/.*)?$")
        .expect("file URL pattern is valid")
});

/// Delay between a mutation and the snapshot write, so bursts become one write.
const WRITE_DEBOUNCE: Duration = Duration::from_millis(50);

type ProjectMap = HashMap<String, ProjectDescriptor>;

/// Extract the file key from a Figma file URL
/// (`https://www.figma.com/design/<key>/<title>`).
pub fn parse_file_id(url: &str) -> Result<String> {
    FILE_URL
        .captures(url.trim())
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::InvalidUrl(url.to_string()))
}

/// Outcome of [`ProjectCache::sync_all`].
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Version changed; descriptor replaced with every image pending.
    pub updated: Vec<String>,
    /// Deleted remotely (404); dropped from the cache.
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
    /// Ids whose metadata could not be fetched, with the error text.
    pub failed: Vec<(String, String)>,
}

pub struct ProjectCache {
    client: FigmaClient,
    store: Arc<dyn KeyValueStore>,
    projects: Arc<RwLock<ProjectMap>>,
    dirty: Arc<Notify>,
    writer: JoinHandle<()>,
}

impl ProjectCache {
    /// Load the persisted cache and start the background writer.
    /// Must be called inside a tokio runtime.
    pub fn open(client: FigmaClient, store: Arc<dyn KeyValueStore>) -> Self {
        let projects = match store.get(PROJECTS_KEY) {
            Ok(Some(json)) => decode_projects(&json).unwrap_or_else(|e| {
                warn!("Stored project cache is unreadable ({e}), starting empty");
                ProjectMap::new()
            }),
            Ok(None) => ProjectMap::new(),
            Err(e) => {
                warn!("Failed to load project cache: {e}");
                ProjectMap::new()
            }
        };
        debug!("Loaded {} cached projects", projects.len());

        let projects = Arc::new(RwLock::new(projects));
        let dirty = Arc::new(Notify::new());
        let writer = tokio::spawn(run_writer(
            Arc::clone(&projects),
            Arc::clone(&store),
            Arc::clone(&dirty),
        ));

        Self {
            client,
            store,
            projects,
            dirty,
            writer,
        }
    }

    pub async fn get(&self, id: &str) -> Option<ProjectDescriptor> {
        self.projects.read().await.get(id).cloned()
    }

    /// Every cached project, sorted by name.
    pub async fn list(&self) -> Vec<ProjectDescriptor> {
        let mut projects: Vec<_> = self.projects.read().await.values().cloned().collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        projects
    }

    /// Add the file behind `url`. If the cached entry has the remote version,
    /// it is returned unchanged; otherwise a fresh descriptor replaces it.
    pub async fn add_project(&self, auth: &AuthManager, url: &str) -> Result<ProjectDescriptor> {
        let file_id = parse_file_id(url)?;
        let id = file_id.as_str();
        let client = &self.client;

        let file = auth
            .with_refresh_retry(move |token| async move { client.get_file(&token, id).await })
            .await?;

        let mut projects = self.projects.write().await;
        if let Some(existing) = projects.get(&file_id) {
            if existing.version == file.version {
                debug!("Project {file_id} is at version {}, using cache", file.version);
                return Ok(existing.clone());
            }
        }

        let descriptor = file.into_descriptor(&file_id);
        info!(
            "Cached project {} '{}' with {} frames",
            descriptor.id,
            descriptor.name,
            descriptor.images.len()
        );
        projects.insert(file_id, descriptor.clone());
        drop(projects);
        self.mark_dirty();

        Ok(descriptor)
    }

    /// Download the images of `ids` into the project, retrying once through a
    /// token refresh on network or auth failures.
    pub async fn fetch_images(
        &self,
        auth: &AuthManager,
        project_id: &str,
        ids: &[String],
    ) -> Result<()> {
        if !self.projects.read().await.contains_key(project_id) {
            return Err(Error::ProjectNotFound(project_id.to_string()));
        }
        if ids.is_empty() {
            return Ok(());
        }

        auth.with_refresh_retry(move |token| self.fetch_images_once(project_id, ids, token))
            .await
    }

    /// One attempt of [`Self::fetch_images`] with the given token.
    ///
    /// Downloads run concurrently. Successful downloads are stored even when
    /// another one fails; the first failure is returned afterwards.
    async fn fetch_images_once(&self, project_id: &str, ids: &[String], token: String) -> Result<()> {
        let response = self.client.get_images(&token, project_id, ids).await?;

        let mut unrenderable = Vec::new();
        let mut rendered = Vec::new();
        for (id, url) in response.images {
            match url {
                Some(url) => rendered.push((id, url)),
                None => unrenderable.push(id),
            }
        }

        let downloads = join_all(rendered.into_iter().map(|(id, url)| async move {
            let result = self.client.download_data_uri(&url).await;
            (id, result)
        }))
        .await;

        let mut projects = self.projects.write().await;
        let Some(project) = projects.get_mut(project_id) else {
            warn!("Project {project_id} was removed while its images were loading, dropping results");
            return Ok(());
        };

        for id in &unrenderable {
            debug!("Frame {id} cannot be rendered, removing it");
            project.images.remove(id);
        }

        let mut first_error = None;
        let mut stored = 0;
        for (id, result) in downloads {
            match result {
                Ok(data_uri) => {
                    if project.images.set_image(&id, data_uri) {
                        stored += 1;
                    } else {
                        debug!("Frame {id} is no longer part of {project_id}, skipping");
                    }
                }
                Err(e) => {
                    warn!("Failed to download frame {id}: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        drop(projects);

        if stored > 0 || !unrenderable.is_empty() {
            self.mark_dirty();
        }
        debug!("Stored {stored} images for {project_id}");

        first_error.map_or(Ok(()), Err)
    }

    /// Fetch the next `quantity` frames still lacking an image, in frame order.
    /// Returns how many were requested; 0 when nothing is missing.
    pub async fn populate_next_missing(
        &self,
        auth: &AuthManager,
        project_id: &str,
        quantity: usize,
    ) -> Result<usize> {
        let missing = {
            let projects = self.projects.read().await;
            let project = projects
                .get(project_id)
                .ok_or_else(|| Error::ProjectNotFound(project_id.to_string()))?;
            project.images.missing(quantity)
        };

        if missing.is_empty() {
            debug!("No missing images for {project_id}");
            return Ok(0);
        }

        self.fetch_images(auth, project_id, &missing).await?;
        Ok(missing.len())
    }

    /// Returns whether the project was cached.
    pub async fn remove_project(&self, id: &str) -> bool {
        let removed = self.projects.write().await.remove(id).is_some();
        if removed {
            self.mark_dirty();
        }
        removed
    }

    pub async fn clear_all(&self) {
        self.projects.write().await.clear();
        self.mark_dirty();
    }

    /// Re-check every cached project against the remote file.
    pub async fn sync_all(&self, auth: &AuthManager) -> SyncReport {
        let ids: Vec<String> = self.projects.read().await.keys().cloned().collect();
        let client = &self.client;
        let mut report = SyncReport::default();

        for id in ids {
            let file_id = id.as_str();
            let fetched = auth
                .with_refresh_retry(move |token| async move { client.get_file(&token, file_id).await })
                .await;

            match fetched {
                Ok(file) => {
                    let mut projects = self.projects.write().await;
                    let Some(existing) = projects.get(&id) else {
                        continue;
                    };
                    if existing.version == file.version {
                        report.unchanged.push(id);
                    } else {
                        info!("Project {id} changed to version {}", file.version);
                        projects.insert(id.clone(), file.into_descriptor(&id));
                        report.updated.push(id);
                    }
                }
                Err(e) if e.is_not_found() => {
                    info!("Project {id} no longer exists remotely, removing it");
                    self.projects.write().await.remove(&id);
                    report.removed.push(id);
                }
                Err(e) => {
                    warn!("Failed to sync project {id}: {e}");
                    report.failed.push((id, e.to_string()));
                }
            }
        }

        if !report.updated.is_empty() || !report.removed.is_empty() {
            self.mark_dirty();
        }
        report
    }

    /// Write the current map to storage now.
    pub async fn flush(&self) -> Result<()> {
        write_snapshot(&self.projects, self.store.as_ref()).await
    }

    #[cfg(test)]
    pub(crate) async fn insert(&self, descriptor: ProjectDescriptor) {
        self.projects
            .write()
            .await
            .insert(descriptor.id.clone(), descriptor);
        self.mark_dirty();
    }

    fn mark_dirty(&self) {
        self.dirty.notify_one();
    }
}

impl Drop for ProjectCache {
    fn drop(&mut self) {
        self.writer.abort();
    }
}

async fn run_writer(projects: Arc<RwLock<ProjectMap>>, store: Arc<dyn KeyValueStore>, dirty: Arc<Notify>) {
    loop {
        dirty.notified().await;
        tokio::time::sleep(WRITE_DEBOUNCE).await;
        if let Err(e) = write_snapshot(&projects, store.as_ref()).await {
            warn!("Failed to persist project cache: {e}");
        }
    }
}

async fn write_snapshot(projects: &RwLock<ProjectMap>, store: &dyn KeyValueStore) -> Result<()> {
    let json = encode_projects(&*projects.read().await)?;
    store.set(PROJECTS_KEY, &json)
}
