//! Shared fixtures for async tests against a mock API server.

use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use wiremock::MockServer;

use crate::api::FigmaClient;
use crate::auth::{AuthManager, Navigator};
use crate::config::Config;
use crate::error::Result;
use crate::models::{AuthStatus, FrameImages, ProjectDescriptor, Session};
use crate::store::{KeyValueStore, MemoryStore, ProjectCache, SESSION_KEY};

/// A valid 22-character file key.
pub const FILE_ID: &str = "abc123XYZabc123XYZabc1";

/// Records navigations instead of opening a browser.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
    landings: Mutex<usize>,
}

impl RecordingNavigator {
    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }

    pub fn landings(&self) -> usize {
        *self.landings.lock().unwrap()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, url: &str) -> Result<()> {
        self.redirects.lock().unwrap().push(url.to_string());
        Ok(())
    }

    fn landing(&self) {
        *self.landings.lock().unwrap() += 1;
    }
}

/// A logged-in session valid for another hour, with refresh token `refresh`.
pub fn logged_in_session(access_token: &str) -> Session {
    Session {
        access_token: Some(access_token.to_string()),
        refresh_token: Some("refresh".to_string()),
        expires_at: Some(Utc::now() + Duration::hours(1)),
        csrf_nonce: None,
        status: AuthStatus::LoggedIn,
        profile: None,
    }
}

/// Version "1" descriptor named "Demo" with every frame pending.
pub fn descriptor(id: &str, frames: &[&str]) -> ProjectDescriptor {
    ProjectDescriptor {
        id: id.to_string(),
        name: "Demo".to_string(),
        last_modified: None,
        version: "1".to_string(),
        thumbnail_url: None,
        images: FrameImages::pending(frames.iter().copied()),
    }
}

/// Auth manager and project cache wired to a mock server and an in-memory store.
pub struct Harness {
    pub auth: AuthManager,
    pub projects: Arc<ProjectCache>,
    pub store: Arc<MemoryStore>,
    pub navigator: Arc<RecordingNavigator>,
}

impl Harness {
    pub fn new(server: &MockServer, session: Option<Session>) -> Self {
        let store = Arc::new(MemoryStore::default());
        if let Some(session) = session {
            store
                .set(SESSION_KEY, &serde_json::to_string(&session).unwrap())
                .unwrap();
        }

        let config = Config::for_tests(&server.uri());
        let client = FigmaClient::new(&config.api_base_url).unwrap();
        let projects = Arc::new(ProjectCache::open(client.clone(), store.clone()));
        let navigator = Arc::new(RecordingNavigator::default());
        let auth = AuthManager::new(
            config,
            client,
            store.clone(),
            Arc::clone(&projects),
            navigator.clone(),
        );

        Self {
            auth,
            projects,
            store,
            navigator,
        }
    }

    pub async fn seed_project(&self, id: &str, frames: &[&str]) {
        self.projects.insert(descriptor(id, frames)).await;
    }
}
