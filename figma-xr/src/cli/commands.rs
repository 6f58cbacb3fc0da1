//! CLI command execution.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::api::FigmaClient;
use crate::auth::{AuthManager, BrowserNavigator, CallbackServer, Route};
use crate::config::Config;
use crate::models::ProjectDescriptor;
use crate::store::{parse_file_id, FileStore, KeyValueStore, ProjectCache};

use super::args::{Cli, Commands};

/// How long `login` waits for the browser to come back.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

impl Cli {
    fn config(&self) -> Result<Config> {
        let data_dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => Config::default_data_dir()?,
        };

        Ok(Config {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            api_base_url: self.api_url.trim_end_matches('/').to_string(),
            authorize_url: self.authorize_url.clone(),
            scope: self.scope.clone(),
            redirect_port: self.port,
            data_dir,
        })
    }
}

/// Auth manager and project cache sharing one store and API client.
struct App {
    auth: AuthManager,
    projects: Arc<ProjectCache>,
}

impl App {
    fn open(config: Config) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.data_dir)?);
        let client = FigmaClient::new(&config.api_base_url)?;
        let projects = Arc::new(ProjectCache::open(client.clone(), Arc::clone(&store)));
        let auth = AuthManager::new(
            config,
            client,
            store,
            Arc::clone(&projects),
            Arc::new(BrowserNavigator),
        );
        Ok(Self { auth, projects })
    }

    /// Enter `route`, validating the session first. Fails when the guard
    /// sends us to the landing view instead.
    async fn enter(&self, route: Route) -> Result<()> {
        if let Err(e) = self.auth.check_session().await {
            bail!("Session expired ({e}). Run `figma-xr login` to sign in again.");
        }
        let entered = self.auth.guard(route.clone()).await;
        if entered != route {
            bail!(
                "Cannot open {}: not signed in. Run `figma-xr login` first.",
                route.name()
            );
        }
        Ok(())
    }
}

/// Execute the CLI command.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.config()?;
    let app = App::open(config.clone())?;

    let result = match cli.command {
        Commands::Login => login(&app, &config).await,
        Commands::Logout => {
            app.auth.logout().await;
            Ok(())
        }
        Commands::Status => status(&app).await,
        Commands::Add { url } => add_project(&app, &url).await,
        Commands::List => list_projects(&app).await,
        Commands::Show { id } => show_project(&app, &project_key(&id)).await,
        Commands::Fetch { id, count, all } => {
            fetch_frames(&app, &project_key(&id), count, all).await
        }
        Commands::Remove { id } => {
            let id = project_key(&id);
            if app.projects.remove_project(&id).await {
                println!("Removed {id}");
                Ok(())
            } else {
                bail!("Project not found: {id}")
            }
        }
        Commands::Sync => sync_projects(&app).await,
        Commands::Clear => {
            app.projects.clear_all().await;
            println!("Project cache cleared.");
            Ok(())
        }
    };

    app.projects
        .flush()
        .await
        .context("Failed to write the project cache")?;
    result
}

async fn login(app: &App, config: &Config) -> Result<()> {
    if config.client_id.is_empty() || config.client_secret.is_empty() {
        bail!("FIGMA_CLIENT_ID and FIGMA_CLIENT_SECRET must be set to sign in");
    }

    let server = CallbackServer::bind(config.redirect_port).await?;
    app.auth.login().await?;
    println!(
        "Waiting for authorization on port {} (up to {} minutes)...",
        server.port(),
        LOGIN_TIMEOUT.as_secs() / 60
    );

    let callback = match server.wait(LOGIN_TIMEOUT).await {
        Ok(callback) => callback,
        Err(e) => {
            app.auth.logout().await;
            return Err(e.into());
        }
    };
    app.auth
        .complete_authorization(&callback.state, &callback.code)
        .await
        .context("Sign-in failed")?;

    let session = app.auth.session().await;
    match session.profile.and_then(|p| p.handle.or(p.email)) {
        Some(who) => println!("Signed in as {who}"),
        None => println!("Signed in"),
    }
    Ok(())
}

async fn status(app: &App) -> Result<()> {
    let checked = app.auth.check_session().await;
    let session = app.auth.session().await;

    println!("Status: {}", session.status);
    if let Some(profile) = &session.profile {
        let name = profile.handle.as_deref().unwrap_or("-");
        let email = profile.email.as_deref().unwrap_or("-");
        println!("User: {name} <{email}>");
    }
    if let Some(expires_at) = session.expires_at {
        println!("Token expires: {}", expires_at.format("%Y-%m-%d %H:%M UTC"));
    }
    println!("Cached projects: {}", app.projects.list().await.len());

    if let Err(e) = checked {
        bail!("Session check failed: {e}");
    }
    Ok(())
}

async fn add_project(app: &App, url: &str) -> Result<()> {
    app.enter(Route::Projects).await?;
    let project = app.projects.add_project(&app.auth, url).await?;

    println!("Project: {} ({})", project.name, project.id);
    println!("Version: {}", project.version);
    println!(
        "Frames: {} ({} downloaded)",
        project.images.len(),
        project.loaded_count()
    );
    Ok(())
}

async fn list_projects(app: &App) -> Result<()> {
    app.enter(Route::Projects).await?;
    let projects = app.projects.list().await;
    if projects.is_empty() {
        println!("No projects cached. Add one with `figma-xr add <url>`.");
        return Ok(());
    }

    println!(
        "{:<24} {:<28} {:<12} {:<8}",
        "ID", "NAME", "VERSION", "FRAMES"
    );
    println!("{}", "-".repeat(74));
    for project in projects {
        println!(
            "{:<24} {:<28} {:<12} {:<8}",
            project.id,
            truncate(&project.name, 26),
            truncate(&project.version, 12),
            format!("{}/{}", project.loaded_count(), project.images.len()),
        );
    }
    Ok(())
}

async fn show_project(app: &App, id: &str) -> Result<()> {
    app.enter(Route::XrView(id.to_string())).await?;
    let project = find(app, id).await?;

    println!("Name: {}", project.name);
    println!("ID: {}", project.id);
    println!("Version: {}", project.version);
    if let Some(modified) = project.last_modified {
        println!("Last modified: {}", modified.format("%Y-%m-%d %H:%M UTC"));
    }
    if let Some(thumb) = &project.thumbnail_url {
        println!("Thumbnail: {thumb}");
    }
    println!();
    if project.images.is_empty() {
        println!("  (no frames on the first page)");
    }
    for frame in project.images.iter() {
        let state = frame
            .image
            .as_ref()
            .map_or_else(|| "pending".to_string(), |uri| format!("{} bytes", uri.len()));
        println!("  {:<20} {state}", frame.id);
    }
    Ok(())
}

async fn fetch_frames(app: &App, id: &str, count: usize, all: bool) -> Result<()> {
    app.enter(Route::XrView(id.to_string())).await?;
    if count == 0 {
        bail!("--count must be at least 1");
    }

    loop {
        let requested = app
            .projects
            .populate_next_missing(&app.auth, id, count)
            .await?;
        if requested == 0 {
            break;
        }
        // Persist each page so an interrupted `--all` keeps what it got.
        app.projects.flush().await?;

        let project = find(app, id).await?;
        println!(
            "Downloaded {requested} frames ({}/{} loaded)",
            project.loaded_count(),
            project.images.len()
        );
        if !all {
            break;
        }
    }

    let project = find(app, id).await?;
    if project.images.missing_count() == 0 {
        println!("All frames of {} are downloaded.", project.name);
    }
    Ok(())
}

async fn sync_projects(app: &App) -> Result<()> {
    app.enter(Route::Projects).await?;
    let report = app.projects.sync_all(&app.auth).await;

    for id in &report.updated {
        println!("Updated: {id}");
    }
    for id in &report.removed {
        println!("Removed (deleted in Figma): {id}");
    }
    for (id, error) in &report.failed {
        eprintln!("Failed: {id}: {error}");
    }
    println!(
        "{} updated, {} removed, {} unchanged, {} failed",
        report.updated.len(),
        report.removed.len(),
        report.unchanged.len(),
        report.failed.len()
    );
    Ok(())
}

async fn find(app: &App, id: &str) -> Result<ProjectDescriptor> {
    app.projects
        .get(id)
        .await
        .with_context(|| format!("Project not found: {id}"))
}

/// Accept a project id or the file URL it came from.
fn project_key(arg: &str) -> String {
    parse_file_id(arg).unwrap_or_else(|_| arg.to_string())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
